use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ClientConfig;

/// 服务端 `GET /` 的返回
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub code: i64,
    pub message: String,
    pub status: u16,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// 检查服务端是否在线
pub async fn ping(config: &ClientConfig) -> Result<HealthStatus> {
    let url = config.health_url()?;

    let client = Client::builder()
        .timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()
        .context("创建 HTTP 客户端失败")?;

    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("请求服务端失败：{}", url))?;

    let status = response.status();
    let text = response.text().await.context("读取响应失败")?;

    if !status.is_success() {
        return Err(anyhow::anyhow!("服务端错误：{} - {}", status, text));
    }

    let health: HealthStatus = serde_json::from_str(&text)
        .with_context(|| format!("解析健康检查响应失败，原始内容：{}", text))?;

    Ok(health)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_ping_body() {
        let health: HealthStatus =
            serde_json::from_str(r#"{"code":0,"message":"ok","status":200}"#).unwrap();
        assert!(health.is_ok());
        assert_eq!(health.status, 200);
    }
}
