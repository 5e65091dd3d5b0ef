use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 默认的流式接口地址
pub const DEFAULT_WS_URL: &str = "ws://localhost:8050/ws/llm";

/// 连接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: std::env::var("TUTOR_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string()),
            connect_timeout_secs: 10,
        }
    }
}

impl ClientConfig {
    /// 健康检查地址：与 WebSocket 同主机的 `GET /`
    pub fn health_url(&self) -> Result<String> {
        let mut url = reqwest::Url::parse(&self.url)
            .with_context(|| format!("无效的 WebSocket 地址：{}", self.url))?;

        let scheme = match url.scheme() {
            "ws" => "http",
            "wss" => "https",
            "http" | "https" => url.scheme(),
            other => return Err(anyhow!("不支持的协议：{}", other)),
        }
        .to_string();

        url.set_scheme(&scheme)
            .map_err(|_| anyhow!("无法转换协议：{}", self.url))?;
        url.set_path("/");
        url.set_query(None);

        Ok(url.to_string())
    }
}

/// 显示配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// 打印任务开始/结束等状态行
    pub show_status: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig { show_status: true }
    }
}

/// 统一配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub display: DisplayConfig,
}

impl Config {
    /// 从文件加载配置
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败：{}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("解析配置文件失败：{}", path.display()))?;

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 默认配置文件位置
    pub fn path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tutor")
            .join("config.toml")
    }

    /// 从默认位置加载配置
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::path())
    }
}
