use anyhow::{anyhow, Context, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::types::OutboundMessage;

use super::client::Transport;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 连接的写端 - 消息进入队列，由后台任务写出
pub struct WsSender {
    tx: mpsc::UnboundedSender<OutboundMessage>,
    writer: JoinHandle<()>,
}

impl WsSender {
    /// 关闭写端并等待 close 帧发出
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.writer.await {
            error!(error = %e, "写入任务异常退出");
        }
    }
}

impl Transport for WsSender {
    fn send(&mut self, message: &OutboundMessage) -> Result<()> {
        self.tx
            .send(message.clone())
            .map_err(|_| anyhow!("连接已关闭，无法发送消息"))
    }
}

/// 连接的读端
pub struct WsReader {
    read: SplitStream<WsStream>,
}

impl WsReader {
    /// 读取下一帧文本消息，连接关闭时返回 None
    pub async fn next_text(&mut self) -> Option<Result<String>> {
        while let Some(msg) = self.read.next().await {
            match msg {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "收到 close 帧");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(anyhow::Error::new(e).context("读取 WebSocket 消息失败"))),
            }
        }
        None
    }
}

/// 建立 WebSocket 连接
pub async fn connect(config: &ClientConfig) -> Result<(WsSender, WsReader)> {
    let timeout = Duration::from_secs(config.connect_timeout_secs);

    let (stream, _) = tokio::time::timeout(timeout, connect_async(config.url.as_str()))
        .await
        .with_context(|| format!("连接超时：{}", config.url))?
        .with_context(|| format!("连接 WebSocket 失败：{}", config.url))?;

    info!(url = %config.url, "WebSocket 已连接");

    let (write, read) = stream.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(write, rx));

    Ok((WsSender { tx, writer }, WsReader { read }))
}

async fn write_loop(
    mut write: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
) {
    while let Some(message) = rx.recv().await {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "序列化消息失败");
                continue;
            }
        };

        debug!(%text, "发送消息");
        if let Err(e) = write.send(Message::Text(text.into())).await {
            error!(error = %e, "发送 WebSocket 消息失败");
            return;
        }
    }

    let _ = write.close().await;
}
