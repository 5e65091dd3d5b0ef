use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// 任务 ID - 由服务端分配，可能是字符串也可能是数字
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Text(String),
    Number(Number),
}

impl TaskId {
    /// 空字符串和 0 不算有效任务（与网页端 `if (currentTaskId)` 一致）
    pub fn is_blank(&self) -> bool {
        match self {
            TaskId::Text(s) => s.is_empty(),
            TaskId::Number(n) => n.as_f64() == Some(0.0),
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Text(s) => f.write_str(s),
            TaskId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        TaskId::Text(value.to_string())
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        TaskId::Number(value.into())
    }
}

/// 客户端发往服务端的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Question { question: String },
    Stop { task_id: TaskId },
    CheckStatus { task_id: TaskId },
}

/// `llm_response` 消息中的 event 字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmEvent {
    Start,
    Message,
    Interrupted,
    Error,
    End,
    #[default]
    #[serde(other)]
    Unknown,
}

/// 服务端推送的消息
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    TaskStarted {
        task_id: TaskId,
    },
    LlmResponse {
        #[serde(default, deserialize_with = "lenient_event")]
        event: LlmEvent,
        #[serde(default)]
        data: Option<Value>,
    },
    CommandSent {
        command: String,
        task_id: TaskId,
    },
    TaskStatus {
        task_id: TaskId,
        #[serde(default)]
        state: Option<String>,
        #[serde(default)]
        ready: bool,
        #[serde(default)]
        successful: Option<bool>,
    },
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// 解析一帧文本消息
    ///
    /// JSON 非法时返回错误；没有字符串类型的 `type` 字段时视为未知消息。
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .with_context(|| format!("解析服务器消息失败：{}", text))?;

        if !value.get("type").map_or(false, Value::is_string) {
            return Ok(InboundMessage::Unknown);
        }

        serde_json::from_value(value)
            .with_context(|| format!("服务器消息字段不完整：{}", text))
    }
}

/// `event` 为 null 或不是已知字符串时按未知事件处理
fn lenient_event<'de, D>(deserializer: D) -> std::result::Result<LlmEvent, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// 把 `data` 字段转成纯文本
pub fn data_text(data: Option<&Value>) -> String {
    match data {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
