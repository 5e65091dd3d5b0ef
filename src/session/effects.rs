//! reducer 返回的副作用
//!
//! reducer 只修改状态并返回副作用列表，发送消息、刷新输出区域等 I/O
//! 都由 `ClientSession` 执行。

use chrono::Duration;

use crate::types::{OutboundMessage, TaskId};

use super::state::TaskOutcome;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// 通过连接发送消息
    Send(OutboundMessage),
    /// 清空回复区域
    ClearBuffer,
    /// 追加文本到回复区域
    Append(String),
    /// 显示停止按钮
    ShowStop,
    /// 隐藏停止按钮
    HideStop,
    /// 仅用于日志和状态提示
    Notice(Notice),
}

/// 不改变回复区域的提示信息
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    TaskStarted {
        task_id: TaskId,
    },
    TaskFinished {
        task_id: Option<TaskId>,
        outcome: TaskOutcome,
        elapsed: Option<Duration>,
    },
    CommandSent {
        command: String,
        task_id: TaskId,
    },
    TaskStatus {
        task_id: TaskId,
        state: Option<String>,
        ready: bool,
        successful: Option<bool>,
    },
    ConnectionClosed,
}
