use chrono::{DateTime, Utc};

use crate::types::TaskId;

/// 当前任务所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskPhase {
    #[default]
    Idle,
    /// 服务端已确认任务，尚未收到输出
    Started,
    /// 正在接收流式输出
    Streaming,
}

/// 任务的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Interrupted,
    Failed,
    Ended,
}

/// 会话状态 - 只由 reducer 修改
#[derive(Debug, Default)]
pub struct SessionState {
    pub(crate) task_id: Option<TaskId>,
    pub(crate) phase: TaskPhase,
    pub(crate) last_outcome: Option<TaskOutcome>,
    pub(crate) started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前任务 ID
    pub fn task_id(&self) -> Option<&TaskId> {
        self.task_id.as_ref()
    }

    /// 可以停止/查询的任务 ID，空字符串和 0 不算
    pub fn active_task_id(&self) -> Option<&TaskId> {
        self.task_id.as_ref().filter(|id| !id.is_blank())
    }

    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    /// 最近一个任务的结束方式，发送新问题时清空
    pub fn last_outcome(&self) -> Option<TaskOutcome> {
        self.last_outcome
    }

    /// 最近一个问题是否已经结束
    pub fn is_finished(&self) -> bool {
        self.phase == TaskPhase::Idle && self.last_outcome.is_some()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}
