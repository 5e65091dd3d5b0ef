use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::{debug, info};

use crate::types::{InboundMessage, OutboundMessage, TaskId};

use super::effects::{Notice, SessionEffect};
use super::reducer::{self, SessionEvent};
use super::state::SessionState;
use super::view::View;

/// 消息出口 - 发送即返回，不等待确认
pub trait Transport {
    fn send(&mut self, message: &OutboundMessage) -> Result<()>;
}

/// 收集发出的消息，便于离线驱动会话
impl Transport for Vec<OutboundMessage> {
    fn send(&mut self, message: &OutboundMessage) -> Result<()> {
        self.push(message.clone());
        Ok(())
    }
}

/// 客户端会话 - 持有连接出口、回复区域和任务状态
pub struct ClientSession<T, V> {
    state: SessionState,
    transport: Option<T>,
    view: V,
}

impl<T: Transport, V: View> ClientSession<T, V> {
    pub fn new(transport: T, view: V) -> Self {
        ClientSession {
            state: SessionState::new(),
            transport: Some(transport),
            view,
        }
    }

    /// 发送问题
    pub fn send_question(&mut self, question: &str) -> Result<()> {
        self.dispatch(SessionEvent::SubmitQuestion(question.to_string()))
    }

    /// 停止生成，没有进行中的任务时什么也不做
    pub fn stop_generation(&mut self) -> Result<()> {
        self.dispatch(SessionEvent::StopRequested)
    }

    /// 查询任务状态，没有进行中的任务时什么也不做
    pub fn check_status(&mut self) -> Result<()> {
        self.dispatch(SessionEvent::StatusRequested)
    }

    /// 处理一帧服务端消息
    pub fn handle_frame(&mut self, text: &str) -> Result<()> {
        let message = InboundMessage::parse(text)?;
        self.handle_message(message)
    }

    pub fn handle_message(&mut self, message: InboundMessage) -> Result<()> {
        self.dispatch(SessionEvent::Inbound(message))
    }

    /// 连接关闭通知
    pub fn handle_close(&mut self) -> Result<()> {
        self.dispatch(SessionEvent::Closed)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.state.task_id()
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// 释放会话，交回连接出口
    pub fn dispose(mut self) -> Option<T> {
        debug!("会话结束");
        self.transport.take()
    }

    fn dispatch(&mut self, event: SessionEvent) -> Result<()> {
        let effects = reducer::update(&mut self.state, event, Utc::now());
        self.apply(effects)
    }

    fn apply(&mut self, effects: Vec<SessionEffect>) -> Result<()> {
        for effect in effects {
            match effect {
                SessionEffect::Send(message) => {
                    let transport = self
                        .transport
                        .as_mut()
                        .ok_or_else(|| anyhow!("会话已释放"))?;
                    transport.send(&message)?;
                }
                SessionEffect::ClearBuffer => self.view.clear(),
                SessionEffect::Append(text) => self.view.append(&text),
                SessionEffect::ShowStop => self.view.set_stop_visible(true),
                SessionEffect::HideStop => self.view.set_stop_visible(false),
                SessionEffect::Notice(notice) => {
                    log_notice(&notice);
                    self.view.notice(&notice);
                }
            }
        }
        Ok(())
    }
}

fn log_notice(notice: &Notice) {
    match notice {
        Notice::TaskStarted { task_id } => info!(%task_id, "任务已开始"),
        Notice::TaskFinished {
            task_id,
            outcome,
            elapsed,
        } => info!(
            task_id = ?task_id,
            ?outcome,
            elapsed_ms = elapsed.map(|e| e.num_milliseconds()),
            "任务结束"
        ),
        Notice::CommandSent { command, task_id } => info!(%command, %task_id, "命令已发送"),
        Notice::TaskStatus {
            task_id,
            state,
            ready,
            successful,
        } => info!(%task_id, ?state, ready, ?successful, "任务状态"),
        Notice::ConnectionClosed => info!("WebSocket 连接已关闭"),
    }
}
