//! 会话 reducer
//!
//! 所有状态变化都发生在这里：`update(state, event, now)` 修改状态并返回
//! 需要执行的副作用。

use chrono::{DateTime, Utc};

use crate::types::{data_text, InboundMessage, LlmEvent, OutboundMessage};

use super::effects::{Notice, SessionEffect};
use super::state::{SessionState, TaskOutcome, TaskPhase};

/// 中断标记
pub const INTERRUPTED_MARKER: &str = "\n[Generation interrupted]";

/// 驱动会话的事件
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// 用户提交问题
    SubmitQuestion(String),
    /// 用户点击停止
    StopRequested,
    /// 用户查询任务状态
    StatusRequested,
    /// 收到服务端消息
    Inbound(InboundMessage),
    /// 连接已关闭
    Closed,
}

pub fn update(state: &mut SessionState, event: SessionEvent, now: DateTime<Utc>) -> Vec<SessionEffect> {
    match event {
        SessionEvent::SubmitQuestion(question) => {
            state.last_outcome = None;
            vec![
                SessionEffect::Send(OutboundMessage::Question { question }),
                SessionEffect::ClearBuffer,
                SessionEffect::ShowStop,
            ]
        }
        SessionEvent::StopRequested => match state.active_task_id() {
            Some(task_id) => vec![SessionEffect::Send(OutboundMessage::Stop {
                task_id: task_id.clone(),
            })],
            None => vec![],
        },
        SessionEvent::StatusRequested => match state.active_task_id() {
            Some(task_id) => vec![SessionEffect::Send(OutboundMessage::CheckStatus {
                task_id: task_id.clone(),
            })],
            None => vec![],
        },
        SessionEvent::Inbound(message) => handle_inbound(state, message, now),
        SessionEvent::Closed => vec![SessionEffect::Notice(Notice::ConnectionClosed)],
    }
}

fn handle_inbound(state: &mut SessionState, message: InboundMessage, now: DateTime<Utc>) -> Vec<SessionEffect> {
    match message {
        InboundMessage::TaskStarted { task_id } => {
            state.task_id = Some(task_id.clone());
            state.phase = TaskPhase::Started;
            state.started_at = Some(now);
            vec![SessionEffect::Notice(Notice::TaskStarted { task_id })]
        }
        InboundMessage::LlmResponse { event, data } => match event {
            LlmEvent::Start => {
                state.phase = TaskPhase::Streaming;
                vec![SessionEffect::ClearBuffer]
            }
            LlmEvent::Message => {
                state.phase = TaskPhase::Streaming;
                vec![SessionEffect::Append(data_text(data.as_ref()))]
            }
            LlmEvent::Interrupted => vec![
                SessionEffect::Append(INTERRUPTED_MARKER.to_string()),
                SessionEffect::HideStop,
                finish(state, TaskOutcome::Interrupted, now),
            ],
            LlmEvent::Error => vec![
                SessionEffect::Append(format!("\n[Error: {}]", data_text(data.as_ref()))),
                SessionEffect::HideStop,
                finish(state, TaskOutcome::Failed, now),
            ],
            LlmEvent::End => vec![SessionEffect::HideStop, finish(state, TaskOutcome::Ended, now)],
            LlmEvent::Unknown => vec![],
        },
        InboundMessage::CommandSent { command, task_id } => {
            vec![SessionEffect::Notice(Notice::CommandSent { command, task_id })]
        }
        InboundMessage::TaskStatus {
            task_id,
            state: task_state,
            ready,
            successful,
        } => vec![SessionEffect::Notice(Notice::TaskStatus {
            task_id,
            state: task_state,
            ready,
            successful,
        })],
        InboundMessage::Unknown => vec![],
    }
}

/// 结束当前任务，回到 idle
fn finish(state: &mut SessionState, outcome: TaskOutcome, now: DateTime<Utc>) -> SessionEffect {
    let task_id = state.task_id.take();
    let elapsed = state.started_at.take().map(|started| now - started);
    state.phase = TaskPhase::Idle;
    state.last_outcome = Some(outcome);

    SessionEffect::Notice(Notice::TaskFinished {
        task_id,
        outcome,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskId;
    use chrono::Duration;
    use serde_json::json;

    fn inbound(text: &str) -> SessionEvent {
        SessionEvent::Inbound(InboundMessage::parse(text).unwrap())
    }

    fn started(state: &mut SessionState, id: &str) {
        let now = Utc::now();
        update(
            state,
            SessionEvent::Inbound(InboundMessage::TaskStarted { task_id: id.into() }),
            now,
        );
    }

    #[test]
    fn submit_sends_question_clears_and_shows_stop() {
        let mut state = SessionState::new();
        let effects = update(&mut state, SessionEvent::SubmitQuestion(String::new()), Utc::now());
        assert_eq!(
            effects,
            vec![
                SessionEffect::Send(OutboundMessage::Question {
                    question: String::new()
                }),
                SessionEffect::ClearBuffer,
                SessionEffect::ShowStop,
            ]
        );
    }

    #[test]
    fn stop_without_task_is_a_noop() {
        let mut state = SessionState::new();
        assert!(update(&mut state, SessionEvent::StopRequested, Utc::now()).is_empty());
        assert!(update(&mut state, SessionEvent::StatusRequested, Utc::now()).is_empty());
    }

    #[test]
    fn blank_task_id_does_not_enable_stop() {
        for text in [
            r#"{"type":"task_started","task_id":""}"#,
            r#"{"type":"task_started","task_id":0}"#,
        ] {
            let mut state = SessionState::new();
            update(&mut state, inbound(text), Utc::now());
            assert!(state.task_id().is_some());
            assert!(update(&mut state, SessionEvent::StopRequested, Utc::now()).is_empty());
            assert!(update(&mut state, SessionEvent::StatusRequested, Utc::now()).is_empty());
        }
    }

    #[test]
    fn float_task_id_can_be_stopped() {
        let mut state = SessionState::new();
        update(&mut state, inbound(r#"{"type":"task_started","task_id":1.5}"#), Utc::now());
        let effects = update(&mut state, SessionEvent::StopRequested, Utc::now());
        match &effects[..] {
            [SessionEffect::Send(OutboundMessage::Stop { task_id })] => {
                assert_eq!(task_id.to_string(), "1.5");
            }
            other => panic!("unexpected effects: {:?}", other),
        }
    }

    #[test]
    fn null_event_is_ignored() {
        let mut state = SessionState::new();
        started(&mut state, "t1");
        let effects = update(
            &mut state,
            inbound(r#"{"type":"llm_response","event":null,"data":null}"#),
            Utc::now(),
        );
        assert!(effects.is_empty());
        assert_eq!(state.phase(), TaskPhase::Started);
    }

    #[test]
    fn stop_with_task_sends_task_id() {
        let mut state = SessionState::new();
        started(&mut state, "t1");
        let effects = update(&mut state, SessionEvent::StopRequested, Utc::now());
        assert_eq!(
            effects,
            vec![SessionEffect::Send(OutboundMessage::Stop {
                task_id: "t1".into()
            })]
        );
        // 停止只是请求，任务 ID 保留到 interrupted
        assert_eq!(state.task_id(), Some(&TaskId::from("t1")));
    }

    #[test]
    fn task_lifecycle_follows_server_events() {
        let mut state = SessionState::new();
        let t0 = Utc::now();

        update(&mut state, inbound(r#"{"type":"task_started","task_id":"t1"}"#), t0);
        assert_eq!(state.phase(), TaskPhase::Started);
        assert_eq!(state.task_id(), Some(&TaskId::from("t1")));

        update(&mut state, inbound(r#"{"type":"llm_response","event":"start","data":"begin reply"}"#), t0);
        assert_eq!(state.phase(), TaskPhase::Streaming);

        let effects = update(
            &mut state,
            inbound(r#"{"type":"llm_response","event":"end","data":"end reply"}"#),
            t0 + Duration::seconds(3),
        );
        assert_eq!(state.phase(), TaskPhase::Idle);
        assert!(state.task_id().is_none());
        assert!(state.is_finished());
        assert_eq!(
            effects,
            vec![
                SessionEffect::HideStop,
                SessionEffect::Notice(Notice::TaskFinished {
                    task_id: Some("t1".into()),
                    outcome: TaskOutcome::Ended,
                    elapsed: Some(Duration::seconds(3)),
                }),
            ]
        );
    }

    #[test]
    fn terminal_events_clear_task_and_hide_stop() {
        for (text, outcome) in [
            (r#"{"type":"llm_response","event":"interrupted","data":"x"}"#, TaskOutcome::Interrupted),
            (r#"{"type":"llm_response","event":"error","data":"boom"}"#, TaskOutcome::Failed),
            (r#"{"type":"llm_response","event":"end"}"#, TaskOutcome::Ended),
        ] {
            let mut state = SessionState::new();
            started(&mut state, "t1");
            let effects = update(&mut state, inbound(text), Utc::now());
            assert!(state.task_id().is_none());
            assert_eq!(state.last_outcome(), Some(outcome));
            assert!(effects.contains(&SessionEffect::HideStop));
        }
    }

    #[test]
    fn error_marker_contains_data() {
        let mut state = SessionState::new();
        let effects = update(
            &mut state,
            inbound(r#"{"type":"llm_response","event":"error","data":"boom"}"#),
            Utc::now(),
        );
        assert_eq!(effects[0], SessionEffect::Append("\n[Error: boom]".to_string()));
    }

    #[test]
    fn message_appends_data_verbatim() {
        let mut state = SessionState::new();
        let effects = update(
            &mut state,
            SessionEvent::Inbound(InboundMessage::LlmResponse {
                event: LlmEvent::Message,
                data: Some(json!("<b>hi</b>")),
            }),
            Utc::now(),
        );
        assert_eq!(effects, vec![SessionEffect::Append("<b>hi</b>".to_string())]);
    }

    #[test]
    fn informational_messages_do_not_touch_task() {
        let mut state = SessionState::new();
        started(&mut state, "t1");

        let effects = update(
            &mut state,
            inbound(r#"{"type":"command_sent","command":"stop","task_id":"t1"}"#),
            Utc::now(),
        );
        assert_eq!(
            effects,
            vec![SessionEffect::Notice(Notice::CommandSent {
                command: "stop".to_string(),
                task_id: "t1".into(),
            })]
        );

        assert!(update(&mut state, inbound(r#"{"type":"mystery"}"#), Utc::now()).is_empty());
        assert!(update(&mut state, inbound(r#"{"type":"llm_response","event":"thinking"}"#), Utc::now()).is_empty());
        assert_eq!(state.task_id(), Some(&TaskId::from("t1")));
        assert_eq!(state.phase(), TaskPhase::Started);
    }

    #[test]
    fn close_only_notifies() {
        let mut state = SessionState::new();
        started(&mut state, "t1");
        let effects = update(&mut state, SessionEvent::Closed, Utc::now());
        assert_eq!(effects, vec![SessionEffect::Notice(Notice::ConnectionClosed)]);
        assert_eq!(state.task_id(), Some(&TaskId::from("t1")));
    }

    #[test]
    fn new_question_resets_last_outcome() {
        let mut state = SessionState::new();
        update(&mut state, inbound(r#"{"type":"llm_response","event":"end"}"#), Utc::now());
        assert!(state.is_finished());
        update(&mut state, SessionEvent::SubmitQuestion("再来".to_string()), Utc::now());
        assert!(!state.is_finished());
    }
}
