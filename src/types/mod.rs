mod protocol;

pub use protocol::{data_text, InboundMessage, LlmEvent, OutboundMessage, TaskId};
