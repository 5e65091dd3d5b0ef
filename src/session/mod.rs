pub mod client;
pub mod connection;
pub mod effects;
pub mod reducer;
pub mod runner;
pub mod state;
pub mod view;

pub use client::{ClientSession, Transport};
pub use connection::{connect, WsReader, WsSender};
pub use effects::{Notice, SessionEffect};
pub use reducer::SessionEvent;
pub use state::{SessionState, TaskOutcome, TaskPhase};
pub use view::{TerminalView, TranscriptView, View};
