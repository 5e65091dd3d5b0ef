pub mod config;
pub mod types;
pub mod session;
pub mod health;
pub mod cli;

pub use config::{Config, ClientConfig, DisplayConfig};
pub use session::{ClientSession, Transport, View};
pub use cli::run_cli;
