pub mod config;
pub mod models;
pub mod render;
pub mod service;
pub mod terminal;
pub mod workflow;

pub use config::{Cli, ClientConfig, Command, ThemeAction};
pub use service::HttpReportService;
pub use terminal::TerminalSession;
pub use workflow::{create_report_service, create_report_session, create_theme_controller};
pub use models::*;
