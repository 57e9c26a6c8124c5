mod app;
mod server;

pub use app::{AppConfig, AssistantSettings, AuthSettings, EmissionSettings};
pub use server::ServerConfig;
