pub mod config;
pub mod errors;

pub use config::{AppConfig, ReaperSettings, ServerSettings, TransferSettings};
pub use errors::AppError;
