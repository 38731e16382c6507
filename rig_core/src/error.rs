use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum RigError {
    #[error("invalid capture step: {0}% (expected 1-100)")]
    InvalidStep(u32),
    #[error("pwm output error: {0}")]
    Pwm(String),
    #[error("console error: {0}")]
    Console(String),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
