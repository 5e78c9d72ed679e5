use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Logger error: {0}")]
    Logger(#[from] log::SetLoggerError),
    #[error("Toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Input/output error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Bundle(#[from] appimg::Error),
    #[error("Invalid log level: {0:?}")]
    LogLevel(String),
    #[error("Resource `{0}` not found")]
    ResourceNotFound(String),
}
