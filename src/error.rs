//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("llm error: {0}")]
    Llm(#[from] crate::llm::ProviderError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn store_error_display() {
        let e = AppError::Store("database is locked".into());
        assert!(e.to_string().starts_with("store error"));
        assert!(e.to_string().contains("database is locked"));
    }

    #[test]
    fn provider_error_converts() {
        let e: AppError = crate::llm::ProviderError::UnknownProvider("nope".into()).into();
        assert!(e.to_string().contains("unknown provider: nope"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }
}
