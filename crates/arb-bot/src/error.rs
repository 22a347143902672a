//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("registry error: {0}")]
    Registry(#[from] arb_registry::RegistryError),

    #[error("feed error: {0}")]
    Feed(#[from] arb_feed::FeedError),

    #[error("detector error: {0}")]
    Detector(#[from] arb_detector::DetectorError),
}

pub type AppResult<T> = Result<T, AppError>;
