//! Detector error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("invalid detector configuration: {0}")]
    Config(String),
}

pub type DetectorResult<T> = Result<T, DetectorError>;
