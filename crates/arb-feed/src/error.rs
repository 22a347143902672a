//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown vendor symbol: {0}")]
    UnknownSymbol(String),

    #[error("No adapter registered for exchange: {0}")]
    NoAdapter(String),

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Vendor error frame: {0}")]
    Vendor(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type FeedResult<T> = Result<T, FeedError>;
