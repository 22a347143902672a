//! Registry error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Exchange already registered: {0}")]
    ExchangeAlreadyRegistered(String),

    #[error("Pair already registered: {0}")]
    PairAlreadyRegistered(String),

    #[error("Pair {pair} references unknown exchange {exchange}")]
    UnknownExchange { pair: String, exchange: String },

    #[error("Pair {0} lists no exchanges")]
    NoExchangesForPair(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
