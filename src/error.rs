//! Error types for proofchain

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The signing key does not belong to the transaction's declared sender.
    #[error("Key mismatch: signing key does not match the transaction sender")]
    KeyMismatch,
    /// A non-reward transaction was validated without a signature.
    #[error("Transaction signature is missing")]
    MissingSignature,
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Block height {height} out of range (chain length {length})")]
    OutOfRange { height: i64, length: usize },
    #[error("Amount overflow while summing balances")]
    AmountOverflow,
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Mining cancelled")]
    MiningCancelled,
    #[error("Nonce space exhausted without meeting difficulty")]
    NonceSpaceExhausted,
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
