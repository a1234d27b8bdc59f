//! proofchain - an educational proof-of-work ledger
//!
//! # Architecture
//!
//! ## Core Ledger
//! - [`blockchain`] - Pending pool, mining rounds, balances, chain validation
//! - [`block`] - Block structure and hashing
//! - [`transaction`] - Signed value transfers
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work search, cancellable and parallel
//!
//! ## Cryptography
//! - [`crypto`] - Signatures and verification (secp256k1)
//! - [`wallet`] - Hex key pairs and the wallet consistency check
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod block;
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;
pub mod wallet;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use block::Block;
pub use blockchain::{Balance, Blockchain, ChainViolation, SharedLedger, ValidationRule};
pub use crypto::{KeyPair, SignatureService};
pub use error::{ChainError, Result};
pub use miner::{CancelToken, Miner};
pub use transaction::{Amount, Transaction};
pub use wallet::Wallet;
