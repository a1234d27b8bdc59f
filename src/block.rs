use crate::crypto::SignatureService;
use crate::error::ChainError;
use crate::transaction::{now_millis, update_field, Transaction};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An ordered batch of transactions linked to its predecessor by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    timestamp: u64,
    transactions: Vec<Transaction>,
    previous_hash: String,
    nonce: u64,
    hash: String,
}

impl Block {
    pub fn new(transactions: Vec<Transaction>, previous_hash: impl Into<String>) -> Self {
        Self::with_timestamp(transactions, previous_hash, now_millis())
    }

    pub fn with_timestamp(
        transactions: Vec<Transaction>,
        previous_hash: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        let mut block = Block {
            timestamp,
            transactions,
            previous_hash: previous_hash.into(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// The stored hash. Validation compares it to [`Block::calculate_hash`].
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Hasher state after everything except the nonce has been absorbed.
    pub fn header_hasher(&self) -> Sha256 {
        let mut hasher = Sha256::new();
        update_field(&mut hasher, self.previous_hash.as_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update((self.transactions.len() as u64).to_le_bytes());
        for tx in &self.transactions {
            tx.update_block_hasher(&mut hasher);
        }
        hasher
    }

    /// Finishes a cloned header hasher with `nonce`.
    pub fn hash_with_nonce(header: &Sha256, nonce: u64) -> String {
        let mut hasher = header.clone();
        hasher.update(nonce.to_le_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn calculate_hash(&self) -> String {
        Self::hash_with_nonce(&self.header_hasher(), self.nonce)
    }

    pub(crate) fn set_proof(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    /// Gives the transactions back, used when a mining round is abandoned.
    pub(crate) fn into_transactions(self) -> Vec<Transaction> {
        self.transactions
    }

    /// True when every transaction is valid. Stops at the first invalid one
    /// and passes transaction errors through unchanged.
    pub fn has_valid_transactions(&self, signer: &SignatureService) -> Result<bool, ChainError> {
        for tx in &self.transactions {
            if !tx.is_valid(signer)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    #[cfg(any(test, feature = "tamper-hooks"))]
    pub(crate) fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }
}
