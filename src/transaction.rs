//! Value-transfer transactions
use crate::crypto::{KeyPair, Sha256Digest, SignatureService};
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Transfer amounts in minor units.
pub type Amount = u64;

/// Marker hashed in place of the sender of a reward transaction.
const NO_SENDER_TAG: u8 = 0;
const SENDER_TAG: u8 = 1;

/// Length-prefixed field encoding shared by transaction and block hashing.
pub(crate) fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// A transfer of `amount` from `from_address` to `to_address`.
///
/// A transaction without a sender mints new value (mining reward) and needs
/// no signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    from_address: Option<String>,
    to_address: String,
    amount: Amount,
    timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

impl Transaction {
    pub fn new(from_address: impl Into<String>, to_address: impl Into<String>, amount: Amount) -> Self {
        Transaction {
            from_address: Some(from_address.into()),
            to_address: to_address.into(),
            amount,
            timestamp: now_millis(),
            signature: None,
        }
    }

    /// Mining reward paid to `to_address`.
    pub fn reward(to_address: impl Into<String>, amount: Amount) -> Self {
        Transaction {
            from_address: None,
            to_address: to_address.into(),
            amount,
            timestamp: now_millis(),
            signature: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn from_address(&self) -> Option<&str> {
        self.from_address.as_deref()
    }

    pub fn to_address(&self) -> &str {
        &self.to_address
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn is_reward(&self) -> bool {
        self.from_address.is_none()
    }

    /// SHA-256 over sender, recipient, amount and timestamp.
    pub fn digest(&self) -> Sha256Digest {
        let mut hasher = Sha256::new();
        match &self.from_address {
            Some(from) => {
                hasher.update([SENDER_TAG]);
                update_field(&mut hasher, from.as_bytes());
            }
            None => hasher.update([NO_SENDER_TAG]),
        }
        update_field(&mut hasher, self.to_address.as_bytes());
        hasher.update(self.amount.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn calculate_hash(&self) -> String {
        hex::encode(self.digest())
    }

    /// Feeds every field, signature included, into a block hasher.
    pub(crate) fn update_block_hasher(&self, hasher: &mut Sha256) {
        hasher.update(self.digest());
        match &self.signature {
            Some(sig) => {
                hasher.update([SENDER_TAG]);
                update_field(hasher, sig.as_bytes());
            }
            None => hasher.update([NO_SENDER_TAG]),
        }
    }

    /// Signs the current field values. Signing again replaces the old signature.
    pub fn sign(&mut self, key_pair: &KeyPair, signer: &SignatureService) -> Result<(), ChainError> {
        let digest = self.digest();
        let signature = signer.sign_as(key_pair, self.from_address.as_deref(), &digest)?;
        tracing::debug!(tx = %hex::encode(digest), "Transaction signed: {}", signature);
        self.signature = Some(signature);
        Ok(())
    }

    /// Checks the signature against a freshly computed digest.
    ///
    /// Reward transactions are always valid. A sender without a signature is an
    /// error; a signature that does not verify is `Ok(false)`.
    pub fn is_valid(&self, signer: &SignatureService) -> Result<bool, ChainError> {
        let from = match &self.from_address {
            None => return Ok(true),
            Some(from) => from,
        };
        let signature = match self.signature.as_deref() {
            Some(sig) if !sig.is_empty() => sig,
            _ => return Err(ChainError::MissingSignature),
        };
        Ok(signer.verify(from, &self.digest(), signature))
    }

    #[cfg(any(test, feature = "tamper-hooks"))]
    pub fn set_amount(&mut self, amount: Amount) {
        self.amount = amount;
    }
}
