use crate::block::Block;
use crate::crypto::SignatureService;
use std::fmt;
use thiserror::Error;

/// The rule a block broke during chain validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    InvalidTransactions,
    HashMismatch,
    PreviousHashMismatch,
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationRule::InvalidTransactions => write!(f, "transactions are invalid"),
            ValidationRule::HashMismatch => write!(f, "block hash is invalid"),
            ValidationRule::PreviousHashMismatch => write!(f, "previous block hash is invalid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid block at height {height}, {rule}: {detail}")]
pub struct ChainViolation {
    pub height: usize,
    pub rule: ValidationRule,
    pub detail: String,
}

impl ChainViolation {
    fn new(height: usize, rule: ValidationRule, detail: impl Into<String>) -> Self {
        ChainViolation {
            height,
            rule,
            detail: detail.into(),
        }
    }
}

/// Checks every block after genesis, in order: transaction signatures, stored
/// hash against recomputed hash, then linkage to the recomputed parent hash.
pub fn validate_chain(blocks: &[Block], signer: &SignatureService) -> Result<(), ChainViolation> {
    for (offset, pair) in blocks.windows(2).enumerate() {
        let height = offset + 1;
        let (previous, current) = (&pair[0], &pair[1]);

        match current.has_valid_transactions(signer) {
            Ok(true) => {}
            Ok(false) => {
                return Err(ChainViolation::new(
                    height,
                    ValidationRule::InvalidTransactions,
                    "signature verification failed",
                ))
            }
            Err(e) => {
                return Err(ChainViolation::new(
                    height,
                    ValidationRule::InvalidTransactions,
                    e.to_string(),
                ))
            }
        }

        let recomputed = current.calculate_hash();
        if current.hash() != recomputed {
            return Err(ChainViolation::new(
                height,
                ValidationRule::HashMismatch,
                format!("stored {} but recomputed {}", current.hash(), recomputed),
            ));
        }

        let parent_hash = previous.calculate_hash();
        if current.previous_hash() != parent_hash {
            return Err(ChainViolation::new(
                height,
                ValidationRule::PreviousHashMismatch,
                format!(
                    "links to {} but parent hashes to {}",
                    current.previous_hash(),
                    parent_hash
                ),
            ));
        }
    }
    Ok(())
}
