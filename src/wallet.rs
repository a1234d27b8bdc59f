//! Hex-encoded key pairs for demo participants.
use crate::crypto::{KeyPair, SignatureService};
use crate::error::ChainError;

#[derive(Debug, Clone)]
pub struct Wallet {
    pub name: Option<String>,
    /// Uncompressed public key, hex. Doubles as the ledger address.
    pub public_key: String,
    pub private_key: String,
    key_pair: KeyPair,
}

impl Wallet {
    pub fn new(name: Option<String>, signer: &SignatureService) -> Self {
        Self::from_key_pair(name, signer.generate_key_pair())
    }

    pub fn from_private_key(
        name: Option<String>,
        private_key: &str,
        signer: &SignatureService,
    ) -> Result<Self, ChainError> {
        Ok(Self::from_key_pair(name, signer.key_pair_from_secret_hex(private_key)?))
    }

    fn from_key_pair(name: Option<String>, key_pair: KeyPair) -> Self {
        Wallet {
            name,
            public_key: key_pair.public_key_hex(),
            private_key: key_pair.secret_key_hex(),
            key_pair,
        }
    }

    pub fn address(&self) -> &str {
        &self.public_key
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// True when the stored public key is the one derived from the private key.
    pub fn is_valid(&self, signer: &SignatureService) -> bool {
        validate_wallet(signer, &self.private_key, &self.public_key)
    }
}

pub fn validate_wallet(signer: &SignatureService, private_key: &str, public_key: &str) -> bool {
    signer.is_consistent_pair(private_key, public_key)
}
