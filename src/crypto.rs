//! Cryptographic primitives for proofchain
//!
//! [`SignatureService`] owns the secp256k1 context it signs and verifies with.
//! Callers build one and hand it to the ledger, so tests can supply a context
//! with a fixed randomization seed instead of relying on process-wide state.

use crate::error::ChainError;
use rand::rngs::OsRng;
use secp256k1::{
    constants::SECRET_KEY_SIZE, ecdsa::Signature, All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 digest, the unit that gets signed.
pub type Sha256Digest = [u8; 32];

/// Hashes arbitrary bytes with SHA-256.
pub fn sha256(data: &[u8]) -> Sha256Digest {
    Sha256::digest(data).into()
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Hex encoding of the uncompressed public key. This is the address format.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize_uncompressed())
    }

    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }
}

/// Signs and verifies transaction digests on secp256k1.
#[derive(Debug, Clone)]
pub struct SignatureService {
    secp: Secp256k1<All>,
}

impl Default for SignatureService {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureService {
    pub fn new() -> Self {
        Self::with_context(Secp256k1::new())
    }

    pub fn with_context(secp: Secp256k1<All>) -> Self {
        SignatureService { secp }
    }

    /// Builds a service whose context is blinded with a fixed seed.
    pub fn with_seed(seed: &[u8; 32]) -> Self {
        let mut secp = Secp256k1::new();
        secp.seeded_randomize(seed);
        Self::with_context(secp)
    }

    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate_key_pair(&self) -> KeyPair {
        let secret_key = SecretKey::new(&mut OsRng);
        self.key_pair_from_secret_key(secret_key)
    }

    pub fn key_pair_from_secret_key(&self, secret_key: SecretKey) -> KeyPair {
        let public_key = PublicKey::from_secret_key(&self.secp, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Decodes a hex private key and derives its public half.
    pub fn key_pair_from_secret_hex(&self, secret_hex: &str) -> Result<KeyPair, ChainError> {
        let bytes = hex::decode(secret_hex)
            .map_err(|e| ChainError::CryptoError(format!("Invalid hex private key: {}", e)))?;
        let secret_key = SecretKey::from_slice(&bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::CryptoError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
            }
        })?;
        Ok(self.key_pair_from_secret_key(secret_key))
    }

    pub fn derive_public_key(&self, secret_hex: &str) -> Result<String, ChainError> {
        Ok(self.key_pair_from_secret_hex(secret_hex)?.public_key_hex())
    }

    /// True when `public_hex` is exactly the public key derived from `secret_hex`.
    pub fn is_consistent_pair(&self, secret_hex: &str, public_hex: &str) -> bool {
        match self.derive_public_key(secret_hex) {
            Ok(derived) => derived == public_hex,
            Err(_) => false,
        }
    }

    /// Signs a digest and returns the DER-encoded signature as hex.
    pub fn sign(&self, secret_key: &SecretKey, digest: &Sha256Digest) -> String {
        let message = Message::from_digest(*digest);
        let signature = self.secp.sign_ecdsa(&message, secret_key);
        hex::encode(&*signature.serialize_der())
    }

    /// Signs on behalf of `declared_sender`, refusing keys that do not belong to it.
    pub fn sign_as(
        &self,
        key_pair: &KeyPair,
        declared_sender: Option<&str>,
        digest: &Sha256Digest,
    ) -> Result<String, ChainError> {
        match declared_sender {
            Some(sender) if sender == key_pair.public_key_hex() => {
                Ok(self.sign(&key_pair.secret_key, digest))
            }
            _ => Err(ChainError::KeyMismatch),
        }
    }

    /// Verifies a hex DER signature against a hex public key.
    ///
    /// Anything that fails to authenticate, including keys or signatures that
    /// do not decode, is reported as `false`.
    pub fn verify(&self, public_key_hex: &str, digest: &Sha256Digest, signature_hex: &str) -> bool {
        let public_key = match hex::decode(public_key_hex)
            .ok()
            .and_then(|bytes| PublicKey::from_slice(&bytes).ok())
        {
            Some(key) => key,
            None => {
                tracing::debug!("Rejecting signature: undecodable public key");
                return false;
            }
        };
        let signature = match hex::decode(signature_hex)
            .ok()
            .and_then(|bytes| Signature::from_der(&bytes).ok())
        {
            Some(sig) => sig,
            None => {
                tracing::debug!("Rejecting signature: undecodable DER signature");
                return false;
            }
        };

        let message = Message::from_digest(*digest);
        self.secp
            .verify_ecdsa(&message, &signature, &public_key)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let service = SignatureService::new();
        let keypair = service.generate_key_pair();
        // Uncompressed key: 0x04 prefix plus two 32-byte coordinates
        assert_eq!(keypair.public_key_hex().len(), 130);
        assert!(keypair.public_key_hex().starts_with("04"));
        assert_eq!(keypair.secret_key_hex().len(), 64);
    }

    #[test]
    fn test_signing_and_verification() {
        let service = SignatureService::new();
        let keypair = service.generate_key_pair();
        let digest = sha256(b"Hello, proofchain!");

        let signature = service.sign(&keypair.secret_key, &digest);
        assert!(service.verify(&keypair.public_key_hex(), &digest, &signature));
    }

    #[test]
    fn test_invalid_signature() {
        let service = SignatureService::new();
        let keypair1 = service.generate_key_pair();
        let keypair2 = service.generate_key_pair();
        let digest = sha256(b"Test message");

        let signature = service.sign(&keypair1.secret_key, &digest);
        assert!(!service.verify(&keypair2.public_key_hex(), &digest, &signature));
    }

    #[test]
    fn test_tampered_message() {
        let service = SignatureService::new();
        let keypair = service.generate_key_pair();
        let signature = service.sign(&keypair.secret_key, &sha256(b"Original message"));

        assert!(!service.verify(
            &keypair.public_key_hex(),
            &sha256(b"Tampered message"),
            &signature
        ));
    }

    #[test]
    fn test_garbage_inputs_do_not_verify() {
        let service = SignatureService::new();
        let keypair = service.generate_key_pair();
        let digest = sha256(b"Test");
        let signature = service.sign(&keypair.secret_key, &digest);

        assert!(!service.verify("zz-not-hex", &digest, &signature));
        assert!(!service.verify(&keypair.public_key_hex(), &digest, "3006020101020101"));
        assert!(!service.verify(&keypair.public_key_hex(), &digest, ""));
    }

    #[test]
    fn test_sign_as_rejects_foreign_key() {
        let service = SignatureService::new();
        let alice = service.generate_key_pair();
        let bob = service.generate_key_pair();
        let digest = sha256(b"transfer");

        let result = service.sign_as(&bob, Some(&alice.public_key_hex()), &digest);
        assert_eq!(result, Err(ChainError::KeyMismatch));
        assert_eq!(service.sign_as(&bob, None, &digest), Err(ChainError::KeyMismatch));
        assert!(service
            .sign_as(&alice, Some(&alice.public_key_hex()), &digest)
            .is_ok());
    }

    #[test]
    fn test_derive_and_consistency() {
        let service = SignatureService::with_seed(&[7u8; 32]);
        let keypair = service.generate_key_pair();
        let other = service.generate_key_pair();

        let derived = service.derive_public_key(&keypair.secret_key_hex()).unwrap();
        assert_eq!(derived, keypair.public_key_hex());
        assert!(service.is_consistent_pair(&keypair.secret_key_hex(), &keypair.public_key_hex()));
        assert!(!service.is_consistent_pair(&keypair.secret_key_hex(), &other.public_key_hex()));
        assert!(!service.is_consistent_pair("not-hex", &keypair.public_key_hex()));
    }

    #[test]
    fn test_from_secret_hex_invalid_length() {
        let service = SignatureService::new();
        let short = hex::encode([1u8; SECRET_KEY_SIZE - 1]);
        let result = service.key_pair_from_secret_hex(&short);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Secret key must be"));
    }
}
