//! ECDSA key management for the ledger
//!
//! Provides key pair generation, signing, and verification using
//! the secp256k1 elliptic curve. An address is the uncompressed public
//! key in hex (130 characters, `04` prefix).

use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid message digest: expected 32 bytes")]
    InvalidDigest,
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (uncompressed, `04` prefix).
    /// This is the ledger address of the key pair.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize_uncompressed())
    }

    /// Sign a 32-byte digest, returning the DER signature as hex
    pub fn sign_digest(&self, digest: &[u8]) -> Result<String, KeyError> {
        sign_digest(&self.secret_key, digest)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Derive the ledger address (uncompressed public key hex) from a private key
pub fn address_from_private_key_hex(hex_key: &str) -> Result<String, KeyError> {
    Ok(KeyPair::from_private_key_hex(hex_key)?.public_key_hex())
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Sign a 32-byte digest with a secret key
pub fn sign_digest(secret_key: &SecretKey, digest: &[u8]) -> Result<String, KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(digest).map_err(|_| KeyError::InvalidDigest)?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(hex::encode(signature.serialize_der().to_vec()))
}

/// Verify a hex DER signature over a 32-byte digest
pub fn verify_digest(
    public_key: &PublicKey,
    digest: &[u8],
    signature_hex: &str,
) -> Result<bool, KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(digest).map_err(|_| KeyError::InvalidDigest)?;
    let bytes = hex::decode(signature_hex).map_err(|_| KeyError::InvalidSignature)?;
    let mut sig = Signature::from_der(&bytes).map_err(|_| KeyError::InvalidSignature)?;
    sig.normalize_s();

    match secp.verify_ecdsa(&message, &sig, public_key) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256;

    #[test]
    fn test_key_pair_generation() {
        let kp = KeyPair::generate();
        assert_eq!(kp.private_key_hex().len(), 64);
        let address = kp.public_key_hex();
        assert_eq!(address.len(), 130);
        assert!(address.starts_with("04"));
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let digest = sha256(b"Hello, ledger!");

        let signature = kp.sign_digest(&digest).unwrap();
        assert!(verify_digest(&kp.public_key, &digest, &signature).unwrap());

        let other = KeyPair::generate();
        assert!(!verify_digest(&other.public_key, &digest, &signature).unwrap());
    }

    #[test]
    fn test_key_pair_from_hex() {
        let kp1 = KeyPair::generate();
        let private_hex = kp1.private_key_hex();

        let kp2 = KeyPair::from_private_key_hex(&private_hex).unwrap();
        assert_eq!(kp1.public_key_hex(), kp2.public_key_hex());
        assert_eq!(
            address_from_private_key_hex(&private_hex).unwrap(),
            kp1.public_key_hex()
        );
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(KeyPair::from_private_key_hex("zz").is_err());
        assert!(public_key_from_hex("04abcd").is_err());

        let kp = KeyPair::generate();
        assert!(matches!(
            kp.sign_digest(b"short"),
            Err(KeyError::InvalidDigest)
        ));
        assert!(matches!(
            verify_digest(&kp.public_key, &sha256(b"x"), "3044"),
            Err(KeyError::InvalidSignature)
        ));
    }
}
