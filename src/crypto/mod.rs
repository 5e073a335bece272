//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing and the proof-of-work predicate
//! - ECDSA key management (secp256k1)

pub mod hash;
pub mod keys;

pub use hash::{hex_meets_difficulty, leading_zero_bits, meets_difficulty, sha256, sha256_hex};
pub use keys::{
    address_from_private_key_hex, public_key_from_hex, sign_digest, verify_digest, KeyError,
    KeyPair,
};
