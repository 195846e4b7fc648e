//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 hashing
//! - ECDSA key management (secp256k1)

pub mod hash;
pub mod keys;

pub use hash::{sha256, sha256_hex};
pub use keys::{sign_message, verify_signature, KeyError, KeyPair, PublicKey};
