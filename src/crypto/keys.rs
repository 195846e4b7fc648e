//! ECDSA key management
//!
//! Provides key pair generation, signing, and verification using
//! the secp256k1 elliptic curve. Public keys travel as hex-encoded
//! compressed points (66 hex chars), which is also the key half of a
//! signature contribution line.

use bip39::Mnemonic;
use rand::rngs::OsRng;
use rand::RngCore;
use secp256k1::{Message, Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

use super::hash::sha256;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A secp256k1 public key
///
/// Ordered and hashed by its compressed encoding so it can key the
/// signature map of a transaction.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(secp256k1::PublicKey);

impl PublicKey {
    /// Parse a public key from its compressed or uncompressed encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        secp256k1::PublicKey::from_slice(bytes)
            .map(Self)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
    }

    /// Compressed 33-byte encoding
    pub fn to_bytes(&self) -> [u8; 33] {
        self.0.serialize()
    }

    /// Compressed encoding as hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verify a signature made over `message` by the matching private key
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        verify_signature(self, message, signature)
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bytes = hex::decode(trimmed)
            .map_err(|e| KeyError::InvalidPublicKey(format!("{trimmed}: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key: PublicKey(public_key),
        }
    }

    /// Generate a key pair together with the 24-word phrase it derives from
    pub fn generate_with_mnemonic() -> Result<(Self, Mnemonic), KeyError> {
        let mut entropy = [0u8; 32];
        OsRng.fill_bytes(&mut entropy);
        let mnemonic = Mnemonic::from_entropy(&entropy)
            .map_err(|e| KeyError::InvalidMnemonic(e.to_string()))?;
        let key_pair = Self::from_mnemonic(&mnemonic)?;
        Ok((key_pair, mnemonic))
    }

    /// Recover a key pair from a BIP-39 phrase
    ///
    /// The secret key is the first 32 bytes of the phrase's seed (empty
    /// passphrase).
    pub fn from_mnemonic(mnemonic: &Mnemonic) -> Result<Self, KeyError> {
        let seed = mnemonic.to_seed("");
        let secret_key = SecretKey::from_slice(&seed[..32])?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Parse a phrase and recover its key pair
    pub fn from_phrase(phrase: &str) -> Result<Self, KeyError> {
        let mnemonic =
            Mnemonic::parse(phrase).map_err(|e| KeyError::InvalidMnemonic(e.to_string()))?;
        Self::from_mnemonic(&mnemonic)
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key: PublicKey(public_key),
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        self.public_key.to_hex()
    }

    /// Sign a message with the private key
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        sign_message(&self.secret_key, message)
    }

    /// Verify a signature against this key pair's public key
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        verify_signature(&self.public_key, message, signature)
    }
}

impl FromStr for KeyPair {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_private_key_hex(s)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Sign a message with a secret key
///
/// The message is hashed with SHA-256 first; the result is a compact
/// 64-byte ECDSA signature.
pub fn sign_message(secret_key: &SecretKey, message: &[u8]) -> Result<Vec<u8>, KeyError> {
    let secp = Secp256k1::new();
    let digest = Message::from_digest_slice(&sha256(message))?;
    let signature = secp.sign_ecdsa(&digest, secret_key);
    Ok(signature.serialize_compact().to_vec())
}

/// Verify a signature against a public key
pub fn verify_signature(
    public_key: &PublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::new();
    let digest = Message::from_digest_slice(&sha256(message))?;
    let sig = secp256k1::ecdsa::Signature::from_compact(signature)
        .map_err(|_| KeyError::InvalidSignature)?;

    match secp.verify_ecdsa(&digest, &sig, &public_key.0) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}
