//! Cryptographic primitives for the encrypted login store.
//!
//! This module provides:
//! - Device-adaptive Argon2id key stretching (12-64 MiB based on RAM)
//! - A [`StoreKey`] with record and key-check subkeys split via HKDF-SHA256
//! - XChaCha20-Poly1305 sealing of record payloads, bound to the record guid
//!
//! # Security Notes
//!
//! - XChaCha20 uses 192-bit nonces (24 bytes), safe for random generation
//! - The salt and Argon2 parameters are stored per database, so a store
//!   opens with the same derivation no matter which device created it
//! - Subkeys are zeroized on drop

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use loginstore_types::Guid;
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Nonce size for XChaCha20-Poly1305 (192 bits = 24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Key size for XChaCha20-Poly1305 (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Salt size for Argon2id.
pub const SALT_SIZE: usize = 16;

/// Plaintext sealed with the key-check subkey when a store is created.
const KEY_CHECK_PLAINTEXT: &[u8] = b"loginstore-key-check-v1";

/// HKDF salt for splitting the stretched key.
const HKDF_SALT: &[u8] = b"loginstore-store-key-v1";

/// Crypto errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (authentication error).
    #[error("decryption failed: authentication error")]
    DecryptionFailed,

    /// Ciphertext shorter than a nonce plus tag.
    #[error("ciphertext truncated: {len} bytes")]
    Truncated {
        /// Actual length.
        len: usize,
    },

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),
}

/// Argon2id parameters for device-adaptive key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    memory_mib: u32,
    iterations: u32,
    parallelism: u32,
}

impl Argon2Params {
    /// Explicit parameters.
    pub fn new(memory_mib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_mib: memory_mib.max(1),
            iterations: iterations.max(1),
            parallelism: parallelism.max(1),
        }
    }

    /// Create parameters based on available RAM in MB.
    ///
    /// Scaling:
    /// - < 2000 MB: 12 MiB, 3 iterations (low-end mobile)
    /// - < 4000 MB: 19 MiB, 2 iterations (mid-range mobile)
    /// - < 8000 MB: 46 MiB, 1 iteration (high-end mobile)
    /// - >= 8000 MB: 64 MiB, 3 iterations (desktop)
    pub fn for_ram_mb(ram_mb: u64) -> Self {
        if ram_mb < 2000 {
            Self::new(12, 3, 1)
        } else if ram_mb < 4000 {
            Self::new(19, 2, 1)
        } else if ram_mb < 8000 {
            Self::new(46, 1, 1)
        } else {
            Self::new(64, 3, 4)
        }
    }

    /// Get memory in MiB.
    pub fn memory_mib(&self) -> u32 {
        self.memory_mib
    }

    /// Get iteration count.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Get lane count.
    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    fn to_argon2_params(self) -> Result<Params, CryptoError> {
        Params::new(
            self.memory_mib * 1024, // Convert MiB to KiB
            self.iterations,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))
    }
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self::for_ram_mb(detect_available_ram_mb())
    }
}

/// Detect available RAM in megabytes.
pub fn detect_available_ram_mb() -> u64 {
    use sysinfo::System;
    let sys = System::new_all();
    sys.total_memory() / (1024 * 1024) // Convert bytes to MB
}

/// Fresh random salt for a new store.
pub fn random_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    getrandom::getrandom(&mut salt).expect("getrandom failed");
    salt
}

/// Keys protecting one store, derived from the caller's key material.
///
/// Holds a record subkey (payload encryption) and a key-check subkey (used
/// only to verify the key on open).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct StoreKey {
    record_key: [u8; KEY_SIZE],
    check_key: [u8; KEY_SIZE],
}

impl StoreKey {
    /// Stretch `key` with Argon2id and split it into subkeys.
    pub fn derive(key: &str, salt: &[u8], params: Argon2Params) -> Result<Self, CryptoError> {
        let argon2 = Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            params.to_argon2_params()?,
        );

        let mut stretched = [0u8; KEY_SIZE];
        argon2
            .hash_password_into(key.as_bytes(), salt, &mut stretched)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

        let hkdf = Hkdf::<Sha256>::new(Some(HKDF_SALT), &stretched);
        stretched.zeroize();

        let mut record_key = [0u8; KEY_SIZE];
        let mut check_key = [0u8; KEY_SIZE];
        hkdf.expand(b"records", &mut record_key)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
        hkdf.expand(b"key-check", &mut check_key)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

        Ok(Self {
            record_key,
            check_key,
        })
    }

    /// Encrypt a record payload. Returns `nonce || ciphertext`.
    pub fn seal_record(&self, guid: &Guid, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        seal(&self.record_key, plaintext, guid.as_bytes())
    }

    /// Decrypt a record payload produced by [`StoreKey::seal_record`].
    ///
    /// Fails if the blob was sealed under a different guid.
    pub fn open_record(&self, guid: &Guid, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        open(&self.record_key, sealed, guid.as_bytes())
    }

    /// Ciphertext stored at creation to recognize this key later.
    pub fn key_check(&self) -> Result<Vec<u8>, CryptoError> {
        seal(&self.check_key, KEY_CHECK_PLAINTEXT, &[])
    }

    /// Whether `sealed` was produced by [`StoreKey::key_check`] under this key.
    pub fn verify_key_check(&self, sealed: &[u8]) -> bool {
        matches!(open(&self.check_key, sealed, &[]), Ok(plain) if plain == KEY_CHECK_PLAINTEXT)
    }
}

// Don't leak keys in debug output
impl std::fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoreKey {{ record_key: [REDACTED], check_key: [REDACTED] }}")
    }
}

fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    // Generate random 192-bit nonce
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce_bytes).expect("getrandom failed");
    let nonce = XNonce::from_slice(&nonce_bytes);

    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::EncryptionFailed("aead encrypt failed".into()))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn open(key: &[u8; KEY_SIZE], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    // 16-byte Poly1305 tag after the nonce
    if sealed.len() < NONCE_SIZE + 16 {
        return Err(CryptoError::Truncated { len: sealed.len() });
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast() -> Argon2Params {
        Argon2Params::new(1, 1, 1)
    }

    fn key(material: &str) -> StoreKey {
        StoreKey::derive(material, &[7u8; SALT_SIZE], fast()).unwrap()
    }

    // ===========================================
    // Argon2 Parameter Tests
    // ===========================================

    #[test]
    fn argon2_parameters_scale_with_ram() {
        let params_low = Argon2Params::for_ram_mb(1500);
        assert_eq!(params_low.memory_mib(), 12);
        assert_eq!(params_low.iterations(), 3);

        let params_mid = Argon2Params::for_ram_mb(3000);
        assert_eq!(params_mid.memory_mib(), 19);
        assert_eq!(params_mid.iterations(), 2);

        let params_high = Argon2Params::for_ram_mb(6000);
        assert_eq!(params_high.memory_mib(), 46);
        assert_eq!(params_high.iterations(), 1);

        let params_desktop = Argon2Params::for_ram_mb(16000);
        assert_eq!(params_desktop.memory_mib(), 64);
        assert_eq!(params_desktop.parallelism(), 4);
    }

    #[test]
    fn explicit_parameters_are_clamped_to_minimum() {
        let params = Argon2Params::new(0, 0, 0);
        assert_eq!(params.memory_mib(), 1);
        assert_eq!(params.iterations(), 1);
        assert_eq!(params.parallelism(), 1);
    }

    #[test]
    fn store_key_derivation_runs_argon2() {
        let params = Argon2Params::for_ram_mb(1500);

        let start = std::time::Instant::now();
        let derived = StoreKey::derive("correct horse", &random_salt(), params).unwrap();
        let elapsed = start.elapsed();

        assert!(derived.key_check().is_ok());
        assert!(elapsed <= Duration::from_secs(30));
    }

    // ===========================================
    // Key Derivation Tests
    // ===========================================

    #[test]
    fn derivation_is_deterministic() {
        let a = key("same");
        let b = key("same");
        let sealed = a.seal_record(&Guid::from("g"), b"payload").unwrap();
        assert_eq!(b.open_record(&Guid::from("g"), &sealed).unwrap(), b"payload");
    }

    #[test]
    fn salt_changes_the_key() {
        let a = StoreKey::derive("same", &[1u8; SALT_SIZE], fast()).unwrap();
        let b = StoreKey::derive("same", &[2u8; SALT_SIZE], fast()).unwrap();
        assert!(!b.verify_key_check(&a.key_check().unwrap()));
    }

    #[test]
    fn subkeys_are_separated() {
        let k = key("material");
        // A record sealed with the record key is not a valid key check.
        let sealed = k.seal_record(&Guid::empty(), KEY_CHECK_PLAINTEXT).unwrap();
        assert!(!k.verify_key_check(&sealed));
    }

    // ===========================================
    // XChaCha20-Poly1305 Tests (192-bit nonces)
    // ===========================================

    #[test]
    fn sealed_record_layout_is_nonce_then_ciphertext() {
        let k = key("material");
        let sealed = k.seal_record(&Guid::from("g"), b"hello").unwrap();
        // nonce + plaintext + 16-byte tag
        assert_eq!(sealed.len(), NONCE_SIZE + 5 + 16);
    }

    #[test]
    fn random_nonces_differ() {
        let k = key("material");
        let guid = Guid::from("g");
        let a = k.seal_record(&guid, b"same").unwrap();
        let b = k.seal_record(&guid, b"same").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let guid = Guid::from("g");
        let sealed = key("one").seal_record(&guid, b"secret").unwrap();
        assert!(matches!(
            key("two").open_record(&guid, &sealed),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn record_is_bound_to_its_guid() {
        let k = key("material");
        let sealed = k.seal_record(&Guid::from("a"), b"secret").unwrap();
        assert!(matches!(
            k.open_record(&Guid::from("b"), &sealed),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn corrupted_ciphertext_fails_decryption() {
        let k = key("material");
        let guid = Guid::from("g");
        let mut sealed = k.seal_record(&guid, b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert!(k.open_record(&guid, &sealed).is_err());
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        let k = key("material");
        assert!(matches!(
            k.open_record(&Guid::from("g"), &[0u8; 10]),
            Err(CryptoError::Truncated { len: 10 })
        ));
    }

    #[test]
    fn empty_plaintext_seals() {
        let k = key("material");
        let guid = Guid::from("g");
        let sealed = k.seal_record(&guid, b"").unwrap();
        assert!(k.open_record(&guid, &sealed).unwrap().is_empty());
    }

    // ===========================================
    // Key Check Tests
    // ===========================================

    #[test]
    fn key_check_verifies_same_key_only() {
        let check = key("right").key_check().unwrap();
        assert!(key("right").verify_key_check(&check));
        assert!(!key("wrong").verify_key_check(&check));
        assert!(!key("right").verify_key_check(b"garbage"));
    }

    #[test]
    fn store_key_debug_is_redacted() {
        let debug = format!("{:?}", key("material"));
        assert!(debug.contains("REDACTED"));
    }

    // ===========================================
    // System Detection Test
    // ===========================================

    #[test]
    fn detect_ram_returns_reasonable_value() {
        let ram_mb = detect_available_ram_mb();
        assert!(ram_mb >= 256, "Detected RAM: {} MB", ram_mb);
        assert!(ram_mb < 1024 * 1024, "Detected RAM: {} MB", ram_mb);
    }
}
