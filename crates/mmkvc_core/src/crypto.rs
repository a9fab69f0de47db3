//! Payload encryption using AES-256-GCM.
//!
//! An instance's crypt key is a passphrase; the 256-bit cipher key is
//! derived from it with HKDF-SHA256. Every log record body is sealed with
//! its own random nonce: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use crate::error::{CoreError, CoreResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

const KDF_SALT: &[u8] = b"mmkvc-crypt-salt";
const KDF_INFO: &[u8] = b"mmkvc-record-key-v1";

/// Encryption key for AES-256-GCM, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Derives a key from an instance passphrase using HKDF-SHA256.
    pub fn derive_from_passphrase(passphrase: &str) -> CoreResult<Self> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), passphrase.as_bytes());
        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(KDF_INFO, &mut bytes)
            .map_err(|_| CoreError::key_derivation_failed("HKDF expand failed"))?;

        Ok(Self { bytes })
    }

    /// Returns the key as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Seals and opens record bodies.
pub struct CryptoManager {
    cipher: Aes256Gcm,
}

impl CryptoManager {
    /// Creates a new crypto manager with the given key.
    #[must_use]
    pub fn new(key: EncryptionKey) -> Self {
        let key_array = GenericArray::from_slice(key.as_bytes());
        let cipher = Aes256Gcm::new(key_array);
        Self { cipher }
    }

    /// Encrypts data, prepending a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> CoreResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CoreError::encryption_failed("encryption error"))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend(ciphertext);

        Ok(result)
    }

    /// Decrypts data produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns an error if decryption fails (wrong key, corrupted data, etc.).
    pub fn decrypt(&self, ciphertext: &[u8]) -> CoreResult<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CoreError::decryption_failed("ciphertext too short"));
        }

        let nonce = Nonce::from_slice(&ciphertext[..NONCE_SIZE]);
        self.cipher
            .decrypt(nonce, &ciphertext[NONCE_SIZE..])
            .map_err(|_| CoreError::decryption_failed("decryption error"))
    }
}

impl std::fmt::Debug for CryptoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(passphrase: &str) -> CryptoManager {
        CryptoManager::new(EncryptionKey::derive_from_passphrase(passphrase).unwrap())
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = EncryptionKey::derive_from_passphrase("secret").unwrap();
        let b = EncryptionKey::derive_from_passphrase("secret").unwrap();
        let c = EncryptionKey::derive_from_passphrase("other").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn encrypt_then_decrypt() {
        let m = manager("secret");
        let sealed = m.encrypt(b"hello").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + 5 + TAG_SIZE);
        assert_eq!(m.decrypt(&sealed).unwrap(), b"hello");
    }

    #[test]
    fn nonces_differ() {
        let m = manager("secret");
        assert_ne!(m.encrypt(b"same").unwrap(), m.encrypt(b"same").unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = manager("a").encrypt(b"data").unwrap();
        assert!(manager("b").decrypt(&sealed).is_err());
    }

    #[test]
    fn short_ciphertext_fails() {
        let result = manager("a").decrypt(&[0u8; 10]);
        assert!(matches!(result, Err(CoreError::DecryptionFailed { .. })));
    }

    #[test]
    fn debug_redacts_key() {
        let key = EncryptionKey::derive_from_passphrase("secret").unwrap();
        assert!(format!("{key:?}").contains("REDACTED"));
    }
}
