//! Credential cipher
//!
//! AES-256-GCM with a random nonce prepended to the ciphertext. Bind
//! passwords are stored as standard base64 of `nonce || ciphertext || tag`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{ConnectorError, ConnectorResult};

/// Length of AES-256 key in bytes.
const KEY_LENGTH: usize = 32;

/// Length of GCM nonce in bytes.
const NONCE_LENGTH: usize = 12;

/// Length of GCM authentication tag in bytes.
const TAG_LENGTH: usize = 16;

/// Encrypts and decrypts stored connector secrets.
#[derive(Clone)]
pub struct CredentialCipher {
    key: [u8; KEY_LENGTH],
}

impl CredentialCipher {
    #[must_use]
    pub fn new(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Create a cipher from a hex-encoded key.
    pub fn from_hex(hex_key: &str) -> ConnectorResult<Self> {
        let bytes = hex::decode(hex_key.trim()).map_err(|e| ConnectorError::EncryptionFailed {
            message: format!("invalid hex key: {e}"),
        })?;
        Self::from_bytes(&bytes)
    }

    /// Create a cipher from a base64-encoded key.
    pub fn from_base64(base64_key: &str) -> ConnectorResult<Self> {
        let bytes =
            STANDARD
                .decode(base64_key.trim())
                .map_err(|e| ConnectorError::EncryptionFailed {
                    message: format!("invalid base64 key: {e}"),
                })?;
        Self::from_bytes(&bytes)
    }

    /// Accept either encoding: 64 hex characters, otherwise base64.
    pub fn from_key_string(key: &str) -> ConnectorResult<Self> {
        let key = key.trim();
        if key.len() == KEY_LENGTH * 2 && key.chars().all(|c| c.is_ascii_hexdigit()) {
            Self::from_hex(key)
        } else {
            Self::from_base64(key)
        }
    }

    fn from_bytes(bytes: &[u8]) -> ConnectorResult<Self> {
        if bytes.len() != KEY_LENGTH {
            return Err(ConnectorError::EncryptionFailed {
                message: format!("key must be {} bytes, got {}", KEY_LENGTH, bytes.len()),
            });
        }
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(bytes);
        Ok(Self::new(key))
    }

    fn cipher(&self) -> ConnectorResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|e| ConnectorError::EncryptionFailed {
            message: format!("failed to create cipher: {e}"),
        })
    }

    /// Encrypt to `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> ConnectorResult<Vec<u8>> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext =
            cipher
                .encrypt(nonce, plaintext)
                .map_err(|e| ConnectorError::EncryptionFailed {
                    message: format!("encryption failed: {e}"),
                })?;

        let mut result = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt `nonce || ciphertext || tag`.
    pub fn decrypt(&self, ciphertext: &[u8]) -> ConnectorResult<Vec<u8>> {
        if ciphertext.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(ConnectorError::DecryptionFailed {
                message: "ciphertext too short".to_string(),
            });
        }

        let cipher = self.cipher()?;
        let (nonce_bytes, encrypted) = ciphertext.split_at(NONCE_LENGTH);

        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), encrypted)
            .map_err(|e| ConnectorError::DecryptionFailed {
                message: format!("decryption failed: {e}"),
            })
    }

    /// Encrypt a string to standard base64. Empty input stays empty.
    pub fn encrypt_to_base64(&self, plaintext: &str) -> ConnectorResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        Ok(STANDARD.encode(self.encrypt(plaintext.as_bytes())?))
    }

    /// Decrypt a standard base64 string. Empty input stays empty.
    pub fn decrypt_from_base64(&self, encoded: &str) -> ConnectorResult<String> {
        if encoded.is_empty() {
            return Ok(String::new());
        }
        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| ConnectorError::DecryptionFailed {
                message: format!("invalid base64 ciphertext: {e}"),
            })?;
        let plaintext = self.decrypt(&raw)?;
        String::from_utf8(plaintext).map_err(|e| ConnectorError::DecryptionFailed {
            message: format!("decrypted data is not valid UTF-8: {e}"),
        })
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
