use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// Session file body when sealed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedPayload {
    pub encrypted_data: String,
    pub nonce: String,
}

/// AES-256-GCM sealing for the on-disk session.
#[derive(Clone)]
pub struct SessionCipher {
    key: [u8; KEY_SIZE],
}

impl SessionCipher {
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Derive the key from an operator supplied passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&digest);
        Self { key }
    }

    pub fn seal(&self, plaintext: &str) -> Result<SealedPayload, StorageError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| StorageError::Crypto(format!("Encryption error: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let encrypted = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| StorageError::Crypto(format!("Encryption failed: {}", e)))?;

        Ok(SealedPayload {
            encrypted_data: BASE64.encode(encrypted),
            nonce: BASE64.encode(nonce_bytes),
        })
    }

    pub fn open(&self, sealed: &SealedPayload) -> Result<String, StorageError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| StorageError::Crypto(format!("Decryption error: {}", e)))?;

        let nonce_bytes = BASE64
            .decode(&sealed.nonce)
            .map_err(|e| StorageError::Corrupt(format!("Invalid nonce: {}", e)))?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(StorageError::Corrupt("Invalid nonce length".to_string()));
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let encrypted_data = BASE64
            .decode(&sealed.encrypted_data)
            .map_err(|e| StorageError::Corrupt(format!("Invalid encrypted data: {}", e)))?;

        let decrypted = cipher
            .decrypt(nonce, encrypted_data.as_ref())
            .map_err(|e| StorageError::Crypto(format!("Decryption failed: {}", e)))?;

        String::from_utf8(decrypted).map_err(|e| StorageError::Corrupt(format!("Invalid UTF-8: {}", e)))
    }
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCipher").finish_non_exhaustive()
    }
}
