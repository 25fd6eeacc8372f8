// =====================================================
// CRYPTO MODULE
// Key file management and password encryption at rest
// =====================================================

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

const KEY_FILE_NAME: &str = "encryption.key";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher for stored connection passwords. Ciphertext is
/// `base64(nonce || sealed)`; empty passwords stay empty.
#[derive(Clone)]
pub struct PasswordCipher {
    key: Vec<u8>,
}

impl std::fmt::Debug for PasswordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordCipher(<key>)")
    }
}

impl PasswordCipher {
    pub fn from_key(key: Vec<u8>) -> CoreResult<Self> {
        if key.len() != KEY_LEN {
            return Err(CoreError::storage(format!(
                "Encryption key must be {} bytes, got {}",
                KEY_LEN,
                key.len()
            )));
        }
        Ok(Self { key })
    }

    pub fn generate() -> Self {
        Self {
            key: generate_new_key(),
        }
    }

    pub fn encrypt(&self, password: &str) -> CoreResult<String> {
        encrypt_password_with_key(password, &self.key).map_err(CoreError::Storage)
    }

    pub fn decrypt(&self, encrypted: &str) -> CoreResult<String> {
        decrypt_password_with_key(encrypted, &self.key).map_err(CoreError::Storage)
    }
}

pub fn key_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(KEY_FILE_NAME)
}

/// Reads `<data_dir>/encryption.key`, creating it with a fresh key on first run.
pub fn load_or_create_key(data_dir: &Path) -> CoreResult<PasswordCipher> {
    let path = key_file_path(data_dir);

    if path.exists() {
        let encoded = fs::read_to_string(&path)
            .map_err(|e| CoreError::storage(format!("Failed to read key file: {}", e)))?;
        let key = BASE64
            .decode(encoded.trim())
            .map_err(|e| CoreError::storage(format!("Failed to decode key from file: {}", e)))?;
        return PasswordCipher::from_key(key);
    }

    fs::create_dir_all(data_dir)
        .map_err(|e| CoreError::storage(format!("Failed to create data directory: {}", e)))?;
    let key = generate_new_key();
    fs::write(&path, BASE64.encode(&key))
        .map_err(|e| CoreError::storage(format!("Failed to save key to file: {}", e)))?;
    log::info!("Generated new encryption key at {}", path.display());
    PasswordCipher::from_key(key)
}

pub fn generate_new_key() -> Vec<u8> {
    let mut key = vec![0u8; KEY_LEN];
    rand::thread_rng().fill(&mut key[..]);
    key
}

pub fn encrypt_password_with_key(password: &str, key: &[u8]) -> Result<String, String> {
    if password.is_empty() {
        return Ok(String::new());
    }

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| format!("Failed to create cipher: {}", e))?;

    let nonce_bytes: [u8; NONCE_LEN] = rand::thread_rng().gen();
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), password.as_bytes())
        .map_err(|e| format!("Encryption failed: {}", e))?;

    let mut combined = nonce_bytes.to_vec();
    combined.extend(sealed);
    Ok(BASE64.encode(combined))
}

pub fn decrypt_password_with_key(encrypted: &str, key: &[u8]) -> Result<String, String> {
    if encrypted.is_empty() {
        return Ok(String::new());
    }

    let combined = BASE64
        .decode(encrypted)
        .map_err(|e| format!("Base64 decode failed: {}", e))?;
    if combined.len() < NONCE_LEN {
        return Err("Invalid encrypted data".to_string());
    }

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| format!("Failed to create cipher: {}", e))?;
    let (nonce, sealed) = combined.split_at(NONCE_LEN);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|e| format!("Decryption failed: {}", e))?;

    String::from_utf8(plaintext).map_err(|e| format!("UTF-8 conversion failed: {}", e))
}
