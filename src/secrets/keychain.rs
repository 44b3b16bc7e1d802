//! Keychain 마스터키 관리
//!
//! - vault 파일을 암호화하는 마스터키 1개만 OS 키체인/키링에 저장 (`otp-vault:master_key_v1`)
//! - 없으면 CSPRNG으로 생성하여 저장

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use keyring::Entry;
use rand::Rng;
use zeroize::Zeroize;

/// 마스터키 길이 (256-bit)
pub const MASTER_KEY_LEN: usize = 32;

/// 마스터키 Keychain 키
const MASTER_KEY_KEYCHAIN_KEY: &str = "otp-vault:master_key_v1";

/// Keychain 오류
#[derive(Debug, thiserror::Error)]
pub enum KeychainError {
    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Keychain entry not found")]
    NoEntry,

    #[error("Invalid master key format")]
    InvalidMasterKey,
}

/// Zeroize가 적용된 마스터키 래퍼
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; MASTER_KEY_LEN],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; MASTER_KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// 마스터키 생성 (CSPRNG)
    pub fn generate() -> Self {
        let mut bytes = [0u8; MASTER_KEY_LEN];
        rand::thread_rng().fill(&mut bytes);
        Self { bytes }
    }

    pub(crate) fn bytes(&self) -> &[u8; MASTER_KEY_LEN] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Keychain에서 마스터키 로드, 없으면 생성하고 저장
pub fn load_or_create_master_key(keychain_service: &str) -> Result<MasterKey, KeychainError> {
    match load_master_key(keychain_service) {
        Ok(key) => {
            tracing::debug!(keychain_service, "master key loaded from keychain");
            Ok(key)
        }
        Err(KeychainError::NoEntry) => {
            tracing::info!(keychain_service, "no master key found, generating new one");
            let key = MasterKey::generate();
            save_master_key(keychain_service, &key)?;
            Ok(key)
        }
        Err(e) => Err(e),
    }
}

/// Keychain에서 마스터키 로드
pub fn load_master_key(keychain_service: &str) -> Result<MasterKey, KeychainError> {
    let entry = Entry::new(keychain_service, MASTER_KEY_KEYCHAIN_KEY)
        .map_err(|e| KeychainError::Keychain(e.to_string()))?;

    let mut password = match entry.get_password() {
        Ok(password) => password,
        Err(keyring::Error::NoEntry) => return Err(KeychainError::NoEntry),
        Err(e) => return Err(KeychainError::Keychain(e.to_string())),
    };

    let decoded = decode_master_key(&password);
    password.zeroize();
    decoded
}

/// Keychain에 마스터키 저장
pub fn save_master_key(keychain_service: &str, key: &MasterKey) -> Result<(), KeychainError> {
    let entry = Entry::new(keychain_service, MASTER_KEY_KEYCHAIN_KEY)
        .map_err(|e| KeychainError::Keychain(e.to_string()))?;

    let mut encoded = encode_master_key(key);
    let result = entry
        .set_password(&encoded)
        .map_err(|e| KeychainError::Keychain(e.to_string()));
    encoded.zeroize();
    result
}

fn encode_master_key(key: &MasterKey) -> String {
    BASE64.encode(&key.bytes)
}

/// Base64 디코딩 + 길이 검증
fn decode_master_key(encoded: &str) -> Result<MasterKey, KeychainError> {
    let mut bytes = BASE64
        .decode(encoded)
        .map_err(|_| KeychainError::InvalidMasterKey)?;

    if bytes.len() != MASTER_KEY_LEN {
        bytes.zeroize();
        return Err(KeychainError::InvalidMasterKey);
    }

    let mut key = [0u8; MASTER_KEY_LEN];
    key.copy_from_slice(&bytes);
    bytes.zeroize();

    Ok(MasterKey { bytes: key })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_key_encoding_roundtrip() {
        let key = MasterKey::generate();
        let encoded = encode_master_key(&key);
        let decoded = decode_master_key(&encoded).unwrap();
        assert_eq!(decoded.bytes(), key.bytes());
    }

    #[test]
    fn test_invalid_master_key_rejected() {
        assert!(matches!(
            decode_master_key("not base64!"),
            Err(KeychainError::InvalidMasterKey)
        ));
        // 길이가 맞지 않는 키
        let short = BASE64.encode([7u8; 16]);
        assert!(matches!(
            decode_master_key(&short),
            Err(KeychainError::InvalidMasterKey)
        ));
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(MasterKey::generate().bytes(), MasterKey::generate().bytes());
    }
}
