//! Vault 파일 I/O 및 암호화/복호화
//!
//! 파일 포맷 (v1):
//! - magic: `OTPVLT01` (8 bytes)
//! - nonce: 24 bytes (XChaCha20-Poly1305)
//! - ciphertext: AEAD 결과 (= 암호문 + 태그)
//!
//! AAD: magic를 AAD로 사용 (포맷 바인딩)
//!
//! 하나의 vault 파일에 여러 scope의 레코드가 함께 저장되며, 각 레코드는 자신의 scope를 가집니다.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroize;

use super::keychain::{load_or_create_master_key, KeychainError, MasterKey, MASTER_KEY_LEN};
use super::{RawRecord, Storable, StoreError};
use crate::config::VaultConfig;
use crate::models::PersistentRef;

/// 파일 매직 (8 bytes)
pub const VAULT_MAGIC: &[u8; 8] = b"OTPVLT01";

/// Nonce 길이 (XChaCha20-Poly1305용 24 bytes)
pub const NONCE_LEN: usize = 24;

/// 현재 페이로드 버전
const PAYLOAD_VERSION: u32 = 1;

/// Vault 오류
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid vault magic")]
    InvalidMagic,

    #[error("Invalid vault format: {0}")]
    InvalidFormat(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<VaultError> for StoreError {
    fn from(err: VaultError) -> Self {
        StoreError::Generic(err.to_string())
    }
}

/// Vault에 저장되는 레코드 1건
///
/// metadata/secret은 codec이 만든 blob을 base64로 보관합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultRecord {
    pub scope: String,
    pub identity: Uuid,
    pub reference: Uuid,
    pub metadata: String,
    pub secret: String,
}

/// Vault 파일 전체 페이로드
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VaultPayload {
    pub records: Vec<VaultRecord>,
    /// 페이로드 버전 (향후 마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    PAYLOAD_VERSION
}

/// 마스터키를 사용해 페이로드를 암호화하고 vault 파일에 저장
pub fn encrypt_and_write(
    path: &Path,
    master_key: &[u8; MASTER_KEY_LEN],
    payload: &VaultPayload,
) -> Result<(), VaultError> {
    let mut plaintext = serde_json::to_vec(payload)?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill(&mut nonce);

    let cipher = XChaCha20Poly1305::new(master_key.into());
    let encrypted = cipher.encrypt(
        XNonce::from_slice(&nonce),
        Payload {
            msg: plaintext.as_ref(),
            aad: VAULT_MAGIC,
        },
    );
    plaintext.zeroize();
    let ciphertext = encrypted.map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    // Atomic write: 임시 파일에 쓰고 rename
    let tmp_path = path.with_extension("vault.tmp");

    let written = write_vault_file(&tmp_path, &nonce, &ciphertext)
        .and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        // 실패 시 임시 파일 정리 (best-effort)
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(())
}

fn write_vault_file(tmp_path: &Path, nonce: &[u8], ciphertext: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp_path)?;
    file.write_all(VAULT_MAGIC)?;
    file.write_all(nonce)?;
    file.write_all(ciphertext)?;
    file.sync_all()
}

/// Vault 파일을 읽고 마스터키로 복호화
pub fn read_and_decrypt(
    path: &Path,
    master_key: &[u8; MASTER_KEY_LEN],
) -> Result<VaultPayload, VaultError> {
    let mut file = fs::File::open(path)?;

    let mut magic = [0u8; 8];
    file.read_exact(&mut magic)?;
    if &magic != VAULT_MAGIC {
        return Err(VaultError::InvalidMagic);
    }

    let mut nonce = [0u8; NONCE_LEN];
    file.read_exact(&mut nonce)
        .map_err(|_| VaultError::InvalidFormat("truncated nonce".to_string()))?;

    let mut ciphertext = Vec::new();
    file.read_to_end(&mut ciphertext)?;

    let cipher = XChaCha20Poly1305::new(master_key.into());
    let mut plaintext = cipher
        .decrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: ciphertext.as_ref(),
                aad: VAULT_MAGIC,
            },
        )
        .map_err(|e| VaultError::DecryptionFailed(e.to_string()))?;

    let payload = serde_json::from_slice::<VaultPayload>(&plaintext);

    // 평문 메모리 지우기
    plaintext.zeroize();

    Ok(payload?)
}

/// 암호화 vault 파일 기반 `Storable` 구현
///
/// 각 호출은 내부 mutex 안에서 read-modify-write를 수행하므로 프로세스 내에서 원자적입니다.
pub struct VaultStore {
    scope: String,
    path: PathBuf,
    master_key: MasterKey,
    io_lock: Mutex<()>,
}

impl VaultStore {
    /// 설정을 기반으로 열기 (Keychain에서 마스터키 로드, 없으면 생성)
    pub fn open(config: &VaultConfig) -> Result<Self, KeychainError> {
        let master_key = load_or_create_master_key(&config.keychain_service)?;
        Ok(Self::with_master_key(
            config.service.clone(),
            config.vault_path.clone(),
            master_key,
        ))
    }

    /// 마스터키를 직접 지정하여 열기
    pub fn with_master_key(
        scope: impl Into<String>,
        path: impl Into<PathBuf>,
        master_key: MasterKey,
    ) -> Self {
        Self {
            scope: scope.into(),
            path: path.into(),
            master_key,
            io_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.io_lock
            .lock()
            .map_err(|_| StoreError::Generic("vault lock poisoned".to_string()))
    }

    /// vault 파일 로드 (파일이 없으면 빈 페이로드)
    fn load(&self) -> Result<VaultPayload, VaultError> {
        if !self.path.exists() {
            return Ok(VaultPayload::default());
        }
        read_and_decrypt(&self.path, self.master_key.bytes())
    }

    fn persist(&self, payload: &VaultPayload) -> Result<(), VaultError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        encrypt_and_write(&self.path, self.master_key.bytes(), payload)
    }

    fn in_scope<'a>(&'a self, payload: &'a VaultPayload) -> impl Iterator<Item = &'a VaultRecord> {
        payload.records.iter().filter(move |r| r.scope == self.scope)
    }
}

/// PersistentRef → vault 레코드 참조 (이 vault가 발급한 형태가 아니면 None)
fn reference_id(persistent_ref: &PersistentRef) -> Option<Uuid> {
    Uuid::from_slice(persistent_ref.as_bytes()).ok()
}

fn issue_reference(reference: Uuid) -> Result<PersistentRef, StoreError> {
    PersistentRef::from_bytes(reference.as_bytes().to_vec())
        .ok_or_else(|| StoreError::Generic("failed to issue reference".to_string()))
}

/// 목록 조회 시 파일이 읽히지 않는 경우는 NoData로 취급
fn list_error(err: VaultError) -> StoreError {
    match err {
        VaultError::Io(e) => StoreError::Generic(e.to_string()),
        VaultError::InvalidMagic
        | VaultError::InvalidFormat(_)
        | VaultError::DecryptionFailed(_)
        | VaultError::Serialization(_) => {
            tracing::warn!(error = %err, "vault payload unreadable");
            StoreError::NoData
        }
        VaultError::EncryptionFailed(msg) => StoreError::Generic(msg),
    }
}

fn decode_record(record: &VaultRecord) -> Result<RawRecord, StoreError> {
    let metadata = BASE64.decode(&record.metadata).map_err(|_| StoreError::NoData)?;
    let secret = BASE64.decode(&record.secret).map_err(|_| StoreError::NoData)?;
    Ok(RawRecord {
        metadata,
        secret,
        persistent_ref: issue_reference(record.reference)?,
    })
}

impl Storable for VaultStore {
    fn scope(&self) -> &str {
        &self.scope
    }

    fn save(
        &self,
        metadata: &[u8],
        identity: Uuid,
        secret: &[u8],
    ) -> Result<PersistentRef, StoreError> {
        let _guard = self.guard()?;
        let mut payload = self.load()?;

        if self.in_scope(&payload).any(|r| r.identity == identity) {
            return Err(StoreError::Generic(format!(
                "duplicate identity in scope {}: {}",
                self.scope, identity
            )));
        }

        let reference = Uuid::new_v4();
        payload.records.push(VaultRecord {
            scope: self.scope.clone(),
            identity,
            reference,
            metadata: BASE64.encode(metadata),
            secret: BASE64.encode(secret),
        });
        payload.version = PAYLOAD_VERSION;

        self.persist(&payload)?;
        tracing::debug!(scope = %self.scope, %identity, "vault record saved");

        issue_reference(reference)
    }

    fn list_raw(&self) -> Result<Vec<RawRecord>, StoreError> {
        let _guard = self.guard()?;
        let payload = self.load().map_err(list_error)?;

        let records = self
            .in_scope(&payload)
            .map(decode_record)
            .collect::<Result<Vec<_>, _>>()?;

        if records.is_empty() {
            return Err(StoreError::NotFound(self.scope.clone()));
        }
        Ok(records)
    }

    fn fetch_secret(&self, persistent_ref: &PersistentRef) -> Result<Vec<u8>, StoreError> {
        let id = reference_id(persistent_ref).ok_or(StoreError::NoData)?;

        let _guard = self.guard()?;
        let payload = self.load()?;

        let record = self
            .in_scope(&payload)
            .find(|r| r.reference == id)
            .ok_or(StoreError::NoData)?;

        BASE64.decode(&record.secret).map_err(|_| StoreError::NoData)
    }

    fn remove(&self, persistent_ref: &PersistentRef) -> Result<(), StoreError> {
        // 이 vault가 발급하지 않은 참조는 존재하지 않는 것과 같음
        let Some(id) = reference_id(persistent_ref) else {
            return Ok(());
        };

        let _guard = self.guard()?;
        let mut payload = self.load()?;

        let before = payload.records.len();
        payload
            .records
            .retain(|r| !(r.scope == self.scope && r.reference == id));

        if payload.records.len() == before {
            return Ok(());
        }

        self.persist(&payload)?;
        tracing::debug!(scope = %self.scope, "vault record removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_store(dir: &Path, scope: &str, key: &MasterKey) -> VaultStore {
        VaultStore::with_master_key(scope, dir.join("otp.vault"), key.clone())
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("test.vault");
        let key = MasterKey::generate();

        let mut payload = VaultPayload::default();
        payload.records.push(VaultRecord {
            scope: "otp".to_string(),
            identity: Uuid::new_v4(),
            reference: Uuid::new_v4(),
            metadata: BASE64.encode(b"meta"),
            secret: BASE64.encode(b"secret"),
        });

        encrypt_and_write(&vault_path, key.bytes(), &payload).unwrap();
        assert!(vault_path.exists());

        let decrypted = read_and_decrypt(&vault_path, key.bytes()).unwrap();
        assert_eq!(decrypted.records.len(), 1);
        assert_eq!(decrypted.records[0].secret, payload.records[0].secret);
    }

    #[test]
    fn test_failed_rename_cleans_tmp_file() {
        let dir = tempdir().unwrap();
        // 대상 경로가 비어 있지 않은 디렉토리면 rename이 실패
        let vault_path = dir.path().join("blocked.vault");
        fs::create_dir(&vault_path).unwrap();
        fs::write(vault_path.join("occupied"), b"x").unwrap();
        let key = MasterKey::generate();

        let result = encrypt_and_write(&vault_path, key.bytes(), &VaultPayload::default());
        assert!(matches!(result, Err(VaultError::Io(_))));
        assert!(!vault_path.with_extension("vault.tmp").exists());
    }

    #[test]
    fn test_wrong_key_fails() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("test.vault");

        let key1 = MasterKey::generate();
        let key2 = MasterKey::generate();

        encrypt_and_write(&vault_path, key1.bytes(), &VaultPayload::default()).unwrap();

        assert!(matches!(
            read_and_decrypt(&vault_path, key2.bytes()),
            Err(VaultError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("test.vault");
        fs::write(&vault_path, b"NOTAVAULT_________________________________").unwrap();

        let key = MasterKey::generate();
        assert!(matches!(
            read_and_decrypt(&vault_path, key.bytes()),
            Err(VaultError::InvalidMagic)
        ));
    }

    #[test]
    fn test_missing_file_lists_not_found() {
        let dir = tempdir().unwrap();
        let key = MasterKey::generate();
        let store = test_store(dir.path(), "otp", &key);

        assert_eq!(
            store.list_raw().unwrap_err(),
            StoreError::NotFound("otp".to_string())
        );
    }

    #[test]
    fn test_save_list_fetch_remove() {
        let dir = tempdir().unwrap();
        let key = MasterKey::generate();
        let store = test_store(dir.path(), "otp", &key);

        let reference = store.save(b"meta", Uuid::new_v4(), b"secret").unwrap();

        let records = store.list_raw().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata, b"meta");
        assert_eq!(records[0].persistent_ref, reference);
        assert_eq!(store.fetch_secret(&reference).unwrap(), b"secret");

        store.remove(&reference).unwrap();
        store.remove(&reference).unwrap();
        assert_eq!(store.fetch_secret(&reference).unwrap_err(), StoreError::NoData);
        assert_eq!(
            store.list_raw().unwrap_err(),
            StoreError::NotFound("otp".to_string())
        );
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();
        let key = MasterKey::generate();

        let reference = test_store(dir.path(), "otp", &key)
            .save(b"meta", Uuid::new_v4(), b"secret")
            .unwrap();

        let reopened = test_store(dir.path(), "otp", &key);
        assert_eq!(reopened.fetch_secret(&reference).unwrap(), b"secret");
    }

    #[test]
    fn test_scopes_are_isolated() {
        let dir = tempdir().unwrap();
        let key = MasterKey::generate();
        let work = test_store(dir.path(), "work", &key);
        let home = test_store(dir.path(), "home", &key);

        let reference = work.save(b"meta", Uuid::new_v4(), b"secret").unwrap();

        assert_eq!(work.list_raw().unwrap().len(), 1);
        assert_eq!(
            home.list_raw().unwrap_err(),
            StoreError::NotFound("home".to_string())
        );
        assert_eq!(home.fetch_secret(&reference).unwrap_err(), StoreError::NoData);

        // 다른 scope에서의 삭제는 no-op
        home.remove(&reference).unwrap();
        assert_eq!(work.list_raw().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let dir = tempdir().unwrap();
        let key = MasterKey::generate();
        let store = test_store(dir.path(), "otp", &key);
        let identity = Uuid::new_v4();

        store.save(b"a", identity, b"a").unwrap();
        assert!(matches!(
            store.save(b"b", identity, b"b"),
            Err(StoreError::Generic(_))
        ));
        assert_eq!(store.list_raw().unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_vault_lists_no_data() {
        let dir = tempdir().unwrap();
        let key = MasterKey::generate();
        let store = test_store(dir.path(), "otp", &key);
        store.save(b"meta", Uuid::new_v4(), b"secret").unwrap();

        let other = VaultStore::with_master_key("otp", store.path(), MasterKey::generate());
        assert_eq!(other.list_raw().unwrap_err(), StoreError::NoData);
    }

    #[test]
    fn test_foreign_reference() {
        let dir = tempdir().unwrap();
        let key = MasterKey::generate();
        let store = test_store(dir.path(), "otp", &key);

        let foreign = PersistentRef::from_bytes(vec![1u8, 2, 3]).unwrap();
        assert_eq!(store.fetch_secret(&foreign).unwrap_err(), StoreError::NoData);
        store.remove(&foreign).unwrap();
    }
}
