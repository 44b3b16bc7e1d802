//! 메모리 백엔드
//!
//! 프로세스 메모리에만 레코드를 보관합니다. 영속성이 없으므로 테스트와
//! 헤드리스 환경용입니다. 실패 주입(`fail_next`)으로 오류 경로를 재현할 수 있습니다.

use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::{RawRecord, Storable, StoreError};
use crate::models::PersistentRef;

#[derive(Debug, Clone)]
struct StoredEntry {
    identity: Uuid,
    metadata: Vec<u8>,
    secret: Vec<u8>,
    reference: PersistentRef,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: Vec<StoredEntry>,
    /// 다음 호출 1회에 반환할 오류
    injected: Option<StoreError>,
}

/// 메모리 기반 `Storable` 구현
#[derive(Debug)]
pub struct MemoryStore {
    scope: String,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// 저장된 레코드 수
    pub fn len(&self) -> usize {
        self.state().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 모든 레코드 삭제
    pub fn clear(&self) {
        if let Ok(mut state) = self.state() {
            state.entries.clear();
        }
    }

    /// 다음 백엔드 호출 1회를 지정한 오류로 실패시킴
    pub fn fail_next(&self, error: StoreError) {
        if let Ok(mut state) = self.state() {
            state.injected = Some(error);
        }
    }

    /// 저장된 시크릿 bytes를 그대로 교체 (손상 재현용)
    ///
    /// 참조가 없으면 `false`
    pub fn overwrite_secret(&self, reference: &PersistentRef, secret: Vec<u8>) -> bool {
        let Ok(mut state) = self.state() else {
            return false;
        };
        match state.entries.iter_mut().find(|e| &e.reference == reference) {
            Some(entry) => {
                entry.secret = secret;
                true
            }
            None => false,
        }
    }

    /// 저장된 메타데이터 bytes를 그대로 교체 (손상 재현용)
    ///
    /// 참조가 없으면 `false`
    pub fn overwrite_metadata(&self, reference: &PersistentRef, metadata: Vec<u8>) -> bool {
        let Ok(mut state) = self.state() else {
            return false;
        };
        match state.entries.iter_mut().find(|e| &e.reference == reference) {
            Some(entry) => {
                entry.metadata = metadata;
                true
            }
            None => false,
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Generic("memory store lock poisoned".to_string()))
    }

    /// lock을 잡고 주입된 오류가 있으면 먼저 반환
    fn begin(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        let mut state = self.state()?;
        if let Some(error) = state.injected.take() {
            return Err(error);
        }
        Ok(state)
    }
}

impl Storable for MemoryStore {
    fn scope(&self) -> &str {
        &self.scope
    }

    fn save(
        &self,
        metadata: &[u8],
        identity: Uuid,
        secret: &[u8],
    ) -> Result<PersistentRef, StoreError> {
        let mut state = self.begin()?;

        if state.entries.iter().any(|e| e.identity == identity) {
            return Err(StoreError::Generic(format!(
                "duplicate identity in scope {}: {}",
                self.scope, identity
            )));
        }

        let reference = PersistentRef::from_bytes(Uuid::new_v4().as_bytes().to_vec())
            .ok_or_else(|| StoreError::Generic("failed to issue reference".to_string()))?;

        state.entries.push(StoredEntry {
            identity,
            metadata: metadata.to_vec(),
            secret: secret.to_vec(),
            reference: reference.clone(),
        });

        Ok(reference)
    }

    fn list_raw(&self) -> Result<Vec<RawRecord>, StoreError> {
        let state = self.begin()?;

        if state.entries.is_empty() {
            return Err(StoreError::NotFound(self.scope.clone()));
        }

        Ok(state
            .entries
            .iter()
            .map(|e| RawRecord {
                metadata: e.metadata.clone(),
                secret: e.secret.clone(),
                persistent_ref: e.reference.clone(),
            })
            .collect())
    }

    fn fetch_secret(&self, persistent_ref: &PersistentRef) -> Result<Vec<u8>, StoreError> {
        let state = self.begin()?;
        state
            .entries
            .iter()
            .find(|e| &e.reference == persistent_ref)
            .map(|e| e.secret.clone())
            .ok_or(StoreError::NoData)
    }

    fn remove(&self, persistent_ref: &PersistentRef) -> Result<(), StoreError> {
        let mut state = self.begin()?;
        // 없는 참조 삭제는 no-op 성공
        state.entries.retain(|e| &e.reference != persistent_ref);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_scope_is_not_found() {
        let store = MemoryStore::new("otp-test");
        assert_eq!(
            store.list_raw().unwrap_err(),
            StoreError::NotFound("otp-test".to_string())
        );
    }

    #[test]
    fn test_save_list_fetch_remove() {
        let store = MemoryStore::new("otp-test");
        let reference = store.save(b"meta", Uuid::new_v4(), b"secret").unwrap();

        let records = store.list_raw().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata, b"meta");
        assert_eq!(records[0].secret, b"secret");
        assert_eq!(records[0].persistent_ref, reference);

        assert_eq!(store.fetch_secret(&reference).unwrap(), b"secret");

        store.remove(&reference).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.fetch_secret(&reference).unwrap_err(), StoreError::NoData);
    }

    #[test]
    fn test_remove_absent_is_ok() {
        let store = MemoryStore::new("otp-test");
        let reference = store.save(b"meta", Uuid::new_v4(), b"secret").unwrap();
        store.remove(&reference).unwrap();
        store.remove(&reference).unwrap();
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let store = MemoryStore::new("otp-test");
        let identity = Uuid::new_v4();
        store.save(b"a", identity, b"a").unwrap();
        assert!(matches!(
            store.save(b"b", identity, b"b"),
            Err(StoreError::Generic(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_overwrite_helpers() {
        let store = MemoryStore::new("otp-test");
        let reference = store.save(b"meta", Uuid::new_v4(), b"secret").unwrap();

        assert!(store.overwrite_metadata(&reference, b"m2".to_vec()));
        assert!(store.overwrite_secret(&reference, b"s2".to_vec()));
        let records = store.list_raw().unwrap();
        assert_eq!(records[0].metadata, b"m2");
        assert_eq!(records[0].secret, b"s2");

        let unknown = PersistentRef::from_bytes(vec![9u8]).unwrap();
        assert!(!store.overwrite_metadata(&unknown, Vec::new()));
    }

    #[test]
    fn test_injected_failure_applies_once() {
        let store = MemoryStore::new("otp-test");
        store.fail_next(StoreError::NoData);
        assert_eq!(store.list_raw().unwrap_err(), StoreError::NoData);
        assert_eq!(
            store.list_raw().unwrap_err(),
            StoreError::NotFound("otp-test".to_string())
        );
    }
}
