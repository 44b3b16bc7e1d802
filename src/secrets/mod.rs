//! Secure Backend 모듈
//!
//! 보안 백엔드가 만족해야 하는 `Storable` 능력 집합과 구현체를 제공합니다.
//!
//! - `vault`: Keychain 마스터키 + AEAD 암호화 vault 파일 (프로덕션)
//! - `memory`: 메모리 백엔드 (테스트/헤드리스 용도)
//! - 백엔드 레코드는 타입이 고정된 `RawRecord`로만 반환되며, 비정형 데이터는 어댑터 밖으로 나가지 않음

pub mod keychain;
pub mod memory;
pub mod vault;

use uuid::Uuid;

use crate::models::PersistentRef;

pub use keychain::{KeychainError, MasterKey};
pub use memory::MemoryStore;
pub use vault::{VaultError, VaultStore};

/// 백엔드 오류
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// scope 전체에 레코드가 없음
    #[error("No records found for scope: {0}")]
    NotFound(String),

    #[error("Backend returned no data")]
    NoData,

    #[error("Backend error: {0}")]
    Generic(String),
}

/// 백엔드가 반환하는 레코드 1건
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub metadata: Vec<u8>,
    pub secret: Vec<u8>,
    pub persistent_ref: PersistentRef,
}

/// 보안 백엔드 능력 집합
///
/// 각 호출은 단독으로 원자적이어야 합니다. 두 호출 사이의 순서는 보장하지 않습니다.
pub trait Storable: Send + Sync {
    /// 레코드들이 묶여 있는 namespace (예: 서비스 이름)
    fn scope(&self) -> &str;

    /// 레코드 저장 후 참조 반환 (전부 기록되거나 아무것도 기록되지 않음)
    fn save(
        &self,
        metadata: &[u8],
        identity: Uuid,
        secret: &[u8],
    ) -> Result<PersistentRef, StoreError>;

    /// scope의 모든 레코드 (순서 보장 없음)
    fn list_raw(&self) -> Result<Vec<RawRecord>, StoreError>;

    /// 참조로 시크릿 bytes만 조회
    fn fetch_secret(&self, persistent_ref: &PersistentRef) -> Result<Vec<u8>, StoreError>;

    /// 참조로 삭제 (이미 없으면 성공)
    fn remove(&self, persistent_ref: &PersistentRef) -> Result<(), StoreError>;
}

impl<S: Storable + ?Sized> Storable for std::sync::Arc<S> {
    fn scope(&self) -> &str {
        (**self).scope()
    }

    fn save(
        &self,
        metadata: &[u8],
        identity: Uuid,
        secret: &[u8],
    ) -> Result<PersistentRef, StoreError> {
        (**self).save(metadata, identity, secret)
    }

    fn list_raw(&self) -> Result<Vec<RawRecord>, StoreError> {
        (**self).list_raw()
    }

    fn fetch_secret(&self, persistent_ref: &PersistentRef) -> Result<Vec<u8>, StoreError> {
        (**self).fetch_secret(persistent_ref)
    }

    fn remove(&self, persistent_ref: &PersistentRef) -> Result<(), StoreError> {
        (**self).remove(persistent_ref)
    }
}
