//! Account Caretaker
//!
//! 논리적 계정과 백엔드 레코드 사이를 변환합니다.
//!
//! - 저장: encode → `Storable::save`
//! - 조회: `Storable::list_raw` → decode → 계정 결합
//! - 백엔드 에러는 이 모듈에서만 `CaretakerError`로 변환
//! - 계정 목록을 메모리에 캐시하지 않음 (매 조회마다 백엔드에서 다시 구성)

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::codec::{self, CodecError};
use crate::error::{CaretakerError, CaretakerResult};
use crate::models::{Account, AccountMetadata, SecretMaterial};
use crate::otp::OtpProvider;
use crate::secrets::{RawRecord, Storable, StoreError};

/// 읽을 수 없는 레코드를 만났을 때의 목록 조회 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListPolicy {
    /// 레코드 하나라도 읽지 못하면 전체 목록 실패 (`ReadFailed`)
    #[default]
    FailWhole,
    /// 읽지 못한 레코드는 로그를 남기고 건너뜀
    SkipUnreadable,
}

/// 계정 관리자
///
/// 모든 공개 연산은 백엔드 호출 1회 + 순수 encode/decode로 구성됩니다.
/// 여러 스레드가 공유할 때 백엔드가 스레드 안전하지 않다면 외부에서 동기화해야 합니다.
pub struct AccountCaretaker<S: Storable> {
    store: S,
    list_policy: ListPolicy,
}

impl<S: Storable> AccountCaretaker<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            list_policy: ListPolicy::default(),
        }
    }

    pub fn with_list_policy(mut self, list_policy: ListPolicy) -> Self {
        self.list_policy = list_policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 전체 계정 조회
    ///
    /// scope에 레코드가 없으면 빈 목록을 반환합니다 (최초 실행과 계정 0개는 동일).
    pub fn list_accounts(&self) -> CaretakerResult<Vec<Account>> {
        let records = normalize_list(self.store.scope(), self.store.list_raw())?;

        let mut accounts = Vec::with_capacity(records.len());
        for record in records {
            match join_record(record) {
                Ok(account) => accounts.push(account),
                Err(e) => match self.list_policy {
                    ListPolicy::FailWhole => return Err(read_error(e)),
                    ListPolicy::SkipUnreadable => {
                        tracing::warn!(error = %e, "skipping unreadable account record");
                    }
                },
            }
        }

        tracing::debug!(scope = self.store.scope(), count = accounts.len(), "accounts listed");
        Ok(accounts)
    }

    /// identity로 계정 찾기 (새로 조회한 목록 기준)
    pub fn find_account(&self, identity: Uuid) -> CaretakerResult<Option<Account>> {
        Ok(self
            .list_accounts()?
            .into_iter()
            .find(|account| account.identity() == identity))
    }

    /// 계정 추가
    ///
    /// encode가 하나라도 실패하면 백엔드를 호출하지 않습니다.
    /// 발급된 참조가 필요하면 호출자가 다시 조회해야 합니다.
    pub fn add_account(
        &self,
        metadata: AccountMetadata,
        secret: SecretMaterial,
    ) -> CaretakerResult<()> {
        let metadata_bytes = codec::encode_metadata(&metadata).map_err(create_error)?;
        let secret_bytes = codec::encode_secret(&secret).map_err(create_error)?;

        self.store
            .save(&metadata_bytes, metadata.identity, &secret_bytes)
            .map_err(create_error)?;

        tracing::debug!(
            scope = self.store.scope(),
            identity = %metadata.identity,
            "account added"
        );
        Ok(())
    }

    /// 계정 삭제 (이미 삭제된 계정도 성공)
    pub fn remove_account(&self, account: &Account) -> CaretakerResult<()> {
        normalize_remove(self.store.remove(account.persistent_ref()))?;

        tracing::debug!(
            scope = self.store.scope(),
            identity = %account.identity(),
            "account removed"
        );
        Ok(())
    }

    /// 계정의 시크릿을 백엔드에서 다시 읽기
    pub fn fetch_secret(&self, account: &Account) -> CaretakerResult<SecretMaterial> {
        let bytes = self
            .store
            .fetch_secret(account.persistent_ref())
            .map_err(fetch_error)?;
        codec::decode_secret(&bytes).map_err(read_error)
    }

    /// 지정 시각의 OTP 코드 계산 (시크릿은 백엔드에서 새로 읽음)
    pub fn current_code<P: OtpProvider>(
        &self,
        account: &Account,
        provider: &P,
        at: DateTime<Utc>,
    ) -> CaretakerResult<String> {
        let secret = self.fetch_secret(account)?;
        Ok(provider.code_at(&secret, at))
    }
}

/// 메타데이터와 시크릿을 각각 decode 한 뒤 결합
fn join_record(record: RawRecord) -> Result<Account, CodecError> {
    let metadata = codec::decode_metadata(&record.metadata)?;
    let secret = codec::decode_secret(&record.secret)?;
    Ok(Account::from_parts(metadata, secret, record.persistent_ref))
}

/// list_raw 결과 정규화: scope 비어 있음 → 빈 목록
fn normalize_list(
    scope: &str,
    result: Result<Vec<RawRecord>, StoreError>,
) -> CaretakerResult<Vec<RawRecord>> {
    match result {
        Ok(records) => Ok(records),
        Err(StoreError::NotFound(name)) => {
            tracing::debug!(scope, not_found = %name, "no records in scope");
            Ok(Vec::new())
        }
        Err(e @ (StoreError::NoData | StoreError::Generic(_))) => {
            tracing::error!(scope, error = %e, "account listing failed");
            Err(CaretakerError::RetrievalFailed)
        }
    }
}

fn read_error(e: CodecError) -> CaretakerError {
    tracing::error!(error = %e, "stored account record unreadable");
    CaretakerError::ReadFailed
}

fn create_error<E: std::fmt::Display>(e: E) -> CaretakerError {
    tracing::error!(error = %e, "account creation failed");
    CaretakerError::CreateFailed
}

/// remove 결과 정규화: 백엔드의 not found는 이미 삭제된 것으로 보고 성공 처리
fn normalize_remove(result: Result<(), StoreError>) -> CaretakerResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(StoreError::NotFound(name)) => {
            tracing::debug!(not_found = %name, "account already absent");
            Ok(())
        }
        Err(e @ (StoreError::NoData | StoreError::Generic(_))) => {
            tracing::error!(error = %e, "account removal failed");
            Err(CaretakerError::RemoveFailed)
        }
    }
}

fn fetch_error(e: StoreError) -> CaretakerError {
    tracing::error!(error = %e, "secret retrieval failed");
    CaretakerError::RetrievalFailed
}
