//! OTP Vault Data Models
//!
//! 계정 메타데이터 / 시크릿 / 백엔드 참조를 표현하는 도메인 모델

use std::fmt;
use std::num::{NonZeroU32, NonZeroU64};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroize;

/// 기본 OTP 자릿수
pub const DEFAULT_DIGITS: NonZeroU32 = match NonZeroU32::new(6) {
    Some(v) => v,
    None => unreachable!(),
};

/// 기본 TOTP 주기 (초)
pub const DEFAULT_PERIOD_SECS: NonZeroU64 = match NonZeroU64::new(30) {
    Some(v) => v,
    None => unreachable!(),
};

/// 사용자에게 보이는 계정 정보
///
/// `identity`는 계정의 수명 동안 바뀌지 않는 키이며, issuer/label은 표시용입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountMetadata {
    pub issuer: String,
    pub label: String,
    pub identity: Uuid,
}

impl AccountMetadata {
    /// 새 identity를 발급하여 메타데이터 생성
    pub fn new(issuer: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_identity(issuer, label, Uuid::new_v4())
    }

    pub fn with_identity(
        issuer: impl Into<String>,
        label: impl Into<String>,
        identity: Uuid,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            label: label.into(),
            identity,
        }
    }
}

/// OTP 알고리즘의 moving factor
///
/// 직렬화 시 태그가 명시적으로 붙습니다 (`{"timer": {...}}`).
/// 카운터 기반 factor는 `counter` 태그로 예약되어 있으며 아직 지원하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovingFactor {
    /// 시간 기반 (period: 초 단위)
    Timer { period: NonZeroU64 },
}

impl MovingFactor {
    pub fn timer(period: NonZeroU64) -> Self {
        MovingFactor::Timer { period }
    }

    /// 직렬화에 쓰이는 태그 이름
    pub fn tag(&self) -> &'static str {
        match self {
            MovingFactor::Timer { .. } => "timer",
        }
    }
}

impl Default for MovingFactor {
    fn default() -> Self {
        MovingFactor::timer(DEFAULT_PERIOD_SECS)
    }
}

/// HMAC 해시 알고리즘
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

/// 민감한 시크릿 정보
///
/// `material_id`는 생성 시마다 새로 발급되며 `AccountMetadata::identity`와 별개입니다.
/// `shared_secret`은 drop 시 zeroize 됩니다.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMaterial {
    pub shared_secret: String,
    pub digit_count: NonZeroU32,
    pub moving_factor: MovingFactor,
    pub hash_algorithm: HashAlgorithm,
    pub material_id: Uuid,
}

impl SecretMaterial {
    /// 기본값(6자리, 30초 타이머, SHA1)으로 생성
    pub fn new(shared_secret: impl Into<String>) -> Self {
        Self {
            shared_secret: shared_secret.into(),
            digit_count: DEFAULT_DIGITS,
            moving_factor: MovingFactor::default(),
            hash_algorithm: HashAlgorithm::default(),
            material_id: Uuid::new_v4(),
        }
    }

    pub fn with_digits(mut self, digit_count: NonZeroU32) -> Self {
        self.digit_count = digit_count;
        self
    }

    pub fn with_moving_factor(mut self, moving_factor: MovingFactor) -> Self {
        self.moving_factor = moving_factor;
        self
    }

    pub fn with_hash_algorithm(mut self, hash_algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = hash_algorithm;
        self
    }
}

impl fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretMaterial")
            .field("shared_secret", &"<redacted>")
            .field("digit_count", &self.digit_count)
            .field("moving_factor", &self.moving_factor)
            .field("hash_algorithm", &self.hash_algorithm)
            .field("material_id", &self.material_id)
            .finish()
    }
}

impl Drop for SecretMaterial {
    fn drop(&mut self) {
        self.shared_secret.zeroize();
    }
}

/// 백엔드가 저장 시 발급하는 불투명 참조
///
/// 호출자가 해석할 수 있는 구조가 없으며, 발급한 백엔드 밖에서는 의미가 없습니다.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PersistentRef(Vec<u8>);

impl PersistentRef {
    /// 백엔드 어댑터용 생성자 (빈 바이트는 거부)
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Option<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            None
        } else {
            Some(Self(bytes))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PersistentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PersistentRef({})", BASE64.encode(&self.0))
    }
}

/// 메타데이터 + 시크릿 + 참조의 논리적 결합
///
/// 백엔드 레코드를 디코딩하고 결합하는 경우에만 생성됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    metadata: AccountMetadata,
    secret: SecretMaterial,
    persistent_ref: PersistentRef,
}

impl Account {
    pub(crate) fn from_parts(
        metadata: AccountMetadata,
        secret: SecretMaterial,
        persistent_ref: PersistentRef,
    ) -> Self {
        Self {
            metadata,
            secret,
            persistent_ref,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.metadata.issuer
    }

    pub fn label(&self) -> &str {
        &self.metadata.label
    }

    pub fn identity(&self) -> Uuid {
        self.metadata.identity
    }

    pub fn metadata(&self) -> &AccountMetadata {
        &self.metadata
    }

    pub fn secret(&self) -> &SecretMaterial {
        &self.secret
    }

    pub fn persistent_ref(&self) -> &PersistentRef {
        &self.persistent_ref
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_defaults() {
        let secret = SecretMaterial::new("JBSWY3DPEHPK3PXP");
        assert_eq!(secret.digit_count.get(), 6);
        assert_eq!(secret.moving_factor, MovingFactor::timer(DEFAULT_PERIOD_SECS));
        assert_eq!(secret.hash_algorithm, HashAlgorithm::Sha1);
    }

    #[test]
    fn test_material_id_is_fresh() {
        let a = SecretMaterial::new("JBSWY3DPEHPK3PXP");
        let b = SecretMaterial::new("JBSWY3DPEHPK3PXP");
        assert_ne!(a.material_id, b.material_id);

        let meta = AccountMetadata::new("GitHub", "alice");
        assert_ne!(meta.identity, a.material_id);
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = SecretMaterial::new("JBSWY3DPEHPK3PXP");
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("JBSWY3DPEHPK3PXP"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_persistent_ref_rejects_empty() {
        assert!(PersistentRef::from_bytes(Vec::new()).is_none());
        let r = PersistentRef::from_bytes(vec![1u8, 2, 3]).unwrap();
        assert_eq!(r.as_bytes(), &[1, 2, 3]);
    }
}
