//! OTP Vault - OTP 계정 보안 저장소 코디네이터
//!
//! 계정 메타데이터와 시크릿을 분리된 blob으로 보안 백엔드에 저장하고,
//! 백엔드가 발급한 불투명 참조로 다시 조회/삭제합니다.
//!
//! - `models`: 도메인 모델 (계정, 메타데이터, 시크릿, 참조)
//! - `codec`: 레코드 ↔ 바이트 blob 변환
//! - `secrets`: `Storable` 능력 집합과 백엔드 구현 (vault 파일, 메모리)
//! - `caretaker`: 계정 단위 API 및 에러 정규화
//! - `otp`: 외부 OTP 코드 provider 인터페이스

pub mod caretaker;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod otp;
pub mod secrets;

pub use caretaker::{AccountCaretaker, ListPolicy};
pub use codec::{CodecError, CodecErrorKind};
pub use config::{ConfigError, VaultConfig};
pub use error::{CaretakerError, CaretakerResult, ErrorPayload};
pub use models::{
    Account, AccountMetadata, HashAlgorithm, MovingFactor, PersistentRef, SecretMaterial,
};
pub use otp::OtpProvider;
pub use secrets::{MemoryStore, RawRecord, Storable, StoreError, VaultStore};
