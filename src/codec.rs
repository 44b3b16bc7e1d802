//! Record Codec
//!
//! 계정 메타데이터 / 시크릿을 백엔드에 넘길 바이트 blob으로 변환합니다.
//! 포맷 관련 실패는 모두 `CodecError` 하나로 격리됩니다.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::models::{AccountMetadata, SecretMaterial};

/// `SecretMaterial` 안의 moving factor 필드 이름
const MOVING_FACTOR_FIELD: &str = "moving_factor";

/// 현재 디코딩 가능한 moving factor 태그
const KNOWN_MOVING_FACTOR_TAGS: &[&str] = &["timer"];

/// Codec 오류 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecErrorKind {
    Malformed,
    UnsupportedVariant,
}

/// Codec 오류
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Unsupported moving factor variant: {0}")]
    UnsupportedVariant(String),
}

impl CodecError {
    pub fn kind(&self) -> CodecErrorKind {
        match self {
            CodecError::Malformed(_) => CodecErrorKind::Malformed,
            CodecError::UnsupportedVariant(_) => CodecErrorKind::UnsupportedVariant,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Malformed(err.to_string())
    }
}

pub fn encode_metadata(metadata: &AccountMetadata) -> Result<Vec<u8>, CodecError> {
    encode(metadata)
}

pub fn decode_metadata(bytes: &[u8]) -> Result<AccountMetadata, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_secret(secret: &SecretMaterial) -> Result<Vec<u8>, CodecError> {
    encode(secret)
}

/// 시크릿 디코딩
///
/// 1. JSON 값으로 파싱 (실패 시 Malformed)
/// 2. moving factor 태그 검사 (모르는 태그면 UnsupportedVariant)
/// 3. 타입 디코딩 (실패 시 Malformed)
pub fn decode_secret(bytes: &[u8]) -> Result<SecretMaterial, CodecError> {
    let value: Value = serde_json::from_slice(bytes)?;
    if let Some(factor) = value.get(MOVING_FACTOR_FIELD) {
        check_moving_factor_tag(factor)?;
    }
    decode_value(value)
}

// serde 타입은 실패 없이 직렬화되지만 Result로 감싸 호출부를 단순하게 유지
fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(value)?)
}

fn decode_value<T: DeserializeOwned>(value: Value) -> Result<T, CodecError> {
    Ok(serde_json::from_value(value)?)
}

/// 태그가 하나뿐인 객체만 moving factor로 인정
fn check_moving_factor_tag(factor: &Value) -> Result<(), CodecError> {
    let Some(object) = factor.as_object() else {
        return Err(CodecError::Malformed(
            "moving factor must be a tagged object".to_string(),
        ));
    };

    let mut tags = object.keys();
    match (tags.next(), tags.next()) {
        (Some(tag), None) if KNOWN_MOVING_FACTOR_TAGS.contains(&tag.as_str()) => Ok(()),
        (Some(tag), None) => Err(CodecError::UnsupportedVariant(tag.clone())),
        _ => Err(CodecError::Malformed(format!(
            "moving factor must carry exactly one tag, found {}",
            object.len()
        ))),
    }
}
