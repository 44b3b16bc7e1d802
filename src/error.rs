//! OTP Vault Error Types
//!
//! 백엔드와 무관하게 고정된 도메인 에러 분류

use serde::Serialize;
use thiserror::Error;

/// Caretaker 에러
///
/// codec/백엔드 에러는 이 네 가지로만 변환되어 호출자에게 전달됩니다.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretakerError {
    /// 목록 조회 자체가 실패 (비어 있는 것과는 다름)
    #[error("Failed to retrieve accounts from secure storage")]
    RetrievalFailed,

    /// 저장된 레코드를 계정으로 읽을 수 없음
    #[error("Failed to read a stored account")]
    ReadFailed,

    #[error("Failed to create account")]
    CreateFailed,

    /// 삭제 거부 (이미 없는 레코드 삭제는 성공)
    #[error("Failed to remove account")]
    RemoveFailed,
}

impl CaretakerError {
    /// 안정적인 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            CaretakerError::RetrievalFailed => "RETRIEVAL_FAILED",
            CaretakerError::ReadFailed => "READ_FAILED",
            CaretakerError::CreateFailed => "CREATE_FAILED",
            CaretakerError::RemoveFailed => "REMOVE_FAILED",
        }
    }
}

/// 상위 앱 응답용 직렬화 가능한 에러
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl From<CaretakerError> for ErrorPayload {
    fn from(error: CaretakerError) -> Self {
        ErrorPayload {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Caretaker 결과 타입
pub type CaretakerResult<T> = Result<T, CaretakerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serialization() {
        let payload = ErrorPayload::from(CaretakerError::ReadFailed);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["code"], "READ_FAILED");
        assert_eq!(json["message"], "Failed to read a stored account");
    }
}
