//! Vault 설정
//!
//! 환경 변수(`.env` 포함)에서 vault 경로와 scope를 읽습니다.

use std::path::PathBuf;

/// 기본 scope (서비스 이름)
pub const DEFAULT_SERVICE: &str = "otp-vault";
/// 마스터키를 보관하는 Keychain 서비스 이름
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "com.otp-vault.app";

const ENV_SERVICE: &str = "OTP_VAULT_SERVICE";
const ENV_VAULT_PATH: &str = "OTP_VAULT_PATH";
const ENV_KEYCHAIN_SERVICE: &str = "OTP_VAULT_KEYCHAIN_SERVICE";

/// 설정 오류
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// 레코드가 묶이는 scope
    pub service: String,
    pub vault_path: PathBuf,
    pub keychain_service: String,
}

impl VaultConfig {
    pub fn new(service: impl Into<String>, vault_path: impl Into<PathBuf>) -> Self {
        Self {
            service: service.into(),
            vault_path: vault_path.into(),
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
        }
    }

    pub fn with_keychain_service(mut self, keychain_service: impl Into<String>) -> Self {
        self.keychain_service = keychain_service.into();
        self
    }

    /// 환경 변수에서 설정 로드
    ///
    /// `.env` 파일이 있으면 먼저 로드합니다 (없어도 무시).
    /// 이미 설정된 값이 있으면 `.env`가 덮어쓰지 않습니다.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 조회 함수로부터 설정 구성 (빈 값은 미설정으로 취급)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let vault_path = read(ENV_VAULT_PATH).ok_or(ConfigError::MissingVar(ENV_VAULT_PATH))?;
        let service = read(ENV_SERVICE).unwrap_or_else(|| DEFAULT_SERVICE.to_string());
        let keychain_service =
            read(ENV_KEYCHAIN_SERVICE).unwrap_or_else(|| DEFAULT_KEYCHAIN_SERVICE.to_string());

        Ok(Self {
            service,
            vault_path: PathBuf::from(vault_path),
            keychain_service,
        })
    }
}
