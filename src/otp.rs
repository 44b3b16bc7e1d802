//! OTP 코드 계산 능력
//!
//! 코드 계산 알고리즘 자체는 외부 provider가 담당합니다.

use chrono::{DateTime, Utc};

use crate::models::SecretMaterial;

/// 시크릿과 시각으로부터 현재 OTP 코드를 계산하는 provider
pub trait OtpProvider {
    fn code_at(&self, secret: &SecretMaterial, at: DateTime<Utc>) -> String;

    fn current_code(&self, secret: &SecretMaterial) -> String {
        self.code_at(secret, Utc::now())
    }
}

impl<P: OtpProvider + ?Sized> OtpProvider for &P {
    fn code_at(&self, secret: &SecretMaterial, at: DateTime<Utc>) -> String {
        (**self).code_at(secret, at)
    }
}
