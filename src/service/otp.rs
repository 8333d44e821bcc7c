// service/otp.rs
//
// In-memory one-time codes for phone sign-in. Codes are single-use and
// expire after OTP_TTL_SECONDS; reissuing replaces any outstanding code
// for the same phone.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

const OTP_TTL_SECONDS: u64 = 600;

#[derive(Default)]
pub struct OtpStore {
    codes: RwLock<HashMap<String, (String, Instant)>>,
}

impl OtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh 6-digit code for the phone, replacing any outstanding one.
    pub async fn issue(&self, phone_last10: &str) -> String {
        let code = {
            let mut rng = rand::rng();
            format!("{:06}", rng.random_range(100000..999999))
        };

        let mut codes = self.codes.write().await;
        codes.insert(phone_last10.to_string(), (code.clone(), Instant::now()));
        code
    }

    /// Consume the outstanding code for the phone. Succeeds at most once per
    /// issued code; expired and mismatched codes are rejected.
    pub async fn verify(&self, phone_last10: &str, submitted: &str) -> bool {
        let mut codes = self.codes.write().await;

        let Some((code, issued_at)) = codes.get(phone_last10) else {
            return false;
        };

        if issued_at.elapsed() > Duration::from_secs(OTP_TTL_SECONDS) {
            codes.remove(phone_last10);
            return false;
        }

        if code.as_bytes().ct_eq(submitted.as_bytes()).unwrap_u8() != 1 {
            return false;
        }

        codes.remove(phone_last10);
        true
    }
}
