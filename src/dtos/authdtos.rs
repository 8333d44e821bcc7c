use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RequestOtpDto {
    #[validate(length(min = 10, max = 20, message = "Phone number must be between 10-20 characters"))]
    pub phone: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct VerifyOtpDto {
    #[validate(length(min = 10, max = 20, message = "Phone number must be between 10-20 characters"))]
    pub phone: String,

    #[validate(length(equal = 6, message = "Verification code must be 6 digits"))]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OtpRequestResponseDto {
    pub status: String,

    #[serde(rename = "smsSent")]
    pub sms_sent: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponseDto {
    pub status: String,
    pub token: String,
}
