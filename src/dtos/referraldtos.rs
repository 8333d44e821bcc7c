use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::referralmodel::{FraudFlag, ReferralStatus, ReferralTier};

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ClickReferralDto {
    #[validate(length(min = 1, message = "Referral code is required"))]
    pub code: String,

    #[validate(length(min = 1, message = "Device id is required"))]
    #[serde(rename = "deviceId")]
    pub device_id: String,

    pub channel: Option<String>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ClaimReferralDto {
    #[validate(length(min = 1, message = "Referral code is required"))]
    pub code: String,

    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct AttributeReferralDto {
    #[validate(length(min = 1, message = "Referral code is required"))]
    pub code: String,

    pub phone: Option<String>,
    pub email: Option<String>,

    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,

    #[serde(rename = "appointmentId")]
    pub appointment_id: Option<String>,

    #[serde(rename = "clientId")]
    pub client_id: Option<String>,

    #[serde(rename = "locationKey")]
    pub location_key: Option<String>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct InviteReferralDto {
    #[validate(length(min = 1, max = 60, message = "First name is required"))]
    #[serde(rename = "firstName")]
    pub first_name: String,

    #[validate(length(min = 10, max = 20, message = "Phone number must be between 10-20 characters"))]
    pub phone: String,

    #[serde(rename = "sendSms", default)]
    pub send_sms: bool,
}

impl InviteReferralDto {
    pub fn validate_phone_number(&self) -> Result<(), ValidationError> {
        let phone_regex =
            regex::Regex::new(r"^(\+?[0-9]{1,3}[- ]?)?\(?[0-9]{3}\)?[- ]?[0-9]{3}[- ]?[0-9]{4}$")
                .map_err(|_| ValidationError::new("invalid_phone_regex"))?;

        if !phone_regex.is_match(self.phone.trim()) {
            let mut error = ValidationError::new("invalid_phone");
            error.message = Some(Cow::from(
                "Phone number must be in a valid format (e.g., +1234567890 or 123-456-7890)",
            ));
            return Err(error);
        }
        Ok(())
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct AddCustomCodeDto {
    #[validate(length(min = 1, max = 40, message = "Requested code is required"))]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferralCodeData {
    pub id: Uuid,
    pub code: String,
    pub custom_code: Option<String>,
    pub tier: ReferralTier,
    pub is_primary: bool,
    pub share_link: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferralCodeResponseDto {
    pub status: String,
    pub codes: Vec<ReferralCodeData>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimResponseDto {
    pub status: String,
    #[serde(rename = "referralId")]
    pub referral_id: Uuid,
    #[serde(rename = "referralStatus")]
    pub referral_status: ReferralStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttributionResponseDto {
    pub status: String,
    #[serde(rename = "referralId")]
    pub referral_id: Uuid,
    #[serde(rename = "referralStatus")]
    pub referral_status: ReferralStatus,
    #[serde(rename = "matchedBy")]
    pub matched_by: String,
    #[serde(rename = "fraudFlags")]
    pub fraud_flags: Vec<FraudFlag>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteResponseDto {
    pub status: String,
    #[serde(rename = "referralId")]
    pub referral_id: Uuid,
    #[serde(rename = "smsSent")]
    pub sms_sent: bool,
    #[serde(rename = "shareLink")]
    pub share_link: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveCodeResponseDto {
    pub status: String,
    pub code: String,
    pub tier: ReferralTier,
    #[serde(rename = "refereeRewardCents")]
    pub referee_reward_cents: i64,
}
