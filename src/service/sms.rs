// service/sms.rs
//
// Fire-and-forget SMS delivery for referral invitations. A failed send is
// never fatal; the invite flow degrades to handing back a shareable link.
use async_trait::async_trait;

use crate::{config::Config, service::error::ServiceError};

#[async_trait]
pub trait SmsApi: Send + Sync {
    /// Returns true when the provider accepted the message.
    async fn send_sms(&self, phone: &str, body: &str) -> Result<bool, ServiceError>;
}

pub struct HttpSmsClient {
    base_url: String,
    api_key: String,
    from_number: String,
    client: reqwest::Client,
}

impl HttpSmsClient {
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.sms_api_base_url.clone(),
            api_key: config.sms_api_key.clone(),
            from_number: config.sms_from_number.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SmsApi for HttpSmsClient {
    async fn send_sms(&self, phone: &str, body: &str) -> Result<bool, ServiceError> {
        let payload = serde_json::json!({
            "to": phone,
            "from": self.from_number,
            "body": body,
        });

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::Sms(e.to_string()))?;

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Sms(e.to_string()))?;

        Ok(response_body["ok"].as_bool().unwrap_or(false))
    }
}
