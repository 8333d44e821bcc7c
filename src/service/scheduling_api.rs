// service/scheduling_api.rs
//
// Admin API of the external scheduling/booking provider. Only the two
// operations the referral and availability pipelines consume are modeled:
// account-credit adjustment and next-availability lookup. The API is treated
// as capable of transient failure and never assumed exactly-once.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{config::Config, service::error::ServiceError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAdjustment {
    pub external_client_id: String,
    pub delta_cents: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAvailability {
    pub service_id: String,
    pub location_key: String,
    pub next_opening: Option<String>,
    pub openings_this_week: i32,
}

#[async_trait]
pub trait SchedulingApi: Send + Sync {
    /// Adjust the client's account credit balance by a delta, with a reason
    /// string that shows up on their statement.
    async fn adjust_credit(&self, adjustment: CreditAdjustment) -> Result<(), ServiceError>;

    async fn next_availability(
        &self,
        location_key: &str,
        service_id: &str,
    ) -> Result<ServiceAvailability, ServiceError>;
}

pub struct HttpSchedulingClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpSchedulingClient {
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.scheduling_api_base_url.clone(),
            api_key: config.scheduling_api_key.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SchedulingApi for HttpSchedulingClient {
    async fn adjust_credit(&self, adjustment: CreditAdjustment) -> Result<(), ServiceError> {
        let payload = serde_json::json!({
            "clientId": adjustment.external_client_id,
            "amountCents": adjustment.delta_cents,
            "reason": adjustment.reason,
        });

        let response = self
            .client
            .post(format!("{}/admin/clients/credit", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::SchedulingApi(e.to_string()))?;

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::SchedulingApi(e.to_string()))?;

        if response_body["status"].as_str().unwrap_or("") == "ok" {
            Ok(())
        } else {
            Err(ServiceError::SchedulingApi(
                response_body["message"]
                    .as_str()
                    .unwrap_or("Credit adjustment failed")
                    .to_string(),
            ))
        }
    }

    async fn next_availability(
        &self,
        location_key: &str,
        service_id: &str,
    ) -> Result<ServiceAvailability, ServiceError> {
        let response = self
            .client
            .get(format!(
                "{}/admin/locations/{}/availability/{}",
                self.base_url, location_key, service_id
            ))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ServiceError::SchedulingApi(e.to_string()))?;

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::SchedulingApi(e.to_string()))?;

        Ok(ServiceAvailability {
            service_id: service_id.to_string(),
            location_key: location_key.to_string(),
            next_opening: response_body["nextOpening"].as_str().map(|s| s.to_string()),
            openings_this_week: response_body["openingsThisWeek"].as_i64().unwrap_or(0) as i32,
        })
    }
}
