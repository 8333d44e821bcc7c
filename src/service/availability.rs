// service/availability.rs
//
// Per-location availability summary for the scarcity banner. Issues one
// lookup per service against the scheduling API concurrently and tolerates
// individual failures (settle-all), so one slow or broken service never
// empties the whole summary. Results are cached in-process for a short TTL.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::service::scheduling_api::{SchedulingApi, ServiceAvailability};

const CACHE_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySummary {
    pub location_key: String,
    pub services: Vec<ServiceAvailability>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AvailabilityService {
    scheduling: Arc<dyn SchedulingApi>,
    service_ids: Vec<String>,
    cache: Arc<RwLock<HashMap<String, (Instant, AvailabilitySummary)>>>,
}

impl AvailabilityService {
    pub fn new(scheduling: Arc<dyn SchedulingApi>, service_ids: Vec<String>) -> Self {
        Self {
            scheduling,
            service_ids,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn summary(&self, location_key: &str) -> AvailabilitySummary {
        {
            let cache = self.cache.read().await;
            if let Some((cached_at, summary)) = cache.get(location_key) {
                if cached_at.elapsed() < CACHE_TTL {
                    return summary.clone();
                }
            }
        }

        let lookups = self.service_ids.iter().map(|service_id| {
            let scheduling = self.scheduling.clone();
            let location_key = location_key.to_string();
            let service_id = service_id.clone();
            async move { scheduling.next_availability(&location_key, &service_id).await }
        });

        let mut services = Vec::new();
        for result in join_all(lookups).await {
            match result {
                Ok(availability) => services.push(availability),
                Err(err) => {
                    tracing::warn!("availability lookup failed: {}", err);
                }
            }
        }

        let summary = AvailabilitySummary {
            location_key: location_key.to_string(),
            services,
            generated_at: Utc::now(),
        };

        let mut cache = self.cache.write().await;
        cache.insert(
            location_key.to_string(),
            (Instant::now(), summary.clone()),
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::service::{error::ServiceError, scheduling_api::CreditAdjustment};

    struct FlakyScheduling {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SchedulingApi for FlakyScheduling {
        async fn adjust_credit(&self, _adjustment: CreditAdjustment) -> Result<(), ServiceError> {
            unreachable!("availability tests never adjust credit")
        }

        async fn next_availability(
            &self,
            location_key: &str,
            service_id: &str,
        ) -> Result<ServiceAvailability, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if service_id == "hydrafacial" {
                return Err(ServiceError::SchedulingApi("timeout".to_string()));
            }
            Ok(ServiceAvailability {
                service_id: service_id.to_string(),
                location_key: location_key.to_string(),
                next_opening: Some("2026-09-01T10:00:00Z".to_string()),
                openings_this_week: 3,
            })
        }
    }

    fn service(scheduling: Arc<FlakyScheduling>) -> AvailabilityService {
        AvailabilityService::new(
            scheduling,
            vec![
                "tox".to_string(),
                "hydrafacial".to_string(),
                "filler".to_string(),
            ],
        )
    }

    #[tokio::test]
    async fn test_individual_failures_tolerated() {
        let scheduling = Arc::new(FlakyScheduling {
            calls: AtomicUsize::new(0),
        });
        let availability = service(scheduling.clone());

        let summary = availability.summary("carmel").await;
        let ids: Vec<&str> = summary.services.iter().map(|s| s.service_id.as_str()).collect();
        assert_eq!(ids, vec!["tox", "filler"]);
    }

    #[tokio::test]
    async fn test_summary_cached_within_ttl() {
        let scheduling = Arc::new(FlakyScheduling {
            calls: AtomicUsize::new(0),
        });
        let availability = service(scheduling.clone());

        availability.summary("fishers").await;
        let after_first = scheduling.calls.load(Ordering::SeqCst);
        availability.summary("fishers").await;
        assert_eq!(scheduling.calls.load(Ordering::SeqCst), after_first);
    }
}
