// service/background_jobs.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::AppState;

/// In-process fallback driver for the reconciliation pass. Deployments with
/// an external scheduler hit POST /api/referral/reconcile instead; both paths
/// run the same best-effort batch.
pub async fn start_reconciliation_job(app_state: Arc<AppState>) {
    let mut interval = interval(Duration::from_secs(900)); // Run every 15 minutes

    loop {
        interval.tick().await;

        tracing::info!("Running referral reconciliation job at {}", Utc::now());

        let summary = app_state.reward_issuer.run().await;
        if summary.errors.is_empty() {
            tracing::info!("Referral reconciliation job completed successfully");
        } else {
            tracing::warn!(
                "Referral reconciliation job completed with {} errors",
                summary.errors.len()
            );
        }
    }
}
