// loyalty-core/src/tasks/expiry_sweep.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::services::RedemptionService;

/// Max records handled per pass; the next pass picks up the rest.
const SWEEP_BATCH: i64 = 200;

/// Spawns a background task that expires overdue reservations on an interval.
/// Lazy expiry at scan/confirm stays authoritative; this only frees points and
/// stock sooner.
pub fn spawn_expiry_sweep_task(
    service: Arc<RedemptionService>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            match service.expire_due(Utc::now(), SWEEP_BATCH).await {
                Ok(0) => debug!("Expiry sweep: nothing overdue"),
                Ok(_) => {}
                Err(e) => error!("Expiry sweep failed: {:?}", e),
            }
        }
    })
}
