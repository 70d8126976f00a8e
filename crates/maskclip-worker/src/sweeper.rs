//! Background expiry of jobs left waiting for a volume choice.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::session::SessionManager;

/// Shortest accepted sweep period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Run [`SessionManager::expire_stale`] every `sweep_interval` until `shutdown` flips to true
/// or its sender is dropped.
pub fn spawn_expiry_sweeper(
    manager: Arc<SessionManager>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = manager.config().sweep_interval.max(MIN_SWEEP_INTERVAL);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_ms = period.as_millis() as u64, "Expiry sweeper started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let expired = manager.expire_stale().await;
                    if expired.is_empty() {
                        debug!("No stale jobs");
                    } else {
                        info!(count = expired.len(), "Expired pending jobs");
                    }
                }
            }
        }

        info!("Expiry sweeper stopped");
    })
}
