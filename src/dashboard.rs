//! Periodic fleet-status polling on a `may` coroutine.
//!
//! Polls are not coordinated with submissions in flight, so a snapshot may
//! show defects from a submission whose log has not been written yet.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::analytics::{compute_fleet_status, FleetStatus};
use crate::defects::list_open_defects;
use crate::store::{IssueStore, StoreError, MAX_PAGE_SIZE};

const STOP_CHECK: Duration = Duration::from_millis(50);

/// One poll result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetSnapshot {
    pub polled_at: DateTime<Utc>,
    pub status: FleetStatus,
}

/// Read open defects once and count them per apparatus.
///
/// # Errors
///
/// Returns `StoreError` if the listing fails.
pub fn poll_fleet_status(store: &dyn IssueStore, apparatus: &[String]) -> Result<FleetSnapshot, StoreError> {
    let defects = list_open_defects(store, MAX_PAGE_SIZE)?;
    Ok(FleetSnapshot {
        polled_at: Utc::now(),
        status: compute_fleet_status(apparatus, &defects),
    })
}

/// Handle to a running poller.
pub struct FleetPoller {
    stop: Arc<AtomicBool>,
    handle: may::coroutine::JoinHandle<usize>,
}

impl FleetPoller {
    /// Poll immediately, then every `interval`, passing each result to `on_update`.
    pub fn start<F>(store: Arc<dyn IssueStore>, apparatus: Vec<String>, interval: Duration, mut on_update: F) -> Self
    where
        F: FnMut(Result<FleetSnapshot, StoreError>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = may::go!(move || {
            let mut polls = 0usize;
            while !stop_flag.load(Ordering::Relaxed) {
                let result = poll_fleet_status(store.as_ref(), &apparatus);
                if let Err(e) = &result {
                    log::warn!("fleet status poll failed: {e}");
                }
                on_update(result);
                polls += 1;
                sleep_unless_stopped(interval, &stop_flag);
            }
            polls
        });
        Self { stop, handle }
    }

    /// Stop polling and return how many polls ran.
    #[must_use]
    pub fn stop(self) -> usize {
        self.stop.store(true, Ordering::Relaxed);
        self.handle.join().unwrap_or_else(|_| {
            log::error!("fleet poller panicked");
            0
        })
    }
}

fn sleep_unless_stopped(interval: Duration, stop: &AtomicBool) {
    let mut slept = Duration::ZERO;
    while slept < interval && !stop.load(Ordering::Relaxed) {
        let tick = STOP_CHECK.min(interval - slept);
        may::coroutine::sleep(tick);
        slept += tick;
    }
}
