//! Supply tasks derived from filed defects.
//!
//! Task generation is best effort. Jobs go through a channel to a background
//! worker, which calls the supply API and only logs failures; nothing here can
//! fail a submission that has already been accepted.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::model::{DefectStatus, ReportedDefect};
use crate::store::StoreError;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    Medium,
}

/// A follow-up replenishment or repair task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyTask {
    pub apparatus: String,
    pub compartment: String,
    pub item: String,
    pub quantity: u32,
    pub priority: TaskPriority,
    pub description: String,
}

/// Everything one accepted submission asks the supply API to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyJob {
    pub submission_id: String,
    pub apparatus: String,
    pub tasks: Vec<SupplyTask>,
}

/// One task per defect, in report order. Missing items are high priority.
#[must_use]
pub fn derive_supply_tasks(apparatus: &str, defects: &[ReportedDefect]) -> Vec<SupplyTask> {
    defects
        .iter()
        .map(|d| {
            let (priority, verb) = match d.status {
                DefectStatus::Missing => (TaskPriority::High, "Replace missing"),
                DefectStatus::Damaged => (TaskPriority::Medium, "Repair or replace damaged"),
            };
            SupplyTask {
                apparatus: apparatus.to_string(),
                compartment: d.compartment.clone(),
                item: d.item.clone(),
                quantity: 1,
                priority,
                description: format!("{verb} {} ({}) on {apparatus}", d.item, d.compartment),
            }
        })
        .collect()
}

/// Supply task API.
pub trait SupplyTaskApi: Send + Sync {
    /// Create the job's tasks; returns how many were created.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the API rejects or never receives the request.
    fn create_tasks(&self, job: &SupplyJob) -> Result<usize, StoreError>;
}

/// `POST {base}/tasks` with the job as JSON; expects `{"created": n}`.
pub struct HttpSupplyApi {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpSupplyApi {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_secs(10))
                .build(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize)]
struct CreatedTasks {
    created: usize,
}

impl SupplyTaskApi for HttpSupplyApi {
    fn create_tasks(&self, job: &SupplyJob) -> Result<usize, StoreError> {
        let created: CreatedTasks = self
            .agent
            .post(&format!("{}/tasks", self.base_url))
            .send_json(job)?
            .into_json()?;
        Ok(created.created)
    }
}

/// Records jobs instead of sending them.
#[derive(Default)]
pub struct MemorySupplyApi {
    jobs: Mutex<Vec<SupplyJob>>,
    fail: Mutex<bool>,
}

impl MemorySupplyApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_requests(&self, fail: bool) {
        if let Ok(mut flag) = self.fail.lock() {
            *flag = fail;
        }
    }

    #[must_use]
    pub fn jobs(&self) -> Vec<SupplyJob> {
        self.jobs.lock().map(|j| j.clone()).unwrap_or_default()
    }
}

impl SupplyTaskApi for MemorySupplyApi {
    fn create_tasks(&self, job: &SupplyJob) -> Result<usize, StoreError> {
        if self.fail.lock().map(|f| *f).unwrap_or(false) {
            return Err(StoreError::Injected("supply create_tasks".to_string()));
        }
        self.jobs
            .lock()
            .map_err(|e| StoreError::Transport(format!("supply api lock poisoned: {e}")))?
            .push(job.clone());
        Ok(job.tasks.len())
    }
}

/// Sending half of the supply queue. Cheap to clone.
#[derive(Clone)]
pub struct SupplyQueue {
    sender: Sender<SupplyJob>,
}

impl SupplyQueue {
    /// Start a worker thread draining the queue into `api`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` if the worker thread cannot be spawned.
    pub fn start(api: Arc<dyn SupplyTaskApi>) -> Result<(Self, SupplyWorker), StoreError> {
        let (sender, receiver) = unbounded();
        let handle = std::thread::Builder::new()
            .name("firecheck-supply".to_string())
            .spawn(move || run_worker_loop(&receiver, api.as_ref()))
            .map_err(|e| StoreError::Transport(format!("failed to spawn supply worker: {e}")))?;
        Ok((Self { sender }, SupplyWorker { handle }))
    }

    /// Hand a job to the worker without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` when the worker has stopped.
    pub fn enqueue(&self, job: SupplyJob) -> Result<(), StoreError> {
        self.sender
            .send(job)
            .map_err(|_| StoreError::Transport("supply worker is not running".to_string()))
    }
}

/// Totals reported by the worker when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupplyStats {
    pub jobs: usize,
    pub tasks_created: usize,
    pub failures: usize,
}

/// Handle to the background worker.
pub struct SupplyWorker {
    handle: JoinHandle<SupplyStats>,
}

impl SupplyWorker {
    /// Wait for the worker to drain the queue. Returns once every
    /// [`SupplyQueue`] clone has been dropped.
    #[must_use]
    pub fn join(self) -> SupplyStats {
        self.handle.join().unwrap_or_else(|_| {
            log::error!("supply worker panicked");
            SupplyStats::default()
        })
    }
}

/// The worker thread entrypoint.
fn run_worker_loop(rx: &Receiver<SupplyJob>, api: &dyn SupplyTaskApi) -> SupplyStats {
    let mut stats = SupplyStats::default();
    while let Ok(job) = rx.recv() {
        stats.jobs += 1;
        match api.create_tasks(&job) {
            Ok(created) => {
                stats.tasks_created += created;
                log::info!(
                    "created {created} supply task(s) for {} (submission {})",
                    job.apparatus,
                    job.submission_id
                );
            }
            Err(e) => {
                stats.failures += 1;
                #[cfg(feature = "metrics")]
                METRICS.record_soft_failure("supply_tasks");
                log::warn!(
                    "supply task generation for {} (submission {}) failed: {e}",
                    job.apparatus,
                    job.submission_id
                );
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defect(item: &str, status: DefectStatus) -> ReportedDefect {
        ReportedDefect {
            compartment: "Cab".to_string(),
            item: item.to_string(),
            status,
            notes: None,
            photo_url: None,
        }
    }

    #[test]
    fn test_derive_tasks_in_report_order() {
        let tasks = derive_supply_tasks(
            "Rescue 1",
            &[defect("Flashlight", DefectStatus::Missing), defect("Radio", DefectStatus::Damaged)],
        );
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].priority, TaskPriority::High);
        assert_eq!(tasks[0].description, "Replace missing Flashlight (Cab) on Rescue 1");
        assert_eq!(tasks[1].priority, TaskPriority::Medium);
    }

    #[test]
    fn test_worker_drains_queue_and_counts_failures() {
        let api = Arc::new(MemorySupplyApi::new());
        let (queue, worker) = SupplyQueue::start(api.clone()).unwrap();
        let job = SupplyJob {
            submission_id: "s1".to_string(),
            apparatus: "Rescue 1".to_string(),
            tasks: derive_supply_tasks("Rescue 1", &[defect("Flashlight", DefectStatus::Missing)]),
        };
        queue.enqueue(job.clone()).unwrap();
        drop(queue);
        let stats = worker.join();
        assert_eq!(stats, SupplyStats { jobs: 1, tasks_created: 1, failures: 0 });
        assert_eq!(api.jobs(), vec![job]);
    }

    #[test]
    fn test_worker_swallows_api_errors() {
        let api = Arc::new(MemorySupplyApi::new());
        api.fail_requests(true);
        let (queue, worker) = SupplyQueue::start(api.clone()).unwrap();
        queue
            .enqueue(SupplyJob {
                submission_id: "s2".to_string(),
                apparatus: "Engine 2".to_string(),
                tasks: vec![],
            })
            .unwrap();
        drop(queue);
        assert_eq!(worker.join().failures, 1);
        assert!(api.jobs().is_empty());
    }
}
