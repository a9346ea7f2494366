//! In-memory job table
//!
//! One mutex guards every job record. Nothing awaits while holding it, and
//! readers get clones.

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;
use uuid::Uuid;

use super::job::{AnalysisJob, JobParams, JobStatus};

const JOB_ID_LEN: usize = 8;

/// Finished jobs kept for status lookups before the oldest are dropped
pub const DEFAULT_RETAINED_JOBS: usize = 1000;

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, AnalysisJob>,
    /// Insertion order, oldest first
    order: Vec<String>,
    /// Terminal job ids in the order they finished
    finished: VecDeque<String>,
}

pub struct JobTable {
    inner: Mutex<Inner>,
    retained_jobs: usize,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_JOBS)
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retained_jobs` finished jobs. Queued and processing jobs are never dropped.
    pub fn with_retention(retained_jobs: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            retained_jobs: retained_jobs.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a queued job under a fresh 8-character id
    pub fn insert_new(&self, token_address: &str, params: JobParams) -> AnalysisJob {
        let mut inner = self.lock();
        let job_id = loop {
            let candidate: String = Uuid::new_v4().to_string().chars().take(JOB_ID_LEN).collect();
            if !inner.jobs.contains_key(&candidate) {
                break candidate;
            }
        };

        let job = AnalysisJob::new(job_id.clone(), token_address.to_string(), params);
        inner.jobs.insert(job_id.clone(), job.clone());
        inner.order.push(job_id);
        job
    }

    pub fn get(&self, job_id: &str) -> Option<AnalysisJob> {
        self.lock().jobs.get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queued and processing jobs, newest first
    pub fn in_flight(&self) -> Vec<AnalysisJob> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.jobs.get(id))
            .filter(|job| !job.status.is_terminal())
            .cloned()
            .collect()
    }

    /// Apply `update` if `job_id` may move to `next`. Invalid transitions are logged and ignored.
    fn transition(&self, job_id: &str, next: JobStatus, update: impl FnOnce(&mut AnalysisJob)) -> bool {
        let mut inner = self.lock();
        let Some(job) = inner.jobs.get_mut(job_id) else {
            warn!("⚠️  Transition to {} for unknown job {}", next, job_id);
            return false;
        };

        if !job.status.can_transition_to(next) {
            warn!("⚠️  Cannot transition job {} from {} to {}", job_id, job.status, next);
            return false;
        }

        job.status = next;
        update(job);

        if next.is_terminal() {
            inner.finished.push_back(job_id.to_string());
            while inner.finished.len() > self.retained_jobs {
                let Some(evicted) = inner.finished.pop_front() else {
                    break;
                };
                inner.jobs.remove(&evicted);
                inner.order.retain(|id| *id != evicted);
            }
        }
        true
    }

    pub fn mark_processing(&self, job_id: &str) -> bool {
        self.transition(job_id, JobStatus::Processing, |job| {
            job.started_at = Some(Utc::now());
        })
    }

    pub fn mark_completed(&self, job_id: &str, update: impl FnOnce(&mut AnalysisJob)) -> bool {
        self.transition(job_id, JobStatus::Completed, |job| {
            job.completed_at = Some(Utc::now());
            update(job);
        })
    }

    pub fn mark_failed(&self, job_id: &str, error: String) -> bool {
        self.transition(job_id, JobStatus::Failed, |job| {
            job.completed_at = Some(Utc::now());
            job.error = Some(error);
        })
    }
}
