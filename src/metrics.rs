//! 📊 Service metrics
//!
//! Job lifecycle timings plus websocket and HTTP counters, exposed in the
//! Prometheus text format on `/metrics` and summarised on `/metrics/health`.

use prometheus::core::Collector;
use prometheus::{Gauge, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::jobs::JobStatus;

/// Finished jobs kept for averages and per-job lookups
pub const DEFAULT_RETAINED_JOBS: usize = 1000;

/// Job lifecycle hooks called by the orchestrator
pub trait MetricsSink: Send + Sync {
    fn job_queued(&self, job_id: &str);
    fn job_started(&self, job_id: &str);
    fn job_completed(&self, job_id: &str, wallets_found: usize, credits_used: u32);
    fn job_failed(&self, job_id: &str, error: &str);
}

#[derive(Debug, Clone)]
struct JobTiming {
    status: JobStatus,
    queued_at: Instant,
    started_at: Option<Instant>,
    completed_at: Option<Instant>,
    wallets_found: Option<usize>,
    credits_used: Option<u32>,
    error: Option<String>,
}

impl JobTiming {
    fn queued(now: Instant) -> Self {
        Self {
            status: JobStatus::Queued,
            queued_at: now,
            started_at: None,
            completed_at: None,
            wallets_found: None,
            credits_used: None,
            error: None,
        }
    }

    fn queue_seconds(&self) -> Option<f64> {
        self.started_at
            .map(|started| started.duration_since(self.queued_at).as_secs_f64())
    }

    fn processing_seconds(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(done)) => Some(done.duration_since(started).as_secs_f64()),
            _ => None,
        }
    }
}

/// Per-job snapshot served by [`ServiceMetrics::job_metrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobMetrics {
    pub job_id: String,
    pub status: JobStatus,
    pub queue_seconds: Option<f64>,
    pub processing_seconds: Option<f64>,
    pub wallets_found: Option<usize>,
    pub credits_used: Option<u32>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EndpointStats {
    pub requests: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WebsocketStats {
    pub active_connections: i64,
    pub messages_sent: u64,
    pub messages_received: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub queue: BTreeMap<String, usize>,
    pub success_rate: f64,
    pub websocket: WebsocketStats,
    pub http: BTreeMap<String, EndpointStats>,
}

#[derive(Default)]
struct JobLedger {
    timings: HashMap<String, JobTiming>,
    /// Terminal job ids, oldest first
    finished: VecDeque<String>,
}

pub struct ServiceMetrics {
    registry: Registry,
    started: Instant,
    jobs: Mutex<JobLedger>,
    retained_jobs: usize,

    uptime_seconds: Gauge,
    queue_depth: IntGaugeVec,
    processing_seconds_avg: Gauge,
    queue_seconds_avg: Gauge,
    success_rate: Gauge,

    websocket_connections: IntGauge,
    websocket_messages: IntCounterVec,

    http_requests: IntCounterVec,
    http_errors: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_retention(DEFAULT_RETAINED_JOBS)
    }

    /// Keep at most `retained_jobs` finished jobs; in-flight jobs are never dropped
    pub fn with_retention(retained_jobs: usize) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "app_uptime_seconds",
            "Application uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let queue_depth = IntGaugeVec::new(
            Opts::new("job_queue_depth", "Number of jobs by status"),
            &["status"],
        )?;
        registry.register(Box::new(queue_depth.clone()))?;

        let processing_seconds_avg = Gauge::with_opts(Opts::new(
            "job_processing_seconds_avg",
            "Average job processing time",
        ))?;
        registry.register(Box::new(processing_seconds_avg.clone()))?;

        let queue_seconds_avg = Gauge::with_opts(Opts::new(
            "job_queue_seconds_avg",
            "Average job queue time",
        ))?;
        registry.register(Box::new(queue_seconds_avg.clone()))?;

        let success_rate = Gauge::with_opts(Opts::new(
            "job_success_rate",
            "Job success rate (0.0 to 1.0)",
        ))?;
        registry.register(Box::new(success_rate.clone()))?;

        let websocket_connections = IntGauge::with_opts(Opts::new(
            "websocket_active_connections",
            "Current active WebSocket connections",
        ))?;
        registry.register(Box::new(websocket_connections.clone()))?;

        let websocket_messages = IntCounterVec::new(
            Opts::new("websocket_messages_total", "Total WebSocket messages"),
            &["direction"],
        )?;
        registry.register(Box::new(websocket_messages.clone()))?;

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests by endpoint"),
            &["endpoint"],
        )?;
        registry.register(Box::new(http_requests.clone()))?;

        let http_errors = IntCounterVec::new(
            Opts::new("http_errors_total", "Total HTTP errors by endpoint"),
            &["endpoint"],
        )?;
        registry.register(Box::new(http_errors.clone()))?;

        Ok(Self {
            registry,
            started: Instant::now(),
            jobs: Mutex::new(JobLedger::default()),
            retained_jobs: retained_jobs.max(1),
            uptime_seconds,
            queue_depth,
            processing_seconds_avg,
            queue_seconds_avg,
            success_rate,
            websocket_connections,
            websocket_messages,
            http_requests,
            http_errors,
        })
    }

    fn jobs(&self) -> MutexGuard<'_, JobLedger> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_job(&self, job_id: &str, status: JobStatus, apply: impl FnOnce(&mut JobTiming)) {
        let now = Instant::now();
        let mut jobs = self.jobs();
        let Some(job) = jobs.timings.get_mut(job_id) else {
            return;
        };
        job.status = status;
        match status {
            JobStatus::Processing => job.started_at = Some(now),
            JobStatus::Completed | JobStatus::Failed => job.completed_at = Some(now),
            JobStatus::Queued => {}
        }
        apply(job);

        if status.is_terminal() {
            jobs.finished.push_back(job_id.to_string());
            while jobs.finished.len() > self.retained_jobs {
                if let Some(evicted) = jobs.finished.pop_front() {
                    jobs.timings.remove(&evicted);
                }
            }
        }
    }

    pub fn job_metrics(&self, job_id: &str) -> Option<JobMetrics> {
        self.jobs().timings.get(job_id).map(|job| JobMetrics {
            job_id: job_id.to_string(),
            status: job.status,
            queue_seconds: job.queue_seconds(),
            processing_seconds: job.processing_seconds(),
            wallets_found: job.wallets_found,
            credits_used: job.credits_used,
            error: job.error.clone(),
        })
    }

    /// Jobs currently tracked, finished ones included up to the retention cap
    pub fn tracked_jobs(&self) -> usize {
        self.jobs().timings.len()
    }

    /// Job count per status; every status is present, zero or not
    pub fn queue_depth(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = JobStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for job in self.jobs().timings.values() {
            *counts.entry(job.status.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn average_processing_seconds(&self) -> f64 {
        let jobs = self.jobs();
        average(
            jobs.timings
                .values()
                .filter(|j| j.status == JobStatus::Completed)
                .filter_map(JobTiming::processing_seconds),
        )
    }

    pub fn average_queue_seconds(&self) -> f64 {
        let jobs = self.jobs();
        average(jobs.timings.values().filter_map(JobTiming::queue_seconds))
    }

    /// Completed / (completed + failed), 0.0 before anything finished
    pub fn success_rate(&self) -> f64 {
        let jobs = self.jobs();
        let finished = jobs.timings.values().filter(|j| j.status.is_terminal()).count();
        if finished == 0 {
            return 0.0;
        }
        let completed = jobs
            .timings
            .values()
            .filter(|j| j.status == JobStatus::Completed)
            .count();
        completed as f64 / finished as f64
    }

    pub fn websocket_connected(&self) {
        self.websocket_connections.inc();
    }

    pub fn websocket_disconnected(&self) {
        if self.websocket_connections.get() > 0 {
            self.websocket_connections.dec();
        }
    }

    pub fn websocket_message_sent(&self) {
        self.websocket_messages.with_label_values(&["sent"]).inc();
    }

    pub fn websocket_message_received(&self) {
        self.websocket_messages.with_label_values(&["received"]).inc();
    }

    pub fn websocket_stats(&self) -> WebsocketStats {
        WebsocketStats {
            active_connections: self.websocket_connections.get(),
            messages_sent: self.websocket_messages.with_label_values(&["sent"]).get(),
            messages_received: self.websocket_messages.with_label_values(&["received"]).get(),
        }
    }

    pub fn http_request(&self, endpoint: &str) {
        self.http_requests.with_label_values(&[endpoint]).inc();
    }

    pub fn http_error(&self, endpoint: &str) {
        self.http_errors.with_label_values(&[endpoint]).inc();
    }

    /// Request and error counts per matched route
    pub fn http_stats(&self) -> BTreeMap<String, EndpointStats> {
        let mut stats: BTreeMap<String, EndpointStats> = BTreeMap::new();
        for (requests, vec) in [(true, &self.http_requests), (false, &self.http_errors)] {
            for family in vec.collect() {
                for metric in family.get_metric() {
                    let Some(endpoint) = metric.get_label().first() else {
                        continue;
                    };
                    let count = metric.get_counter().get_value() as u64;
                    let entry = stats.entry(endpoint.get_value().to_string()).or_default();
                    if requests {
                        entry.requests = count;
                    } else {
                        entry.errors = count;
                    }
                }
            }
        }
        stats
    }

    /// Refresh derived gauges and encode the registry
    pub fn render(&self) -> Result<String, prometheus::Error> {
        self.uptime_seconds.set(self.started.elapsed().as_secs_f64());
        for (status, count) in self.queue_depth() {
            self.queue_depth.with_label_values(&[status.as_str()]).set(count as i64);
        }
        self.processing_seconds_avg.set(self.average_processing_seconds());
        self.queue_seconds_avg.set(self.average_queue_seconds());
        self.success_rate.set(self.success_rate());

        TextEncoder::new().encode_to_string(&self.registry.gather())
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            queue: self.queue_depth(),
            success_rate: self.success_rate(),
            websocket: self.websocket_stats(),
            http: self.http_stats(),
        }
    }
}

impl MetricsSink for ServiceMetrics {
    fn job_queued(&self, job_id: &str) {
        self.jobs()
            .timings
            .insert(job_id.to_string(), JobTiming::queued(Instant::now()));
    }

    fn job_started(&self, job_id: &str) {
        self.update_job(job_id, JobStatus::Processing, |_| {});
    }

    fn job_completed(&self, job_id: &str, wallets_found: usize, credits_used: u32) {
        self.update_job(job_id, JobStatus::Completed, |job| {
            job.wallets_found = Some(wallets_found);
            job.credits_used = Some(credits_used);
        });
    }

    fn job_failed(&self, job_id: &str, error: &str) {
        self.update_job(job_id, JobStatus::Failed, |job| {
            job.error = Some(error.to_string());
        });
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
