//! 🧭 Analysis job orchestrator
//!
//! Accepts submissions without blocking, runs at most `max_concurrent_jobs`
//! pipelines at once, and records every job's terminal state. A job that
//! fails (or panics) never affects other jobs.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn, Instrument};

use super::job::{
    results_url, AnalysisJob, AnalysisJobSummary, JobListing, JobParams, JobStatus, SubmitReceipt,
    SubmitRequest,
};
use super::pipeline::{self, PipelineContext, PipelineError};
use super::table::JobTable;
use crate::analysis::aggregator::NO_TRANSACTIONS_FOUND;
use crate::analysis::{is_transactable, BuyEventExtractor, EarlyBidderAggregator};
use crate::config::{AnalysisConfig, Config};
use crate::export::{render_csv, WalletTrackerEntry};
use crate::ledger::LedgerDataSource;
use crate::logging::sanitize_address;
use crate::metrics::MetricsSink;
use crate::notify::{AnalysisComplete, Notification, NotificationSink};
use crate::store::{StoreError, TokenStore};
use crate::types::AnalysisReport;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid Solana address format: {0}")]
    InvalidAddress(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Analysis not completed or no results: {0}")]
    NotCompleted(String),

    #[error("Wallet tracker export not available: {0}")]
    ExportUnavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Orchestrator tuning, usually taken from [`Config`]
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_concurrent_jobs: usize,
    pub fetch_timeout: Duration,
    pub max_retained_jobs: usize,
    pub defaults: AnalysisConfig,
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrent_jobs: config.jobs.max_concurrent_jobs,
            fetch_timeout: Duration::from_secs(config.jobs.fetch_timeout_secs),
            max_retained_jobs: config.jobs.max_retained_jobs,
            defaults: config.analysis.clone(),
        }
    }
}

/// Rendered CSV download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub body: String,
}

/// Wallet-tracker download, read back from the persisted export file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletTrackerExport {
    pub filename: String,
    pub entries: Vec<WalletTrackerEntry>,
}

struct Inner {
    table: JobTable,
    workers: Arc<Semaphore>,
    pipeline: PipelineContext,
    store: Arc<dyn TokenStore>,
    notifier: Arc<dyn NotificationSink>,
    metrics: Arc<dyn MetricsSink>,
    defaults: AnalysisConfig,
}

#[derive(Clone)]
pub struct AnalysisOrchestrator {
    inner: Arc<Inner>,
}

impl AnalysisOrchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        ledger: Arc<dyn LedgerDataSource>,
        store: Arc<dyn TokenStore>,
        notifier: Arc<dyn NotificationSink>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let extractor = BuyEventExtractor::new(
            settings.defaults.sol_price_usd,
            settings.defaults.dust_floor_lamports,
        );

        info!(
            "🧭 Orchestrator ready: {} workers, {}s fetch timeout, ${}/SOL",
            settings.max_concurrent_jobs,
            settings.fetch_timeout.as_secs(),
            extractor.sol_price_usd()
        );

        Self {
            inner: Arc::new(Inner {
                table: JobTable::with_retention(settings.max_retained_jobs),
                workers: Arc::new(Semaphore::new(settings.max_concurrent_jobs)),
                pipeline: PipelineContext {
                    ledger,
                    aggregator: EarlyBidderAggregator::new(extractor),
                    fetch_timeout: settings.fetch_timeout,
                },
                store,
                notifier,
                metrics,
                defaults: settings.defaults,
            }),
        }
    }

    /// Queue an analysis and return immediately. Must be called inside a Tokio runtime.
    pub fn submit(
        &self,
        token_address: &str,
        request: SubmitRequest,
    ) -> Result<SubmitReceipt, OrchestratorError> {
        let token_address = token_address.trim();
        if !is_transactable(token_address) {
            return Err(OrchestratorError::InvalidAddress(token_address.to_string()));
        }

        let params = request.resolve(&self.inner.defaults);
        let job = self.inner.table.insert_new(token_address, params);
        self.inner.metrics.job_queued(&job.job_id);

        info!(
            "📥 Token analysis queued: {} (job {}, min ${}, {} wallets)",
            sanitize_address(token_address),
            job.job_id,
            params.min_usd,
            params.max_wallets
        );

        let span = info_span!("analysis", job_id = %job.job_id);
        tokio::spawn(
            self.clone()
                .run_job(job.job_id.clone(), job.token_address.clone(), params)
                .instrument(span),
        );

        Ok(SubmitReceipt {
            status: JobStatus::Queued,
            results_url: results_url(&job.job_id),
            job_id: job.job_id,
            token_address: job.token_address,
            api_settings: params,
        })
    }

    pub fn status(&self, job_id: &str) -> Result<AnalysisJob, OrchestratorError> {
        self.inner
            .table
            .get(job_id)
            .ok_or_else(|| OrchestratorError::NotFound(job_id.to_string()))
    }

    /// Persisted analyses, with in-flight jobs first when not searching
    pub async fn list(
        &self,
        search: Option<&str>,
        limit: usize,
    ) -> Result<JobListing, OrchestratorError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        let store = self.inner.store.clone();
        let query = search.clone();

        let tokens = tokio::task::spawn_blocking(move || match query {
            Some(q) => store.search(&q),
            None => store.recent(limit),
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;

        let mut jobs: Vec<AnalysisJobSummary> = Vec::new();
        if search.is_none() {
            jobs.extend(self.inner.table.in_flight().iter().map(AnalysisJobSummary::from));
        }
        jobs.extend(tokens.into_iter().map(AnalysisJobSummary::from));

        Ok(JobListing {
            total: jobs.len(),
            jobs,
        })
    }

    pub fn csv_export(&self, job_id: &str) -> Result<CsvExport, OrchestratorError> {
        let job = self.status(job_id)?;
        let report = match (job.status, job.result) {
            (JobStatus::Completed, Some(report)) => report,
            _ => return Err(OrchestratorError::NotCompleted(job_id.to_string())),
        };

        let body = render_csv(report.early_bidders())
            .map_err(|e| OrchestratorError::ExportUnavailable(e.to_string()))?;
        Ok(CsvExport {
            filename: format!("token_analysis_{}.csv", job_id),
            body,
        })
    }

    pub async fn wallet_tracker_export(
        &self,
        job_id: &str,
    ) -> Result<WalletTrackerExport, OrchestratorError> {
        let job = self.status(job_id)?;
        let path = match (job.status, job.axiom_file) {
            (JobStatus::Completed, Some(path)) => path,
            _ => return Err(OrchestratorError::NotCompleted(job_id.to_string())),
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.json", job_id));
        let store = self.inner.store.clone();
        let read_path = path.clone();
        let entries = tokio::task::spawn_blocking(move || store.read_export(&read_path))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
            .map_err(|e| match e {
                StoreError::NotFound(p) => OrchestratorError::ExportUnavailable(p.display().to_string()),
                other => OrchestratorError::Store(other),
            })?;

        Ok(WalletTrackerExport { filename, entries })
    }

    /// Whole life of one job after submission. No cancellation: once a
    /// permit is held the pipeline runs to a terminal state.
    async fn run_job(self, job_id: String, token_address: String, params: JobParams) {
        // Waiting here is the queue; the permit frees the slot on every exit path
        let _permit = match self.inner.workers.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!("Worker pool closed before job {} could start", job_id);
                return;
            }
        };

        if !self.inner.table.mark_processing(&job_id) {
            return;
        }
        self.inner.metrics.job_started(&job_id);
        info!("🔍 Analysis started for {}", sanitize_address(&token_address));

        // Separate task so a panic surfaces as a JoinError instead of unwinding here
        let run = pipeline::run(self.inner.pipeline.clone(), token_address, params);
        let outcome = match tokio::spawn(run.in_current_span()).await {
            Ok(result) => result,
            Err(join_error) => Err(PipelineError::Panicked(panic_message(join_error))),
        };

        match outcome {
            Ok(report) => self.finish(&job_id, report, params).await,
            Err(e) => self.fail(&job_id, e),
        }
    }

    async fn finish(&self, job_id: &str, report: AnalysisReport, params: JobParams) {
        let credits = report.api_credits_used;

        if pipeline::is_degenerate(&report) {
            let error = report
                .aggregate
                .error
                .clone()
                .unwrap_or_else(|| NO_TRANSACTIONS_FOUND.to_string());
            info!("Analysis found no data - skipping save ({})", error);
            if self.inner.table.mark_completed(job_id, |job| {
                job.result = Some(report);
                job.error = Some(error);
            }) {
                self.inner.metrics.job_completed(job_id, 0, credits);
            }
            return;
        }

        let completed = pipeline::prepare_export(report, params.max_wallets);
        let wallets = completed.report.early_bidders().len();

        let saved = match pipeline::persist(self.inner.store.clone(), completed.clone()).await {
            Ok(saved) => {
                info!("💾 Saved token {} ({})", saved.token_id, completed.acronym);
                Some(saved)
            }
            Err(e) => {
                error!("❌ Failed to persist analysis: {}", e);
                None
            }
        };
        let token_id = saved.as_ref().map(|s| s.token_id);

        let notification = Notification::AnalysisComplete(AnalysisComplete {
            job_id: job_id.to_string(),
            token_name: completed.report.token_name().to_string(),
            token_symbol: completed.report.token_symbol().to_string(),
            acronym: completed.acronym.clone(),
            wallets_found: wallets,
            token_id,
        });

        let report = completed.report;
        let transitioned = self.inner.table.mark_completed(job_id, |job| {
            job.result = Some(report);
            if let Some(saved) = saved {
                job.token_id = Some(saved.token_id);
                job.result_file = saved
                    .result_file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                job.axiom_file = Some(saved.axiom_file);
            }
        });
        if !transitioned {
            return;
        }

        self.inner.metrics.job_completed(job_id, wallets, credits);
        info!("✅ Analysis completed: {} wallets, {} credits", wallets, credits);

        // Fire-and-forget: delivery failures never touch the job
        let notifier = self.inner.notifier.clone();
        tokio::spawn(
            async move {
                match notifier.deliver(notification).await {
                    Ok(()) => info!("📣 Completion notification sent"),
                    Err(e) => warn!("⚠️  Failed to send completion notification: {}", e),
                }
            }
            .in_current_span(),
        );
    }

    fn fail(&self, job_id: &str, err: PipelineError) {
        let message = err.to_string();
        error!("❌ Analysis failed: {}", message);
        if self.inner.table.mark_failed(job_id, message.clone()) {
            self.inner.metrics.job_failed(job_id, &message);
        }
    }
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }
    let payload: Box<dyn Any + Send> = join_error.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
