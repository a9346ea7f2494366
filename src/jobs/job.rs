use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::config::AnalysisConfig;
use crate::store::StoredToken;
use crate::types::AnalysisReport;

/// Lifecycle: Queued → Processing → {Completed, Failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved per-job analysis parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    pub min_usd: f64,
    pub time_window_hours: u32,
    #[serde(rename = "transaction_limit")]
    pub max_transactions: usize,
    pub max_credits: u32,
    pub max_wallets: usize,
}

/// Submission overrides; anything left out comes from the `[analysis]` config
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmitRequest {
    pub min_usd: Option<f64>,
    pub time_window_hours: Option<u32>,
    pub transaction_limit: Option<usize>,
    pub max_wallets: Option<usize>,
    pub max_credits: Option<u32>,
}

impl SubmitRequest {
    pub fn resolve(&self, defaults: &AnalysisConfig) -> JobParams {
        JobParams {
            min_usd: self.min_usd.unwrap_or(defaults.min_usd_filter),
            time_window_hours: self
                .time_window_hours
                .unwrap_or(defaults.default_time_window_hours),
            max_transactions: self.transaction_limit.unwrap_or(defaults.transaction_limit),
            max_credits: self.max_credits.unwrap_or(defaults.max_credits_per_analysis),
            max_wallets: self.max_wallets.unwrap_or(defaults.wallet_count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitReceipt {
    pub status: JobStatus,
    pub job_id: String,
    pub token_address: String,
    pub api_settings: JobParams,
    pub results_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisJob {
    pub job_id: String,
    pub status: JobStatus,
    pub token_address: String,
    #[serde(flatten)]
    pub params: JobParams,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<AnalysisReport>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axiom_file: Option<PathBuf>,
}

impl AnalysisJob {
    pub fn new(job_id: String, token_address: String, params: JobParams) -> Self {
        Self {
            job_id,
            status: JobStatus::Queued,
            token_address,
            params,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            token_id: None,
            result_file: None,
            axiom_file: None,
        }
    }
}

pub fn results_url(job_id: &str) -> String {
    format!("/analysis/{}", job_id)
}

/// Row of the `/analysis` listing, from either the job table or the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisJobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub token_address: String,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub acronym: Option<String>,
    pub wallets_found: Option<usize>,
    pub timestamp: DateTime<Utc>,
    pub credits_used: u32,
    pub results_url: String,
}

impl From<&AnalysisJob> for AnalysisJobSummary {
    fn from(job: &AnalysisJob) -> Self {
        let report = job.result.as_ref();
        Self {
            job_id: job.job_id.clone(),
            status: job.status,
            token_address: job.token_address.clone(),
            token_name: report.map(|r| r.token_name().to_string()),
            token_symbol: report.map(|r| r.token_symbol().to_string()),
            acronym: None,
            wallets_found: report.map(|r| r.early_bidders().len()),
            timestamp: job.created_at,
            credits_used: report.map_or(0, |r| r.api_credits_used),
            results_url: results_url(&job.job_id),
        }
    }
}

impl From<StoredToken> for AnalysisJobSummary {
    fn from(token: StoredToken) -> Self {
        let job_id = token.id.to_string();
        Self {
            results_url: results_url(&job_id),
            job_id,
            status: JobStatus::Completed,
            token_address: token.token_address,
            token_name: Some(token.token_name),
            token_symbol: Some(token.token_symbol),
            acronym: Some(token.acronym),
            wallets_found: Some(token.wallets_found),
            timestamp: token.analysis_timestamp,
            credits_used: token.credits_used,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobListing {
    pub total: usize,
    pub jobs: Vec<AnalysisJobSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use JobStatus::*;
        assert!(Queued.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Queued.can_transition_to(Completed));
        assert!(!Queued.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Queued));
        for terminal in [Completed, Failed] {
            assert!(terminal.is_terminal());
            for next in JobStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(JobStatus::Processing).unwrap(), "processing");
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_resolve_uses_defaults() {
        let defaults = AnalysisConfig::default();
        let params = SubmitRequest {
            min_usd: Some(75.0),
            ..SubmitRequest::default()
        }
        .resolve(&defaults);

        assert_eq!(params.min_usd, 75.0);
        assert_eq!(params.time_window_hours, defaults.default_time_window_hours);
        assert_eq!(params.max_transactions, defaults.transaction_limit);
        assert_eq!(params.max_credits, defaults.max_credits_per_analysis);
        assert_eq!(params.max_wallets, defaults.wallet_count);
    }

    #[test]
    fn test_job_serializes_flat_params() {
        let params = SubmitRequest::default().resolve(&AnalysisConfig::default());
        let job = AnalysisJob::new("ab12cd34".to_string(), "Mint".to_string(), params);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["min_usd"], 50.0);
        assert_eq!(json["transaction_limit"], 500);
        assert!(json.get("token_id").is_none());
        assert!(json["result"].is_null());
    }
}
