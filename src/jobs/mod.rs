//! Asynchronous analysis jobs: the job table, the staged pipeline and the
//! bounded orchestrator that drives them.

pub mod job;
pub mod orchestrator;
pub mod pipeline;
pub mod table;

#[cfg(test)]
pub(crate) mod fakes;

pub use job::{
    AnalysisJob, AnalysisJobSummary, JobListing, JobParams, JobStatus, SubmitReceipt,
    SubmitRequest,
};
pub use orchestrator::{
    AnalysisOrchestrator, CsvExport, OrchestratorError, OrchestratorSettings, WalletTrackerExport,
};
pub use pipeline::PipelineError;
pub use table::JobTable;
