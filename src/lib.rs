// Early Bidders - token launch analysis service
// Finds the wallets that bought a token early and above a spend threshold

pub mod analysis;
pub mod api;
pub mod config;
pub mod export;
pub mod jobs;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod store;
pub mod types;

pub use jobs::AnalysisOrchestrator;
