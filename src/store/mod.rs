//! Persistence of completed analyses
//!
//! The store is synchronous (rusqlite). Async callers go through
//! `tokio::task::spawn_blocking`.

pub mod files;
pub mod sqlite;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::WalletTrackerEntry;
use crate::types::AnalysisReport;

pub use sqlite::SqliteTokenStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("store task failed: {0}")]
    Task(String),
}

/// Everything needed to persist one finished analysis
#[derive(Debug, Clone)]
pub struct CompletedAnalysis {
    pub report: AnalysisReport,
    pub acronym: String,
    pub export: Vec<WalletTrackerEntry>,
    /// Wallet rows kept in the database
    pub max_wallets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedAnalysis {
    pub token_id: i64,
    pub result_file: PathBuf,
    pub axiom_file: PathBuf,
}

/// One row of `analyzed_tokens`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub id: i64,
    pub token_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub acronym: String,
    pub wallets_found: usize,
    pub analysis_timestamp: DateTime<Utc>,
    pub first_buy_timestamp: Option<DateTime<Utc>>,
    pub credits_used: u32,
    pub analysis_file: Option<PathBuf>,
    pub axiom_file: Option<PathBuf>,
}

pub trait TokenStore: Send + Sync {
    fn save_analysis(&self, analysis: &CompletedAnalysis) -> Result<SavedAnalysis, StoreError>;

    /// Newest first
    fn recent(&self, limit: usize) -> Result<Vec<StoredToken>, StoreError>;

    /// Case-insensitive substring match over address, name, symbol and acronym
    fn search(&self, query: &str) -> Result<Vec<StoredToken>, StoreError>;

    fn read_export(&self, path: &Path) -> Result<Vec<WalletTrackerEntry>, StoreError>;
}
