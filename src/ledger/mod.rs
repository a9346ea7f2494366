//! Ledger data source
//!
//! The pipeline only sees the [`LedgerDataSource`] trait. [`HeliusClient`] is
//! the shipped JSON-RPC implementation.

pub mod helius;
pub mod parser;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{TokenMetadata, Transaction};

pub use helius::HeliusClient;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait LedgerDataSource: Send + Sync {
    /// Name and symbol of a mint, `None` when the ledger has no record of it
    async fn token_metadata(&self, mint: &str) -> Result<Option<TokenMetadata>, LedgerError>;

    /// Signatures touching `address`, newest first
    async fn signatures_for_address(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError>;

    /// One transaction, `None` if unknown or unparseable
    async fn transaction(&self, signature: &str) -> Result<Option<Transaction>, LedgerError>;
}

/// Per-analysis cap on billed RPC calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditBudget {
    max: u32,
    used: u32,
}

impl CreditBudget {
    pub fn new(max: u32) -> Self {
        Self { max, used: 0 }
    }

    /// Charge one credit. Returns false (and charges nothing) once exhausted.
    pub fn try_spend(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn remaining(&self) -> u32 {
        self.max.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }
}
