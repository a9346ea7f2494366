use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Simplified ledger transaction, derived from balance deltas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub signature: String,
    /// Block time in epoch seconds (None when the ledger did not report one)
    pub timestamp: Option<i64>,
    pub native_transfers: Vec<NativeTransfer>,
    pub token_transfers: Vec<TokenTransfer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeTransfer {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Lamports
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub mint: String,
    pub from: Option<String>,
    pub to: Option<String>,
    /// UI amount (already scaled by decimals)
    pub amount: f64,
}

/// A single inferred purchase inside one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct BuyEvent {
    pub wallet: String,
    pub usd: f64,
    pub timestamp: i64,
}

/// Aggregated per-wallet buy statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidderRecord {
    pub wallet_address: String,
    pub first_buy_time: DateTime<Utc>,
    pub total_usd: f64,
    pub transaction_count: u32,
    pub average_buy_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
}

/// Output of the early bidder aggregation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateResult {
    pub first_transaction_time: Option<DateTime<Utc>>,
    pub analysis_window_end: Option<DateTime<Utc>>,
    pub early_bidders: Vec<BidderRecord>,
    pub total_unique_buyers: usize,
    pub total_transactions_analyzed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AggregateResult {
    /// Result for a degenerate run: no bidders, an explanatory error
    pub fn empty(error: impl Into<String>, transactions_analyzed: usize) -> Self {
        Self {
            error: Some(error.into()),
            total_transactions_analyzed: transactions_analyzed,
            ..Self::default()
        }
    }
}

/// Full analysis result for one token, as served and persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub token_address: String,
    pub token_info: Option<TokenMetadata>,
    #[serde(flatten)]
    pub aggregate: AggregateResult,
    pub api_credits_used: u32,
}

impl AnalysisReport {
    pub fn early_bidders(&self) -> &[BidderRecord] {
        &self.aggregate.early_bidders
    }

    pub fn token_name(&self) -> &str {
        self.token_info.as_ref().map(|t| t.name.as_str()).unwrap_or("Unknown")
    }

    pub fn token_symbol(&self) -> &str {
        self.token_info.as_ref().map(|t| t.symbol.as_str()).unwrap_or("UNK")
    }
}
