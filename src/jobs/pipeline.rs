//! Analysis pipeline stages
//!
//! Each stage is a plain function returning `Result<_, PipelineError>` (or an
//! infallible value when its failures degrade instead of failing the job).
//! The orchestrator composes them and maps any error to a failed job.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::job::JobParams;
use crate::analysis::{AggregateError, EarlyBidderAggregator};
use crate::export::{acronym, build_export_list};
use crate::ledger::{CreditBudget, LedgerDataSource, LedgerError};
use crate::store::{CompletedAnalysis, SavedAnalysis, StoreError, TokenStore};
use crate::types::{AggregateResult, AnalysisReport, TokenMetadata, Transaction};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("ledger fetch failed: {0}")]
    Fetch(#[from] LedgerError),

    #[error("{stage} timed out after {}s", .after.as_secs())]
    Timeout { stage: &'static str, after: Duration },

    #[error("analysis task panicked: {0}")]
    Panicked(String),
}

/// Shared, cheaply clonable collaborators for one pipeline run
#[derive(Clone)]
pub struct PipelineContext {
    pub ledger: Arc<dyn LedgerDataSource>,
    pub aggregator: EarlyBidderAggregator,
    pub fetch_timeout: Duration,
}

impl PipelineContext {
    async fn bounded<T>(
        &self,
        stage: &'static str,
        call: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, PipelineError> {
        match tokio::time::timeout(self.fetch_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PipelineError::Timeout {
                stage,
                after: self.fetch_timeout,
            }),
        }
    }
}

/// Fetch, extract and aggregate one token. Persistence happens afterwards.
pub async fn run(
    ctx: PipelineContext,
    token_address: String,
    params: JobParams,
) -> Result<AnalysisReport, PipelineError> {
    let mut budget = CreditBudget::new(params.max_credits);

    let token_info = fetch_metadata(&ctx, &token_address, &mut budget).await;
    let signatures = fetch_signatures(&ctx, &token_address, params.max_transactions, &mut budget).await?;
    let transactions = fetch_transactions(&ctx, &signatures, &mut budget).await;
    let aggregate = aggregate(&ctx.aggregator, transactions, &token_address, &params);

    info!(
        "✅ Analysis finished: {} early bidders from {} transactions ({} credits)",
        aggregate.early_bidders.len(),
        aggregate.total_transactions_analyzed,
        budget.used()
    );

    Ok(AnalysisReport {
        token_address,
        token_info,
        aggregate,
        api_credits_used: budget.used(),
    })
}

/// Stage 1. Failures degrade to "no metadata".
pub async fn fetch_metadata(
    ctx: &PipelineContext,
    mint: &str,
    budget: &mut CreditBudget,
) -> Option<TokenMetadata> {
    if !budget.try_spend() {
        return None;
    }
    match ctx.bounded("token metadata", ctx.ledger.token_metadata(mint)).await {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("⚠️  Token metadata unavailable: {}", e);
            None
        }
    }
}

/// Stage 2. Newest first. Failure fails the job.
pub async fn fetch_signatures(
    ctx: &PipelineContext,
    mint: &str,
    limit: usize,
    budget: &mut CreditBudget,
) -> Result<Vec<String>, PipelineError> {
    if !budget.try_spend() {
        warn!("⚠️  Credit budget exhausted before fetching signatures");
        return Ok(Vec::new());
    }
    let signatures = ctx
        .bounded("signature fetch", ctx.ledger.signatures_for_address(mint, limit))
        .await?;
    debug!("Fetched {} signatures", signatures.len());
    Ok(signatures)
}

/// Stage 3. Individual failures and timeouts are skipped; stops when credits run out.
pub async fn fetch_transactions(
    ctx: &PipelineContext,
    signatures: &[String],
    budget: &mut CreditBudget,
) -> Vec<Transaction> {
    let affordable = (budget.remaining() as usize).min(signatures.len());
    if affordable < signatures.len() {
        warn!(
            "⚠️  Credit budget covers {}/{} transactions",
            affordable,
            signatures.len()
        );
    }
    let mut transactions = Vec::with_capacity(affordable);

    for (i, signature) in signatures.iter().enumerate() {
        if !budget.try_spend() {
            debug!("Credit budget exhausted after {} transactions", i);
            break;
        }
        if i > 0 && i % 50 == 0 {
            debug!("Progress: {}/{} transactions fetched", i, signatures.len());
        }

        match ctx.bounded("transaction fetch", ctx.ledger.transaction(signature)).await {
            Ok(Some(tx)) => transactions.push(tx),
            Ok(None) => {}
            Err(e) => debug!("Skipping transaction {}: {}", signature, e),
        }
    }

    transactions
}

/// Stage 4. `newest_first` is reversed before aggregation. A history with no
/// timestamps becomes a degenerate result rather than an error.
pub fn aggregate(
    aggregator: &EarlyBidderAggregator,
    mut newest_first: Vec<Transaction>,
    mint: &str,
    params: &JobParams,
) -> AggregateResult {
    newest_first.reverse();
    let oldest_first = newest_first;

    match aggregator.aggregate(&oldest_first, mint, params.min_usd, params.time_window_hours) {
        Ok(result) => result,
        Err(e @ AggregateError::NoTransactionData) => {
            AggregateResult::empty(e.to_string(), oldest_first.len())
        }
    }
}

/// Zero bidders and nothing known about the token: nothing worth keeping
pub fn is_degenerate(report: &AnalysisReport) -> bool {
    report.early_bidders().is_empty() && report.token_info.is_none()
}

/// Stage 5a. Acronym and wallet-tracker list for a finished report.
pub fn prepare_export(report: AnalysisReport, max_wallets: usize) -> CompletedAnalysis {
    let acronym = acronym(report.token_name(), Some(report.token_symbol()));
    let export = build_export_list(
        report.early_bidders(),
        report.token_name(),
        Some(report.token_symbol()),
        max_wallets,
    );
    CompletedAnalysis {
        report,
        acronym,
        export,
        max_wallets,
    }
}

/// Stage 5b. Runs the synchronous store on the blocking pool.
pub async fn persist(
    store: Arc<dyn TokenStore>,
    analysis: CompletedAnalysis,
) -> Result<SavedAnalysis, StoreError> {
    tokio::task::spawn_blocking(move || store.save_analysis(&analysis))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}
