//! In-memory collaborators for pipeline and orchestrator tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::export::WalletTrackerEntry;
use crate::ledger::{LedgerDataSource, LedgerError};
use crate::notify::{Notification, NotificationSink, NotifyError};
use crate::store::{CompletedAnalysis, SavedAnalysis, StoreError, StoredToken, TokenStore};
use crate::types::{NativeTransfer, TokenMetadata, TokenTransfer, Transaction};

pub const MINT: &str = "So11111111111111111111111111111111111111112";
pub const T0: i64 = 1_700_000_000;

pub fn wallet(seed: u8) -> String {
    bs58::encode([seed; 32]).into_string()
}

/// A buy of `MINT` paid by `buyer`
pub fn buy_tx(signature: &str, ts: i64, buyer: &str, lamports: u64) -> Transaction {
    Transaction {
        signature: signature.to_string(),
        timestamp: Some(ts),
        native_transfers: vec![NativeTransfer {
            from: Some(buyer.to_string()),
            to: Some("pool".to_string()),
            amount: lamports,
        }],
        token_transfers: vec![TokenTransfer {
            mint: MINT.to_string(),
            from: None,
            to: Some("ata".to_string()),
            amount: 1_000.0,
        }],
    }
}

#[derive(Default)]
pub struct FakeLedger {
    pub metadata: Option<TokenMetadata>,
    pub metadata_fails: bool,
    /// Newest first
    pub signatures: Vec<String>,
    pub signatures_fail: bool,
    pub transactions: HashMap<String, Transaction>,
    /// Signatures whose fetch errors out
    pub failing: Vec<String>,
    pub panic_on_signatures: bool,
    pub signature_delay: Option<Duration>,
    /// When set, signature fetches wait for a permit
    pub gate: Option<Arc<Semaphore>>,

    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl FakeLedger {
    /// Ledger serving `txs` (given oldest first) with metadata
    pub fn with_history(name: &str, symbol: &str, txs: Vec<Transaction>) -> Self {
        let mut ledger = Self {
            metadata: Some(TokenMetadata {
                name: name.to_string(),
                symbol: symbol.to_string(),
            }),
            ..Self::default()
        };
        for tx in txs.into_iter().rev() {
            ledger.signatures.push(tx.signature.clone());
            ledger.transactions.insert(tx.signature.clone(), tx);
        }
        ledger
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerDataSource for FakeLedger {
    async fn token_metadata(&self, _mint: &str) -> Result<Option<TokenMetadata>, LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.metadata_fails {
            return Err(LedgerError::Http("metadata down".to_string()));
        }
        Ok(self.metadata.clone())
    }

    async fn signatures_for_address(
        &self,
        _address: &str,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if let Some(delay) = self.signature_delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on_signatures {
            panic!("ledger exploded");
        }
        if self.signatures_fail {
            return Err(LedgerError::Rpc {
                code: -32000,
                message: "signatures unavailable".to_string(),
            });
        }
        Ok(self.signatures.iter().take(limit).cloned().collect())
    }

    async fn transaction(&self, signature: &str) -> Result<Option<Transaction>, LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|s| s == signature) {
            return Err(LedgerError::Http("502 Bad Gateway".to_string()));
        }
        Ok(self.transactions.get(signature).cloned())
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub saved: Mutex<Vec<CompletedAnalysis>>,
    pub fail: AtomicBool,
}

impl FakeStore {
    pub fn saved_count(&self) -> usize {
        self.saved.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn stored(id: usize, analysis: &CompletedAnalysis) -> StoredToken {
        StoredToken {
            id: id as i64,
            token_address: analysis.report.token_address.clone(),
            token_name: analysis.report.token_name().to_string(),
            token_symbol: analysis.report.token_symbol().to_string(),
            acronym: analysis.acronym.clone(),
            wallets_found: analysis.report.early_bidders().len(),
            analysis_timestamp: chrono::Utc::now(),
            first_buy_timestamp: None,
            credits_used: analysis.report.api_credits_used,
            analysis_file: None,
            axiom_file: Some(Self::axiom_path(id)),
        }
    }

    fn axiom_path(id: usize) -> PathBuf {
        PathBuf::from(format!("axiom_exports/{id}.json"))
    }
}

impl TokenStore for FakeStore {
    fn save_analysis(&self, analysis: &CompletedAnalysis) -> Result<SavedAnalysis, StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        let mut saved = self.saved.lock().map_err(|e| StoreError::Task(e.to_string()))?;
        saved.push(analysis.clone());
        let id = saved.len();
        Ok(SavedAnalysis {
            token_id: id as i64,
            result_file: PathBuf::from(format!("analysis_results/{id}.json")),
            axiom_file: Self::axiom_path(id),
        })
    }

    fn recent(&self, limit: usize) -> Result<Vec<StoredToken>, StoreError> {
        let saved = self.saved.lock().map_err(|e| StoreError::Task(e.to_string()))?;
        Ok(saved
            .iter()
            .enumerate()
            .rev()
            .take(limit)
            .map(|(i, a)| Self::stored(i + 1, a))
            .collect())
    }

    fn search(&self, query: &str) -> Result<Vec<StoredToken>, StoreError> {
        let query = query.to_lowercase();
        Ok(self
            .recent(usize::MAX)?
            .into_iter()
            .filter(|t| t.token_name.to_lowercase().contains(&query))
            .collect())
    }

    fn read_export(&self, path: &Path) -> Result<Vec<WalletTrackerEntry>, StoreError> {
        let saved = self.saved.lock().map_err(|e| StoreError::Task(e.to_string()))?;
        (1..=saved.len())
            .find(|&id| Self::axiom_path(id) == path)
            .map(|id| saved[id - 1].export.clone())
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub delivered: Mutex<Vec<Notification>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push(notification);
        }
        if self.fail {
            return Err(NotifyError::Delivery("socket closed".to_string()));
        }
        Ok(())
    }
}
