//! Early bidder aggregation
//!
//! Walks a token's transactions oldest-first, anchors a time window at the
//! first timestamped transaction, and folds qualifying buy events into
//! per-wallet records ranked by first buy time.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::debug;

use super::address::is_transactable;
use super::extractor::BuyEventExtractor;
use crate::types::{AggregateResult, BidderRecord, Transaction};

pub const NO_TRANSACTIONS_FOUND: &str = "No transactions found";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("Could not determine first transaction time")]
    NoTransactionData,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EarlyBidderAggregator {
    extractor: BuyEventExtractor,
}

/// Counters for the debug summary line
#[derive(Debug, Default)]
struct ScanStats {
    timestamped: usize,
    within_window: usize,
    with_buyer: usize,
    meets_threshold: usize,
}

impl EarlyBidderAggregator {
    pub fn new(extractor: BuyEventExtractor) -> Self {
        Self { extractor }
    }

    /// Aggregate early bidders from `transactions`, which must be ordered oldest-first.
    ///
    /// An empty input is a valid negative outcome and yields a result carrying
    /// [`NO_TRANSACTIONS_FOUND`]. Input with no timestamps at all cannot anchor
    /// a window and fails with [`AggregateError::NoTransactionData`].
    pub fn aggregate(
        &self,
        transactions: &[Transaction],
        target_mint: &str,
        min_usd: f64,
        window_hours: u32,
    ) -> Result<AggregateResult, AggregateError> {
        if transactions.is_empty() {
            return Ok(AggregateResult::empty(NO_TRANSACTIONS_FOUND, 0));
        }

        let first_tx_time = transactions
            .iter()
            .filter_map(|tx| tx.timestamp)
            .find_map(to_datetime)
            .ok_or(AggregateError::NoTransactionData)?;
        // Windows past the representable range include everything
        let window_end = Duration::try_hours(i64::from(window_hours))
            .and_then(|window| first_tx_time.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        // Vec keeps first-encounter order for the stable sort below
        let mut bidders: Vec<BidderRecord> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut stats = ScanStats::default();

        for tx in transactions {
            let Some(tx_time) = tx.timestamp.and_then(to_datetime) else {
                continue;
            };
            stats.timestamped += 1;

            if tx_time > window_end {
                continue;
            }
            stats.within_window += 1;

            let Some(event) = self.extractor.extract(tx, target_mint) else {
                continue;
            };
            stats.with_buyer += 1;

            if !is_transactable(&event.wallet) {
                debug!("Skipping off-curve wallet: {}", event.wallet);
                continue;
            }
            // Threshold is per event: a small buy never counts, even for a qualified wallet
            if event.usd < min_usd {
                continue;
            }
            stats.meets_threshold += 1;

            match index.get(&event.wallet) {
                Some(&i) => {
                    let record = &mut bidders[i];
                    record.total_usd += event.usd;
                    record.transaction_count += 1;
                    if tx_time < record.first_buy_time {
                        record.first_buy_time = tx_time;
                    }
                }
                None => {
                    index.insert(event.wallet.clone(), bidders.len());
                    bidders.push(BidderRecord {
                        wallet_address: event.wallet,
                        first_buy_time: tx_time,
                        total_usd: event.usd,
                        transaction_count: 1,
                        average_buy_usd: 0.0,
                    });
                }
            }
        }

        debug!(
            "Checked {} txs, {} in window, {} with buyers, {} meeting threshold",
            stats.timestamped, stats.within_window, stats.with_buyer, stats.meets_threshold
        );

        for record in &mut bidders {
            record.average_buy_usd = record.total_usd / f64::from(record.transaction_count);
        }
        bidders.sort_by_key(|r| r.first_buy_time);

        Ok(AggregateResult {
            first_transaction_time: Some(first_tx_time),
            analysis_window_end: Some(window_end),
            total_unique_buyers: bidders.len(),
            total_transactions_analyzed: transactions.len(),
            early_bidders: bidders,
            error: None,
        })
    }
}

fn to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NativeTransfer, TokenTransfer};

    const MINT: &str = "MintAddress1111111111111111111111111111111";
    const T0: i64 = 1_700_000_000;
    const HOUR: i64 = 3_600;

    fn wallet(seed: u8) -> String {
        bs58::encode([seed; 32]).into_string()
    }

    fn buy(sig: &str, ts: Option<i64>, buyer: &str, lamports: u64) -> Transaction {
        Transaction {
            signature: sig.to_string(),
            timestamp: ts,
            native_transfers: vec![NativeTransfer {
                from: Some(buyer.to_string()),
                to: Some("pool".to_string()),
                amount: lamports,
            }],
            token_transfers: vec![TokenTransfer {
                mint: MINT.to_string(),
                from: None,
                to: Some("token_account".to_string()),
                amount: 42.0,
            }],
        }
    }

    /// USD at the default rate of $200/SOL
    fn usd(amount: f64) -> u64 {
        (amount / 200.0 * 1_000_000_000.0).round() as u64
    }

    fn aggregator() -> EarlyBidderAggregator {
        EarlyBidderAggregator::default()
    }

    #[test]
    fn test_scenario_single_buy() {
        let w = wallet(1);
        let txs = vec![buy("a", Some(T0), &w, 1_000_000_000)];

        let result = aggregator().aggregate(&txs, MINT, 50.0, 24).unwrap();
        assert_eq!(result.early_bidders.len(), 1);
        let bidder = &result.early_bidders[0];
        assert_eq!(bidder.wallet_address, w);
        assert_eq!(bidder.total_usd, 200.0);
        assert_eq!(bidder.transaction_count, 1);
        assert_eq!(bidder.average_buy_usd, 200.0);
        assert_eq!(result.total_unique_buyers, 1);
        assert_eq!(result.total_transactions_analyzed, 1);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_threshold_applies_per_event() {
        // $60 then $40 with min $50: the $40 buy contributes nothing
        let w = wallet(2);
        let txs = vec![
            buy("a", Some(T0), &w, usd(60.0)),
            buy("b", Some(T0 + 60), &w, usd(40.0)),
        ];

        let result = aggregator().aggregate(&txs, MINT, 50.0, 24).unwrap();
        assert_eq!(result.early_bidders.len(), 1);
        let bidder = &result.early_bidders[0];
        assert!((bidder.total_usd - 60.0).abs() < 1e-9);
        assert_eq!(bidder.transaction_count, 1);
    }

    #[test]
    fn test_threshold_boundary() {
        let exact = wallet(3);
        let below = wallet(4);
        let txs = vec![
            buy("a", Some(T0), &exact, 250_000_000),  // $50.00
            buy("b", Some(T0 + 1), &below, 249_950_000), // $49.99
        ];

        let result = aggregator().aggregate(&txs, MINT, 50.0, 24).unwrap();
        let wallets: Vec<_> = result.early_bidders.iter().map(|b| b.wallet_address.clone()).collect();
        assert_eq!(wallets, vec![exact]);
    }

    #[test]
    fn test_empty_input_is_negative_outcome() {
        let result = aggregator().aggregate(&[], MINT, 50.0, 24).unwrap();
        assert_eq!(result.error.as_deref(), Some("No transactions found"));
        assert!(result.early_bidders.is_empty());
        assert_eq!(result.total_unique_buyers, 0);
        assert_eq!(result.total_transactions_analyzed, 0);
    }

    #[test]
    fn test_no_timestamps_fails() {
        let txs = vec![buy("a", None, &wallet(1), 1_000_000_000)];
        let err = aggregator().aggregate(&txs, MINT, 50.0, 24).unwrap_err();
        assert_eq!(err, AggregateError::NoTransactionData);
    }

    #[test]
    fn test_window_is_anchored_at_first_timestamp() {
        let early = wallet(5);
        let edge = wallet(6);
        let late = wallet(7);
        let txs = vec![
            buy("untimed", None, &wallet(8), 1_000_000_000),
            buy("a", Some(T0), &early, 1_000_000_000),
            buy("b", Some(T0 + 2 * HOUR), &edge, 1_000_000_000),
            buy("c", Some(T0 + 2 * HOUR + 1), &late, 1_000_000_000),
        ];

        let result = aggregator().aggregate(&txs, MINT, 50.0, 2).unwrap();
        let wallets: Vec<_> = result.early_bidders.iter().map(|b| b.wallet_address.clone()).collect();
        assert_eq!(wallets, vec![early, edge]);
        assert_eq!(result.total_transactions_analyzed, 4);
        assert_eq!(
            result.analysis_window_end,
            DateTime::<Utc>::from_timestamp(T0 + 2 * HOUR, 0)
        );
    }

    #[test]
    fn test_huge_window_saturates() {
        let first = wallet(5);
        let much_later = wallet(6);
        let txs = vec![
            buy("a", Some(T0), &first, 1_000_000_000),
            buy("b", Some(T0 + 10 * 365 * 24 * HOUR), &much_later, 1_000_000_000),
        ];

        let result = aggregator().aggregate(&txs, MINT, 50.0, u32::MAX).unwrap();
        assert_eq!(result.early_bidders.len(), 2);
        assert_eq!(result.analysis_window_end, Some(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_off_curve_buyers_are_dropped() {
        let txs = vec![
            buy("a", Some(T0), "ShortPda", 1_000_000_000),
            buy("b", Some(T0 + 1), &bs58::encode([9u8; 33]).into_string(), 1_000_000_000),
        ];
        let result = aggregator().aggregate(&txs, MINT, 1.0, 24).unwrap();
        assert!(result.early_bidders.is_empty());
    }

    #[test]
    fn test_accumulates_and_ranks_by_first_buy() {
        let a = wallet(10);
        let b = wallet(11);
        let c = wallet(12);
        let txs = vec![
            buy("1", Some(T0), &b, usd(100.0)),
            buy("2", Some(T0 + 10), &a, usd(300.0)),
            buy("3", Some(T0 + 20), &b, usd(200.0)),
            buy("4", Some(T0 + 30), &c, usd(75.0)),
        ];

        let result = aggregator().aggregate(&txs, MINT, 50.0, 24).unwrap();
        let order: Vec<_> = result.early_bidders.iter().map(|r| r.wallet_address.clone()).collect();
        assert_eq!(order, vec![b.clone(), a, c]);

        let first = &result.early_bidders[0];
        assert_eq!(first.transaction_count, 2);
        assert!((first.total_usd - 300.0).abs() < 1e-9);
        assert!((first.average_buy_usd - 150.0).abs() < 1e-9);
        assert_eq!(first.first_buy_time, DateTime::<Utc>::from_timestamp(T0, 0).unwrap());

        assert_eq!(result.total_unique_buyers, result.early_bidders.len());
        for r in &result.early_bidders {
            assert_eq!(r.average_buy_usd, r.total_usd / f64::from(r.transaction_count));
        }
    }

    #[test]
    fn test_ties_keep_encounter_order() {
        let first = wallet(20);
        let second = wallet(21);
        let third = wallet(22);
        let txs = vec![
            buy("1", Some(T0 + 5), &second, usd(100.0)),
            buy("2", Some(T0 + 5), &first, usd(100.0)),
            buy("3", Some(T0 + 5), &third, usd(100.0)),
        ];

        let result = aggregator().aggregate(&txs, MINT, 50.0, 24).unwrap();
        let order: Vec<_> = result.early_bidders.iter().map(|r| r.wallet_address.clone()).collect();
        assert_eq!(order, vec![second, first, third]);
    }

    #[test]
    fn test_first_buy_time_never_increases() {
        // Out-of-order input still keeps the earliest buy
        let w = wallet(30);
        let txs = vec![
            buy("1", Some(T0), &wallet(31), usd(100.0)),
            buy("2", Some(T0 + 50), &w, usd(100.0)),
            buy("3", Some(T0 + 10), &w, usd(100.0)),
        ];

        let result = aggregator().aggregate(&txs, MINT, 50.0, 24).unwrap();
        let record = result.early_bidders.iter().find(|r| r.wallet_address == w).unwrap();
        assert_eq!(record.first_buy_time, DateTime::<Utc>::from_timestamp(T0 + 10, 0).unwrap());
    }

    #[test]
    fn test_idempotent() {
        let txs = vec![
            buy("1", Some(T0), &wallet(40), usd(120.0)),
            buy("2", Some(T0 + 3), &wallet(41), usd(80.0)),
            buy("3", Some(T0 + 9), &wallet(40), usd(90.0)),
        ];
        let agg = aggregator();
        let once = agg.aggregate(&txs, MINT, 50.0, 24).unwrap();
        let twice = agg.aggregate(&txs, MINT, 50.0, 24).unwrap();
        assert_eq!(once, twice);
    }
}
