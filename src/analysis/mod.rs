//! Early bidder analysis core
//!
//! Pure, synchronous building blocks: address validation, per-transaction
//! buy extraction, and per-wallet aggregation over a time window.

pub mod address;
pub mod aggregator;
pub mod extractor;

pub use address::is_transactable;
pub use aggregator::{AggregateError, EarlyBidderAggregator};
pub use extractor::BuyEventExtractor;
