//! Buy detection for a single transaction
//!
//! A swap pays SOL from the real wallet while the purchased tokens land in a
//! derived token account, so the buyer is taken from the payment side: the
//! largest SOL sender in a transaction that moved the target mint into some
//! account.

use crate::types::{BuyEvent, NativeTransfer, Transaction, LAMPORTS_PER_SOL};

/// Default SOL→USD conversion rate
pub const DEFAULT_SOL_PRICE_USD: f64 = 200.0;

/// Transfers at or below 0.0001 SOL are fees/rent noise
pub const DEFAULT_DUST_FLOOR_LAMPORTS: u64 = 100_000;

#[derive(Debug, Clone, Copy)]
pub struct BuyEventExtractor {
    sol_price_usd: f64,
    dust_floor_lamports: u64,
}

impl Default for BuyEventExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_SOL_PRICE_USD, DEFAULT_DUST_FLOOR_LAMPORTS)
    }
}

impl BuyEventExtractor {
    pub fn new(sol_price_usd: f64, dust_floor_lamports: u64) -> Self {
        Self {
            sol_price_usd,
            dust_floor_lamports,
        }
    }

    pub fn sol_price_usd(&self) -> f64 {
        self.sol_price_usd
    }

    /// Infer the purchase (if any) of `target_mint` in `tx`
    pub fn extract(&self, tx: &Transaction, target_mint: &str) -> Option<BuyEvent> {
        let timestamp = tx.timestamp?;

        // Only the first matching mint-in is considered
        tx.token_transfers
            .iter()
            .find(|t| t.mint == target_mint && t.to.is_some())?;

        let payment = self.largest_payment(&tx.native_transfers)?;
        let wallet = payment.from.clone()?;

        Some(BuyEvent {
            wallet,
            usd: self.lamports_to_usd(payment.amount),
            timestamp,
        })
    }

    fn largest_payment<'a>(&self, transfers: &'a [NativeTransfer]) -> Option<&'a NativeTransfer> {
        let mut best: Option<&NativeTransfer> = None;
        for transfer in transfers {
            if transfer.from.is_none() || transfer.amount <= self.dust_floor_lamports {
                continue;
            }
            // Strictly greater: ties keep the earlier transfer
            if best.map_or(true, |b| transfer.amount > b.amount) {
                best = Some(transfer);
            }
        }
        best
    }

    pub fn lamports_to_usd(&self, lamports: u64) -> f64 {
        lamports as f64 / LAMPORTS_PER_SOL * self.sol_price_usd
    }
}
