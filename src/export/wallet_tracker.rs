//! Wallet-tracker import list (Axiom format)

use serde::{Deserialize, Serialize};

use super::acronym::acronym;
use crate::types::BidderRecord;

pub const DEFAULT_WALLET_LIMIT: usize = 10;

const DEFAULT_EMOJI: &str = "#️⃣";
const DEFAULT_GROUP: &str = "Main";
const DEFAULT_SOUND: &str = "bing";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTrackerEntry {
    pub tracked_wallet_address: String,
    pub name: String,
    pub emoji: String,
    pub alerts_on_toast: bool,
    pub alerts_on_bubble: bool,
    pub alerts_on_feed: bool,
    pub groups: Vec<String>,
    pub sound: String,
}

impl WalletTrackerEntry {
    fn with_defaults(wallet: &str, name: String) -> Self {
        Self {
            tracked_wallet_address: wallet.to_string(),
            name,
            emoji: DEFAULT_EMOJI.to_string(),
            alerts_on_toast: true,
            alerts_on_bubble: true,
            alerts_on_feed: true,
            groups: vec![DEFAULT_GROUP.to_string()],
            sound: DEFAULT_SOUND.to_string(),
        }
    }
}

/// Build the import list for the first `limit` bidders (already ranked).
///
/// Each entry is named `({rank}/{limit})${usd}|{acronym}`, with `usd` being
/// the wallet's total rounded half-to-even to whole dollars.
pub fn build_export_list(
    bidders: &[BidderRecord],
    token_name: &str,
    token_symbol: Option<&str>,
    limit: usize,
) -> Vec<WalletTrackerEntry> {
    let label = acronym(token_name, token_symbol);

    bidders
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, bidder)| {
            let usd = bidder.total_usd.round_ties_even() as i64;
            let name = format!("({}/{})${}|{}", i + 1, limit, usd, label);
            WalletTrackerEntry::with_defaults(&bidder.wallet_address, name)
        })
        .collect()
}
