//! `getTransaction` (jsonParsed) → [`Transaction`]
//!
//! Transfers are reconstructed from balance deltas rather than from decoded
//! instructions, so any program's swaps show up the same way.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::types::{NativeTransfer, TokenTransfer, Transaction};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    block_time: Option<i64>,
    transaction: RpcTransactionBody,
    #[serde(default)]
    meta: Option<RpcMeta>,
}

#[derive(Debug, Deserialize)]
struct RpcTransactionBody {
    message: RpcMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcMessage {
    #[serde(default)]
    account_keys: Vec<AccountKey>,
}

/// jsonParsed gives `{pubkey, signer, writable}` objects, other encodings plain strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountKey {
    Plain(String),
    Parsed { pubkey: String },
}

impl AccountKey {
    fn pubkey(&self) -> &str {
        match self {
            AccountKey::Plain(key) => key,
            AccountKey::Parsed { pubkey } => pubkey,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcMeta {
    #[serde(default)]
    pre_balances: Vec<u64>,
    #[serde(default)]
    post_balances: Vec<u64>,
    pre_token_balances: Option<Vec<RpcTokenBalance>>,
    post_token_balances: Option<Vec<RpcTokenBalance>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTokenBalance {
    account_index: usize,
    #[serde(default)]
    mint: String,
    ui_token_amount: UiTokenAmount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiTokenAmount {
    ui_amount: Option<f64>,
    #[serde(default)]
    amount: String,
    #[serde(default)]
    decimals: u32,
}

impl UiTokenAmount {
    fn value(&self) -> f64 {
        if let Some(ui) = self.ui_amount {
            return ui;
        }
        let raw = self.amount.parse::<f64>().unwrap_or(0.0);
        if self.decimals > 0 {
            raw / 10f64.powi(self.decimals as i32)
        } else {
            raw
        }
    }
}

/// Parse a raw `getTransaction` result. Malformed payloads yield `None`.
pub fn parse_transaction(raw: Value, signature: &str) -> Option<Transaction> {
    let tx: RpcTransaction = match serde_json::from_value(raw) {
        Ok(tx) => tx,
        Err(e) => {
            debug!("Dropping malformed transaction {}: {}", signature, e);
            return None;
        }
    };

    let keys = &tx.transaction.message.account_keys;
    let (native_transfers, token_transfers) = match &tx.meta {
        Some(meta) => (native_transfers(meta, keys), token_transfers(meta, keys)),
        None => (Vec::new(), Vec::new()),
    };

    Some(Transaction {
        signature: signature.to_string(),
        timestamp: tx.block_time,
        native_transfers,
        token_transfers,
    })
}

fn native_transfers(meta: &RpcMeta, keys: &[AccountKey]) -> Vec<NativeTransfer> {
    meta.pre_balances
        .iter()
        .zip(&meta.post_balances)
        .enumerate()
        .filter(|(_, (pre, post))| pre != post)
        .filter_map(|(i, (&pre, &post))| {
            let account = keys.get(i)?.pubkey().to_string();
            Some(NativeTransfer {
                from: (post < pre).then(|| account.clone()),
                to: (post > pre).then_some(account),
                amount: pre.abs_diff(post),
            })
        })
        .collect()
}

fn token_transfers(meta: &RpcMeta, keys: &[AccountKey]) -> Vec<TokenTransfer> {
    let (Some(pre), Some(post)) = (&meta.pre_token_balances, &meta.post_token_balances) else {
        return Vec::new();
    };

    let pre_by_index: HashMap<usize, f64> = pre
        .iter()
        .map(|b| (b.account_index, b.ui_token_amount.value()))
        .collect();

    post.iter()
        .filter_map(|balance| {
            // A new token account has no pre balance
            let before = pre_by_index.get(&balance.account_index).copied().unwrap_or(0.0);
            let after = balance.ui_token_amount.value();
            if before == after {
                return None;
            }
            let account = keys.get(balance.account_index)?.pubkey().to_string();
            Some(TokenTransfer {
                mint: balance.mint.clone(),
                from: (after < before).then(|| account.clone()),
                to: (after > before).then_some(account),
                amount: (after - before).abs(),
            })
        })
        .collect()
}
