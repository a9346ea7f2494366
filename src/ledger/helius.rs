//! Helius JSON-RPC client
//!
//! Standard Solana RPC for signatures and transactions, plus DAS `getAsset`
//! for token metadata. Assets missing a name or symbol on chain fall back to
//! the off-chain JSON behind `content.json_uri`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::parser::parse_transaction;
use super::{LedgerDataSource, LedgerError};
use crate::config::RpcConfig;
use crate::types::{TokenMetadata, Transaction};

/// `getSignaturesForAddress` page size ceiling
pub const MAX_SIGNATURES_PER_CALL: usize = 1000;

const UNKNOWN_NAME: &str = "Unknown";
const UNKNOWN_SYMBOL: &str = "UNK";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct SignatureInfo {
    signature: String,
}

pub struct HeliusClient {
    client: reqwest::Client,
    rpc_url: String,
    timeout: Duration,
}

impl HeliusClient {
    pub fn new(config: &RpcConfig) -> Result<Self, LedgerError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            rpc_url: rpc_url(&config.endpoint, &config.api_key),
            timeout,
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Http(format!("{method} returned {status}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(err) = body.error {
            return Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(body.result.unwrap_or(Value::Null))
    }

    async fn off_chain_json(&self, uri: &str) -> Result<Value, LedgerError> {
        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Http(format!("{uri} returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("{uri}: {e}")))
    }

    fn request_error(&self, e: reqwest::Error) -> LedgerError {
        if e.is_timeout() {
            LedgerError::Timeout(self.timeout)
        } else {
            LedgerError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl LedgerDataSource for HeliusClient {
    async fn token_metadata(&self, mint: &str) -> Result<Option<TokenMetadata>, LedgerError> {
        let params = json!({
            "id": mint,
            "displayOptions": {
                "showUnverifiedCollections": true,
                "showCollectionMetadata": true,
            },
        });
        let asset = self.rpc_call("getAsset", params).await?;
        let Some(mut fields) = parse_asset(&asset) else {
            return Ok(None);
        };

        if let Some(uri) = fields.off_chain_uri() {
            match self.off_chain_json(&uri).await {
                Ok(doc) => fields.merge_off_chain(&doc),
                Err(e) => warn!("Off-chain metadata for {} unavailable: {}", mint, e),
            }
        }

        let meta = fields.into_metadata();
        debug!("DAS metadata for {}: {} ({})", mint, meta.name, meta.symbol);
        Ok(Some(meta))
    }

    async fn signatures_for_address(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError> {
        let limit = limit.clamp(1, MAX_SIGNATURES_PER_CALL);
        let result = self
            .rpc_call("getSignaturesForAddress", json!([address, { "limit": limit }]))
            .await?;
        parse_signatures(result, limit)
    }

    async fn transaction(&self, signature: &str) -> Result<Option<Transaction>, LedgerError> {
        let params = json!([
            signature,
            {
                "encoding": "jsonParsed",
                "maxSupportedTransactionVersion": 0,
            }
        ]);
        let raw = self.rpc_call("getTransaction", params).await?;
        if raw.is_null() {
            warn!("Transaction {} not found", signature);
            return Ok(None);
        }
        Ok(parse_transaction(raw, signature))
    }
}

fn rpc_url(endpoint: &str, api_key: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    if api_key.is_empty() {
        base.to_string()
    } else {
        format!("{base}/?api-key={api_key}")
    }
}

fn parse_signatures(result: Value, limit: usize) -> Result<Vec<String>, LedgerError> {
    if result.is_null() {
        return Ok(Vec::new());
    }
    let infos: Vec<SignatureInfo> = serde_json::from_value(result)
        .map_err(|e| LedgerError::InvalidResponse(format!("getSignaturesForAddress: {e}")))?;
    Ok(infos.into_iter().take(limit).map(|s| s.signature).collect())
}

/// Name and symbol as found on an asset, before defaults are applied
#[derive(Debug, PartialEq)]
struct AssetFields {
    name: Option<String>,
    symbol: Option<String>,
    json_uri: Option<String>,
}

impl AssetFields {
    /// URI worth fetching, only while something is still missing
    fn off_chain_uri(&self) -> Option<String> {
        if self.name.is_some() && self.symbol.is_some() {
            return None;
        }
        self.json_uri
            .as_deref()
            .filter(|uri| uri.starts_with("http://") || uri.starts_with("https://"))
            .map(str::to_string)
    }

    fn merge_off_chain(&mut self, doc: &Value) {
        if self.name.is_none() {
            self.name = text_field(Some(doc), "name");
        }
        if self.symbol.is_none() {
            self.symbol = text_field(Some(doc), "symbol");
        }
    }

    fn into_metadata(self) -> TokenMetadata {
        TokenMetadata {
            name: self.name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            symbol: self.symbol.unwrap_or_else(|| UNKNOWN_SYMBOL.to_string()),
        }
    }
}

fn text_field(value: Option<&Value>, key: &str) -> Option<String> {
    value
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_asset(asset: &Value) -> Option<AssetFields> {
    if asset.is_null() {
        return None;
    }
    let metadata = asset.pointer("/content/metadata");

    Some(AssetFields {
        name: text_field(metadata, "name"),
        symbol: text_field(metadata, "symbol"),
        json_uri: text_field(asset.get("content"), "json_uri"),
    })
}
