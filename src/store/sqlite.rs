use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use super::files::{read_json, slug, write_json_atomic};
use super::{CompletedAnalysis, SavedAnalysis, StoreError, StoredToken, TokenStore};
use crate::export::WalletTrackerEntry;

const TOKEN_COLUMNS: &str = "id, token_address, token_name, token_symbol, acronym, wallets_found, \
     analysis_timestamp, first_buy_timestamp, credits_used, analysis_file, axiom_file";

pub struct SqliteTokenStore {
    conn: Mutex<Connection>,
    results_dir: PathBuf,
    exports_dir: PathBuf,
}

impl SqliteTokenStore {
    pub fn new<P: AsRef<Path>>(
        path: P,
        wal_mode: bool,
        results_dir: impl Into<PathBuf>,
        exports_dir: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        if wal_mode {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }

        let store = Self {
            conn: Mutex::new(conn),
            results_dir: results_dir.into(),
            exports_dir: exports_dir.into(),
        };
        store.initialize_schema()?;

        info!("✅ Token store initialized");
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), StoreError> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS analyzed_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token_address TEXT NOT NULL,
                token_name TEXT NOT NULL,
                token_symbol TEXT NOT NULL,
                acronym TEXT NOT NULL,
                wallets_found INTEGER NOT NULL DEFAULT 0,
                analysis_timestamp INTEGER NOT NULL,
                first_buy_timestamp INTEGER,
                credits_used INTEGER NOT NULL DEFAULT 0,
                max_wallets INTEGER NOT NULL,
                analysis_file TEXT,
                axiom_file TEXT
            );

            CREATE TABLE IF NOT EXISTS early_buyer_wallets (
                token_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                wallet_address TEXT NOT NULL,
                first_buy_time INTEGER NOT NULL,
                total_usd REAL NOT NULL,
                transaction_count INTEGER NOT NULL,
                average_buy_usd REAL NOT NULL,
                PRIMARY KEY(token_id, position),
                FOREIGN KEY(token_id) REFERENCES analyzed_tokens(id)
            );

            CREATE INDEX IF NOT EXISTS idx_tokens_address ON analyzed_tokens(token_address);
            CREATE INDEX IF NOT EXISTS idx_wallets_address ON early_buyer_wallets(wallet_address);
            "#,
        )?;

        debug!("📊 Token store schema initialized");
        Ok(())
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn query_tokens(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<StoredToken>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, token_from_row)?;
        let tokens = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(tokens)
    }
}

impl TokenStore for SqliteTokenStore {
    fn save_analysis(&self, analysis: &CompletedAnalysis) -> Result<SavedAnalysis, StoreError> {
        let report = &analysis.report;
        let bidders = report.early_bidders();

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO analyzed_tokens (
                token_address, token_name, token_symbol, acronym, wallets_found,
                analysis_timestamp, first_buy_timestamp, credits_used, max_wallets
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                report.token_address,
                report.token_name(),
                report.token_symbol(),
                analysis.acronym,
                bidders.len() as i64,
                Utc::now().timestamp(),
                report.aggregate.first_transaction_time.map(|t| t.timestamp()),
                report.api_credits_used,
                analysis.max_wallets as i64,
            ],
        )?;
        let token_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO early_buyer_wallets (
                    token_id, position, wallet_address, first_buy_time,
                    total_usd, transaction_count, average_buy_usd
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (i, bidder) in bidders.iter().take(analysis.max_wallets).enumerate() {
                stmt.execute(params![
                    token_id,
                    (i + 1) as i64,
                    bidder.wallet_address,
                    bidder.first_buy_time.timestamp(),
                    bidder.total_usd,
                    bidder.transaction_count,
                    bidder.average_buy_usd,
                ])?;
            }
        }

        let result_file = self
            .results_dir
            .join(format!("{}_{}.json", token_id, slug(report.token_name())));
        let axiom_file = self
            .exports_dir
            .join(format!("{}_{}.json", token_id, slug(&analysis.acronym)));

        // Files first: a failed write rolls the rows back with the dropped transaction
        write_json_atomic(&result_file, report)?;
        write_json_atomic(&axiom_file, &analysis.export)?;

        tx.execute(
            "UPDATE analyzed_tokens SET analysis_file = ?1, axiom_file = ?2 WHERE id = ?3",
            params![
                result_file.to_string_lossy().into_owned(),
                axiom_file.to_string_lossy().into_owned(),
                token_id
            ],
        )?;
        tx.commit()?;

        info!("💾 Saved analysis {} ({} wallets)", token_id, bidders.len());
        Ok(SavedAnalysis {
            token_id,
            result_file,
            axiom_file,
        })
    }

    fn recent(&self, limit: usize) -> Result<Vec<StoredToken>, StoreError> {
        let sql = format!("SELECT {TOKEN_COLUMNS} FROM analyzed_tokens ORDER BY id DESC LIMIT ?1");
        self.query_tokens(&sql, params![limit as i64])
    }

    fn search(&self, query: &str) -> Result<Vec<StoredToken>, StoreError> {
        let pattern = format!("%{}%", escape_like(&query.trim().to_lowercase()));
        let sql = format!(
            "SELECT {TOKEN_COLUMNS} FROM analyzed_tokens
             WHERE LOWER(token_address) LIKE ?1 ESCAPE '\\'
                OR LOWER(token_name) LIKE ?1 ESCAPE '\\'
                OR LOWER(token_symbol) LIKE ?1 ESCAPE '\\'
                OR LOWER(acronym) LIKE ?1 ESCAPE '\\'
             ORDER BY id DESC"
        );
        self.query_tokens(&sql, params![pattern])
    }

    fn read_export(&self, path: &Path) -> Result<Vec<WalletTrackerEntry>, StoreError> {
        read_json(path)
    }
}

/// Makes `%` and `_` match literally under `ESCAPE '\'`
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<StoredToken> {
    let analysis_ts: i64 = row.get(6)?;
    let first_buy_ts: Option<i64> = row.get(7)?;
    let analysis_file: Option<String> = row.get(9)?;
    let axiom_file: Option<String> = row.get(10)?;

    Ok(StoredToken {
        id: row.get(0)?,
        token_address: row.get(1)?,
        token_name: row.get(2)?,
        token_symbol: row.get(3)?,
        acronym: row.get(4)?,
        wallets_found: row.get::<_, i64>(5)? as usize,
        analysis_timestamp: DateTime::<Utc>::from_timestamp(analysis_ts, 0).unwrap_or_default(),
        first_buy_timestamp: first_buy_ts.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        credits_used: row.get(8)?,
        analysis_file: analysis_file.map(PathBuf::from),
        axiom_file: axiom_file.map(PathBuf::from),
    })
}
