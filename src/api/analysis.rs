//! Analysis job routes

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::jobs::{AnalysisJob, JobListing, SubmitReceipt, SubmitRequest};

const DEFAULT_LIST_LIMIT: usize = 100;

/// Client-side analysis settings, as the dashboard sends them
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    pub min_usd_filter: Option<f64>,
    pub transaction_limit: Option<usize>,
    pub wallet_count: Option<usize>,
    pub max_credits_per_analysis: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeTokenRequest {
    pub address: String,
    #[serde(default)]
    pub min_usd: Option<f64>,
    #[serde(default)]
    pub time_window_hours: Option<u32>,
    #[serde(default)]
    pub api_settings: Option<ApiSettings>,
}

impl AnalyzeTokenRequest {
    /// An explicit `min_usd` wins over the settings block
    pub fn submit_request(&self) -> SubmitRequest {
        let settings = self.api_settings.clone().unwrap_or_default();
        SubmitRequest {
            min_usd: self.min_usd.or(settings.min_usd_filter),
            time_window_hours: self.time_window_hours,
            transaction_limit: settings.transaction_limit,
            max_wallets: settings.wallet_count,
            max_credits: settings.max_credits_per_analysis,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub limit: Option<usize>,
}

pub async fn analyze_token(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeTokenRequest>,
) -> Result<(StatusCode, Json<SubmitReceipt>), ApiError> {
    let receipt = state
        .orchestrator
        .submit(&body.address, body.submit_request())?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<AnalysisJob>, ApiError> {
    Ok(Json(state.orchestrator.status(&job_id)?))
}

pub async fn list_analyses(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<JobListing>, ApiError> {
    let listing = state
        .orchestrator
        .list(query.search.as_deref(), query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(listing))
}

pub async fn export_csv(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let export = state.orchestrator.csv_export(&job_id)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&export.filename)),
        ],
        export.body,
    )
        .into_response())
}

pub async fn export_wallet_tracker(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let export = state.orchestrator.wallet_tracker_export(&job_id).await?;
    Ok((
        [(header::CONTENT_DISPOSITION, attachment(&export.filename))],
        Json(export.entries),
    )
        .into_response())
}

fn attachment(filename: &str) -> String {
    format!("attachment; filename={}", filename)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::test_support;
    use crate::jobs::fakes::{buy_tx, wallet, FakeLedger, MINT, T0};
    use crate::jobs::JobStatus;

    fn request(json: serde_json::Value) -> AnalyzeTokenRequest {
        serde_json::from_value(json).unwrap()
    }

    async fn wait_completed(state: &AppState, job_id: &str) -> AnalysisJob {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let Json(job) = get_analysis(State(state.clone()), Path(job_id.to_string()))
                    .await
                    .unwrap();
                if job.status.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not finish")
    }

    #[test]
    fn test_settings_block_is_camel_case() {
        let req = request(serde_json::json!({
            "address": MINT,
            "time_window_hours": 6,
            "api_settings": {
                "minUsdFilter": 120.0,
                "transactionLimit": 200,
                "walletCount": 25,
                "maxCreditsPerAnalysis": 300
            }
        }));
        let submit = req.submit_request();
        assert_eq!(submit.min_usd, Some(120.0));
        assert_eq!(submit.time_window_hours, Some(6));
        assert_eq!(submit.transaction_limit, Some(200));
        assert_eq!(submit.max_wallets, Some(25));
        assert_eq!(submit.max_credits, Some(300));
    }

    #[test]
    fn test_explicit_min_usd_wins() {
        let req = request(serde_json::json!({
            "address": MINT,
            "min_usd": 75.0,
            "api_settings": { "minUsdFilter": 120.0 }
        }));
        assert_eq!(req.submit_request().min_usd, Some(75.0));

        let bare = request(serde_json::json!({ "address": MINT }));
        assert_eq!(bare.submit_request(), SubmitRequest::default());
    }

    #[tokio::test]
    async fn test_submit_then_download_csv() {
        let ledger = FakeLedger::with_history(
            "Wrapped SOL",
            "WSOL",
            vec![buy_tx("s1", T0, &wallet(1), 1_000_000_000)],
        );
        let state = test_support::state(ledger);

        let (status, Json(receipt)) = analyze_token(
            State(state.clone()),
            Json(request(serde_json::json!({ "address": MINT }))),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(receipt.api_settings.min_usd, 50.0);

        let job = wait_completed(&state, &receipt.job_id).await;
        assert_eq!(job.status, JobStatus::Completed);

        let response = export_csv(State(state.clone()), Path(receipt.job_id.clone()))
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            format!("attachment; filename=token_analysis_{}.csv", receipt.job_id).as_str()
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.starts_with("Wallet Address,First Buy Time"));
        assert!(body.contains(&wallet(1)));

        let response = export_wallet_tracker(State(state.clone()), Path(receipt.job_id))
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=1.json"
        );
    }

    #[tokio::test]
    async fn test_invalid_address_is_bad_request() {
        let state = test_support::state(FakeLedger::default());
        let result = analyze_token(
            State(state),
            Json(request(serde_json::json!({ "address": "0OIl" }))),
        )
        .await;
        let Err(err) = result else {
            panic!("invalid address was accepted");
        };
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_listing_defaults() {
        let state = test_support::state(FakeLedger::default());
        let Json(listing) = list_analyses(
            State(state),
            Query(ListQuery {
                search: None,
                limit: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(listing.total, 0);
        assert!(listing.jobs.is_empty());
    }

    #[tokio::test]
    async fn test_csv_before_completion() {
        let state = test_support::state(FakeLedger::default());
        let result = export_csv(State(state), Path("nope1234".to_string())).await;
        let Err(err) = result else {
            panic!("export for unknown job succeeded");
        };
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
