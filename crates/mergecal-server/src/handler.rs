//! HTTP boundary: the `/api/aggregate` endpoint.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use mergecal_core::{NormalizedEvent, TimeWindow, format_utc};
use mergecal_feed::{Aggregator, FeedError, FeedErrorCode};

use crate::config::ServerConfig;

/// Cache policy advertised on successful responses. The edge may serve
/// a response for a minute and revalidate in the background for five.
const CACHE_CONTROL: &str = "s-maxage=60, stale-while-revalidate=300";

/// State shared by all requests.
pub struct AppState {
    aggregator: Aggregator,
    config: ServerConfig,
}

impl AppState {
    /// Creates the shared state.
    pub fn new(aggregator: Aggregator, config: ServerConfig) -> Self {
        Self { aggregator, config }
    }
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/aggregate", get(aggregate_handler))
        .with_state(state)
}

/// Query parameters of `/api/aggregate`. Both bounds are optional
/// RFC 3339 instants.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateQuery {
    /// Window start; defaults to now minus the configured lookback.
    pub time_min: Option<DateTime<Utc>>,
    /// Window end; defaults to now plus the configured lookahead.
    pub time_max: Option<DateTime<Utc>>,
}

/// The window a response covers, echoed back as wire strings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeBody {
    /// Window start.
    pub time_min: String,
    /// Window end.
    pub time_max: String,
}

/// Success envelope of `/api/aggregate`.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateBody {
    /// The effective query window.
    pub range: RangeBody,
    /// Number of events returned.
    pub count: usize,
    /// The merged, deduplicated, sorted events.
    pub events: Vec<NormalizedEvent>,
}

/// An error mapped to an HTTP status and JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    /// Returns the HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        let status = match err.code() {
            FeedErrorCode::FetchFailed
            | FeedErrorCode::NetworkError
            | FeedErrorCode::InvalidResponse => StatusCode::BAD_GATEWAY,
            FeedErrorCode::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            FeedErrorCode::ConfigurationError | FeedErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            code: err.code().as_str(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
            "code": self.code,
        });
        (self.status, Json(body)).into_response()
    }
}

async fn aggregate_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AggregateQuery>,
) -> Result<Response, ApiError> {
    let body = run_aggregate(&state, &query).await.inspect_err(|err| {
        warn!(status = %err.status, error = %err.message, "aggregate request failed");
    })?;

    let response = (
        StatusCode::OK,
        [(header::CACHE_CONTROL, CACHE_CONTROL)],
        Json(&body),
    )
        .into_response();
    Ok(response)
}

/// Resolves the query window and runs one aggregation.
///
/// # Errors
///
/// Returns a 400-mapped error for an inverted window and the mapped
/// pipeline error when aggregation fails.
pub async fn run_aggregate(
    state: &AppState,
    query: &AggregateQuery,
) -> Result<AggregateBody, ApiError> {
    let now = Utc::now();
    let time_min = query
        .time_min
        .unwrap_or_else(|| now - Duration::days(state.config.lookback_days));
    let time_max = query
        .time_max
        .unwrap_or_else(|| now + Duration::days(state.config.lookahead_days));

    if time_min > time_max {
        return Err(ApiError::bad_request("timeMin must not be after timeMax"));
    }
    let window = TimeWindow::new(time_min, time_max);

    let events = state
        .aggregator
        .aggregate(&state.config.sources, &window)
        .await?;

    info!(
        count = events.len(),
        time_min = %format_utc(time_min),
        time_max = %format_utc(time_max),
        "aggregate request served"
    );

    Ok(AggregateBody {
        range: RangeBody {
            time_min: format_utc(time_min),
            time_max: format_utc(time_max),
        },
        count: events.len(),
        events,
    })
}
