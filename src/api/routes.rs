//! HTTP route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ServiceState>`.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use crate::catalog::{CatalogReader, MatchFilter};
use crate::engine::placement::BetService;
use crate::error::{Rejection, ServiceError, ValidationError};
use crate::types::{Match, MatchStatus, TicketRequest};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ServiceState {
    pub catalog: CatalogReader,
    pub bets: BetService,
}

pub type AppState = Arc<ServiceState>;

// ---------------------------------------------------------------------------
// Error responses
// ---------------------------------------------------------------------------

/// A `ServiceError` on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Rejected(Rejection::MatchNotFound { .. }) => StatusCode::NOT_FOUND,
            ServiceError::Rejected(Rejection::DuplicateBet { .. }) => StatusCode::CONFLICT,
            ServiceError::Rejected(Rejection::IdempotencyKeyReused { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::Rejected(_) => StatusCode::BAD_REQUEST,
            ServiceError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            ServiceError::Fatal(detail) => {
                error!(detail = %detail, "Internal error");
                "An internal server error occurred.".to_string()
            }
            ServiceError::Transient(detail) => {
                warn!(detail = %detail, "Transient failure");
                "Service temporarily unavailable, please retry.".to_string()
            }
            other => other.to_string(),
        };
        let body = json!({
            "success": false,
            "error": {
                "code": self.0.code(),
                "message": message,
                "retryable": self.0.is_retryable(),
            }
        });
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct MatchesResponse {
    pub success: bool,
    pub matches: Vec<Match>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetResponse {
    pub success: bool,
    pub message: &'static str,
    pub bet_id: String,
    pub replayed: bool,
}

// ---------------------------------------------------------------------------
// Query parsing
// ---------------------------------------------------------------------------

/// Raw `/matches` query string. Everything arrives as text so malformed
/// values surface as our own validation errors.
#[derive(Debug, Default, Deserialize)]
pub struct MatchQuery {
    pub status: Option<String>,
    pub sport: Option<String>,
    pub league: Option<String>,
    pub limit: Option<String>,
}

impl MatchQuery {
    pub fn into_filter(self) -> Result<MatchFilter, ValidationError> {
        let status = non_empty(self.status)
            .map(|s| s.parse::<MatchStatus>())
            .transpose()?;
        let sport = non_empty(self.sport);
        let league = non_empty(self.league);
        if status.is_none() && sport.is_some() != league.is_some() {
            return Err(ValidationError::InvalidFilter(
                "sport and league must be given together".into(),
            ));
        }
        let limit = match non_empty(self.limit) {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(ValidationError::InvalidFilter(format!(
                        "limit must be a positive integer, got '{raw}'"
                    )))
                }
            },
            None => None,
        };
        Ok(MatchFilter {
            status,
            sport,
            league,
            limit,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /matches
pub async fn list_matches(
    State(state): State<AppState>,
    Query(query): Query<MatchQuery>,
) -> Result<Json<MatchesResponse>, ApiError> {
    let filter = query.into_filter()?;
    let matches = state.catalog.list_bettable_matches(&filter, Utc::now()).await?;
    Ok(Json(MatchesResponse {
        success: true,
        matches,
    }))
}

/// POST /bets
pub async fn place_bet(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TicketRequest>, JsonRejection>,
) -> Result<Json<PlaceBetResponse>, ApiError> {
    let user_id = header_value(&headers, USER_ID_HEADER).ok_or(ValidationError::MissingIdentity)?;
    let Json(ticket) = body.map_err(|e| ValidationError::InvalidBody(e.body_text()))?;
    let idempotency_key = header_value(&headers, IDEMPOTENCY_KEY_HEADER);

    let receipt = state
        .bets
        .place_bet(&user_id, ticket, idempotency_key.as_deref(), Utc::now())
        .await?;

    Ok(Json(PlaceBetResponse {
        success: true,
        message: "Bet placed successfully!",
        bet_id: receipt.bet_id,
        replayed: receipt.replayed,
    }))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
