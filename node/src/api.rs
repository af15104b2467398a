//! # REST API
//!
//! Builds the axum router that exposes the registry over HTTP. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                       |
//! |--------|-------------------------------|-----------------------------------|
//! | GET    | `/health`                     | Liveness probe                    |
//! | GET    | `/status`                     | Chain height and pool sizes       |
//! | GET    | `/chain/verify`               | Full-chain integrity check        |
//! | GET    | `/stars/hash:{hash}`          | Block by hash                     |
//! | GET    | `/stars/address:{address}`    | All blocks registered by address  |
//! | GET    | `/block/:height`              | Block by height                   |
//! | POST   | `/requestValidation`          | Issue a validation challenge      |
//! | POST   | `/message-signature/validate` | Answer a challenge                |
//! | POST   | `/block`                      | Register a star                   |
//!
//! ## Failure bodies
//!
//! Client-side failures answer HTTP 200 with `{"status": false, "message"}`
//! (plus `"registerStar": false` on the validate endpoint), which is what
//! existing registry clients parse. Storage failures answer HTTP 500 with the
//! same shape and a generic message.

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use star_registry::registry::{messages, RegistryError, RegistryService, StarInput};
use star_registry::storage::db::SledStore;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone; everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The registry over the node's sled database.
    pub service: Arc<RegistryService<SledStore>>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Bring the chain height and pool size gauges up to date.
    pub fn refresh_gauges(&self) {
        match self.service.status() {
            Ok(status) => {
                let height = status.chain_height.map(|h| h as i64).unwrap_or(-1);
                self.metrics.chain_height.set(height);
                self.metrics.admission_pool_size.set(status.admitted as i64);
            }
            Err(e) => tracing::warn!(error = %e, "failed to refresh gauges"),
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/chain/verify", get(verify_handler))
        .route("/stars/:query", get(stars_handler))
        .route("/block/:height", get(block_by_height_handler))
        .route("/block", post(submit_handler))
        .route("/requestValidation", post(request_validation_handler))
        .route("/message-signature/validate", post(validate_handler))
        .fallback(fallback_handler)
        .layer(middleware::from_fn_with_state(state.clone(), track_latency))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_latency(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let response = next.run(req).await;
    state
        .metrics
        .request_latency_seconds
        .observe(started.elapsed().as_secs_f64());
    response
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// `{"status": false, "message": ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct FailureResponse {
    pub status: bool,
    pub message: String,
}

/// `GET /status` body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub version: String,
    pub chain_height: Option<u64>,
    pub blocks: u64,
    pub pending_requests: usize,
    pub admitted: usize,
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
struct AddressBody {
    address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SignatureBody {
    address: Option<String>,
    signature: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SubmitBody {
    address: Option<String>,
    star: Option<StarInput>,
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(FailureResponse {
            status: false,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Map a registry error onto the wire.
fn error_response(err: &RegistryError) -> Response {
    if err.is_internal() {
        tracing::error!(error = %err, "registry storage failure");
        return failure(StatusCode::INTERNAL_SERVER_ERROR, err.client_message());
    }
    if err.is_validation_failure() {
        return (
            StatusCode::OK,
            Json(json!({
                "registerStar": false,
                "status": false,
                "message": err.client_message(),
            })),
        )
            .into_response();
    }
    failure(StatusCode::OK, err.client_message())
}

fn invalid_body(rejection: JsonRejection) -> Response {
    tracing::debug!(error = %rejection, "rejected request body");
    failure(StatusCode::OK, messages::INVALID_REQUEST)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /status`: chain and pool counters.
async fn status_handler(State(state): State<AppState>) -> Response {
    match state.service.status() {
        Ok(status) => Json(StatusResponse {
            version: state.version.clone(),
            chain_height: status.chain_height,
            blocks: status.blocks,
            pending_requests: status.pending_requests,
            admitted: status.admitted,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /chain/verify`: walk the whole chain.
async fn verify_handler(State(state): State<AppState>) -> Response {
    match state.service.verify_chain() {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /stars/hash:{hash}` and `GET /stars/address:{address}`.
async fn stars_handler(Path(query): Path<String>, State(state): State<AppState>) -> Response {
    if let Some(hash) = query.strip_prefix("hash:") {
        return match state.service.lookup_by_hash(hash) {
            Ok(block) => Json(block).into_response(),
            Err(e) => error_response(&e),
        };
    }
    if let Some(address) = query.strip_prefix("address:") {
        return match state.service.lookup_by_address(address) {
            Ok(blocks) => Json(blocks).into_response(),
            Err(e) => error_response(&e),
        };
    }
    failure(StatusCode::OK, messages::BAD_REQUEST)
}

/// `GET /block/:height`: a non-numeric height is simply not found.
async fn block_by_height_handler(
    Path(height): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let Ok(parsed) = height.parse::<u64>() else {
        return failure(StatusCode::OK, messages::height_not_found(&height));
    };
    match state.service.lookup_by_height(parsed) {
        Ok(block) => Json(block).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /requestValidation`: `{address}`.
async fn request_validation_handler(
    State(state): State<AppState>,
    body: Result<Json<AddressBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid_body(rejection),
    };
    let address = body.address.unwrap_or_default();
    match state.service.request_validation(&address) {
        Ok(response) => {
            state.metrics.validation_requests_total.inc();
            Json(response).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// `POST /message-signature/validate`: `{address, signature}`.
async fn validate_handler(
    State(state): State<AppState>,
    body: Result<Json<SignatureBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid_body(rejection),
    };
    let address = body.address.unwrap_or_default();
    let signature = body.signature.unwrap_or_default();

    match state.service.validate_signature(&address, &signature) {
        Ok(status) => {
            state.metrics.signatures_verified_total.inc();
            state.refresh_gauges();
            Json(json!({ "registerStar": true, "status": status })).into_response()
        }
        Err(e) => {
            if e.is_validation_failure() {
                state.metrics.signatures_rejected_total.inc();
            }
            error_response(&e)
        }
    }
}

/// `POST /block`: `{address, star}`.
async fn submit_handler(
    State(state): State<AppState>,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid_body(rejection),
    };
    let address = body.address.unwrap_or_default();
    let star = body.star.unwrap_or_default();

    match state.service.submit_entry(&address, star) {
        Ok(block) => {
            state.metrics.stars_registered_total.inc();
            state.refresh_gauges();
            Json(block).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Anything unrouted.
async fn fallback_handler() -> Response {
    failure(StatusCode::OK, messages::BAD_REQUEST)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
