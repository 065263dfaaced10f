//! API Server Module
//!
//! This module implements the REST boundary of the balance tracker:
//! - `POST /api/bankaccount/v1/transactions`: validate, then record a credit or debit
//! - `GET /api/bankaccount/v1/balance`: current balance of the account
//!
//! Every failure is answered with an `ErrorResponse` JSON body.

use crate::{
    BalanceResponse, Config, Error, Transaction, ValidationError, service::AccountService,
    validation::Validator,
};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared application state that is accessible across all request handlers
#[derive(Clone)]
pub struct AppState {
    validator: Arc<Validator>,
    service: AccountService,
}

impl AppState {
    pub fn new(validator: Validator, service: AccountService) -> Self {
        Self {
            validator: Arc::new(validator),
            service,
        }
    }
}

/// The main API server struct
pub struct Server {
    addr: String,
    state: AppState,
}

impl Server {
    /// Creates a new API server instance
    ///
    /// # Arguments
    /// * `config` - Supplies the bind address and the validation bounds
    /// * `service` - Ledger-backed account service
    pub fn new(config: &Config, service: AccountService) -> Self {
        Self {
            addr: format!("{}:{}", config.api.host, config.api.port),
            state: AppState::new(Validator::from_config(config), service),
        }
    }

    /// Serve requests until `shutdown` resolves
    ///
    /// In-flight requests finish before this returns.
    pub async fn start<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state);

        info!("API server listening on {}", self.addr);
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

/// Routes under `/api/bankaccount/v1`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/bankaccount/v1/transactions", post(add_transaction))
        .route("/api/bankaccount/v1/balance", get(get_balance))
        .with_state(state)
}

/// Error body returned for every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub message: String,
}

/// Failures a handler can answer with
#[derive(Debug)]
enum ApiError {
    /// Body missing, not JSON, or missing fields
    BadRequest(String),
    Invalid(ValidationError),
    Service(Error),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Invalid(e)
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Service(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Invalid(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Service(e @ Error::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::Service(e @ Error::DuplicateTransaction(_)) => {
                (StatusCode::CONFLICT, e.to_string())
            }
            ApiError::Service(e) => {
                error!("Unhandled error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            timestamp: Utc::now(),
            status: status.as_u16(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Add a credit or debit to the account
///
/// # Returns
/// `201 Created` with an empty body once the ledger has applied it
async fn add_transaction(
    State(state): State<AppState>,
    payload: Result<Json<Transaction>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(tx) = payload.map_err(|e| {
        warn!("Rejected transaction body: {}", e.body_text());
        ApiError::BadRequest(e.body_text())
    })?;

    info!(
        "Received Transaction : transaction Id = {}, amount = {}",
        tx.transaction_id, tx.amount
    );

    if let Err(e) = state.validator.validate(&tx) {
        warn!("Transaction {} rejected: {}", tx.transaction_id, e);
        return Err(e.into());
    }

    state.service.record(&tx).await?;
    Ok(StatusCode::CREATED)
}

async fn get_balance(State(state): State<AppState>) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.service.balance().await?;
    Ok(Json(BalanceResponse { balance }))
}
