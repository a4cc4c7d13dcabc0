//! Simple REST API server example for the loan engine.
//!
//! Run with: `cargo run --example server`
//!
//! Authentication is out of scope: the caller's identity arrives in the
//! `x-user-id`, `x-user-role` and optional `x-user-name` headers, as a
//! fronting auth proxy would set them.
//!
//! ## Endpoints
//!
//! - `POST /loans/checkout` - Borrow a book (`{"book_id": 1, "days": 14}`)
//! - `POST /loans/{id}/return` - Return a loan (idempotent)
//! - `GET /loans?overdue=true` - List loans (own loans only for plain users)
//! - `GET /books?q=dune&available=true` - Search the catalog
//! - `POST /books` - Register a book (admin/librarian)
//!
//! ## Example Usage
//!
//! ```bash
//! # Register a book
//! curl -X POST http://localhost:3000/books \
//!   -H "x-user-id: 1" -H "x-user-role: librarian" \
//!   -H "Content-Type: application/json" \
//!   -d '{"title": "Dune", "author": "Frank Herbert", "isbn": "9780441013593", "total_copies": 2}'
//!
//! # Borrow it for a week
//! curl -X POST http://localhost:3000/loans/checkout \
//!   -H "x-user-id: 2" -H "x-user-role: user" \
//!   -H "Content-Type: application/json" \
//!   -d '{"book_id": 1, "days": 7}'
//!
//! # Return it
//! curl -X POST http://localhost:3000/loans/1/return -H "x-user-id: 2" -H "x-user-role: user"
//! ```

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use library_loans_rs::{
    BookId, BookQuery, BookSnapshot, Caller, EngineConfig, LoanEngine, LoanError, LoanId,
    LoanQuery, LoanSnapshot, NewBook, Role, UserId,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

// === Request/Response DTOs ===

/// Checkout request read from a JSON body.
///
/// ```json
/// {"book_id": 1, "days": 14}
/// ```
///
/// Both fields take integers or integer strings (`"7"`). `days` may be
/// omitted for the default period.
#[derive(Debug, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub book_id: BookId,
    pub days: Option<i64>,
}

impl CheckoutRequest {
    fn from_json(body: &Value) -> Result<Self, LoanError> {
        let book_id = body
            .get("book_id")
            .and_then(as_integer)
            .ok_or_else(|| LoanError::InvalidInput("book_id is required".into()))?;
        let days = body
            .get("days")
            .map(|days| {
                as_integer(days)
                    .ok_or_else(|| LoanError::InvalidInput("days must be positive integer".into()))
            })
            .transpose()?;
        Ok(CheckoutRequest {
            // Ids start at 1, so 0 stands in for any id no book can have.
            book_id: u32::try_from(book_id).map(BookId).unwrap_or(BookId(0)),
            days,
        })
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the loan engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LoanEngine>,
}

// === Identity ===

/// Caller identity taken from trusted proxy headers.
pub struct Identity(Caller);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };

        let id: u32 = header("x-user-id")
            .and_then(|v| v.parse().ok())
            .ok_or(AppError::Unauthenticated)?;
        let role: Role = match header("x-user-role") {
            Some(role) => role.parse()?,
            None => Role::User,
        };
        let username = header("x-user-name").unwrap_or_else(|| format!("user{id}"));

        Ok(Identity(Caller::new(UserId(id), username, role)))
    }
}

// === Error Handling ===

/// Wrapper for converting `LoanError` into HTTP responses.
pub enum AppError {
    Loan(LoanError),
    Unauthenticated,
}

impl From<LoanError> for AppError {
    fn from(err: LoanError) -> Self {
        AppError::Loan(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = match self {
            AppError::Loan(err) => err,
            AppError::Unauthenticated => {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse {
                        detail: "authentication credentials were not provided".to_string(),
                        code: "UNAUTHENTICATED".to_string(),
                    }),
                )
                    .into_response();
            }
        };

        let status = match &err {
            LoanError::BookNotFound | LoanError::LoanNotFound => StatusCode::NOT_FOUND,
            LoanError::NoCopiesAvailable
            | LoanError::DuplicateActiveLoan
            | LoanError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LoanError::Forbidden => StatusCode::FORBIDDEN,
            LoanError::DuplicateIsbn => StatusCode::CONFLICT,
            LoanError::InventoryCorruption(_) => {
                tracing::error!(error = %err, "inventory corruption");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(ErrorResponse {
                detail: err.to_string(),
                code: err.code().to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /loans/checkout - Borrow a book.
async fn checkout(
    State(state): State<AppState>,
    Identity(caller): Identity,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<LoanSnapshot>), AppError> {
    let Json(body) = body.map_err(|e| LoanError::InvalidInput(e.body_text()))?;
    let request = CheckoutRequest::from_json(&body)?;
    let loan = state.engine.checkout(&caller, request.book_id, request.days)?;
    Ok((StatusCode::CREATED, Json(loan.snapshot())))
}

/// POST /loans/{id}/return - Return a loan.
async fn return_loan(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(id): Path<u32>,
) -> Result<StatusCode, AppError> {
    state.engine.return_loan(&caller, LoanId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /loans - List loans visible to the caller.
async fn list_loans(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Query(query): Query<LoanQuery>,
) -> Json<Vec<LoanSnapshot>> {
    Json(state.engine.loans(&caller, query).collect())
}

/// GET /books - Search the catalog.
async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> Json<Vec<BookSnapshot>> {
    Json(state.engine.catalog().search(&query))
}

/// POST /books - Register a book.
async fn create_book(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Json(book): Json<NewBook>,
) -> Result<(StatusCode, Json<BookSnapshot>), AppError> {
    if !caller.role.is_elevated() {
        return Err(LoanError::Forbidden.into());
    }
    let book = state.engine.catalog().insert(book)?;
    Ok((StatusCode::CREATED, Json(book.snapshot())))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/loans", get(list_loans))
        .route("/loans/checkout", post(checkout))
        .route("/loans/{id}/return", post(return_loan))
        .route("/books", get(list_books).post(create_book))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    let config = EngineConfig::load(None).expect("invalid configuration");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let state = AppState {
        engine: Arc::new(LoanEngine::with_config(config).expect("invalid loan periods")),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    tracing::info!("Loan API server running on http://127.0.0.1:3000");

    axum::serve(listener, app).await.unwrap();
}
