//! Cart process endpoints.
//!
//! Each route decodes its body into a typed signal before it reaches the
//! runtime, so a malformed request is rejected here with 400 and never
//! touches the process.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use cart::{CartId, CartSignal, CartState, EmailPayload, ItemPayload};
use serde::Serialize;
use workflow::{CartRuntime, ProcessSnapshot};

use crate::error::ApiError;

// -- Response types --

#[derive(Serialize)]
pub struct CartCreatedResponse {
    pub cart: CartState,
    #[serde(rename = "workflowID")]
    pub workflow_id: CartId,
}

#[derive(Serialize)]
pub struct SignalResponse {
    pub ok: u8,
}

impl SignalResponse {
    fn ok() -> Json<Self> {
        Json(Self { ok: 1 })
    }
}

// -- Handlers --

/// POST /cart: starts a process for a fresh, empty cart.
#[tracing::instrument(skip(runtime))]
pub async fn create(
    State(runtime): State<CartRuntime>,
) -> Result<(StatusCode, Json<CartCreatedResponse>), ApiError> {
    let handle = runtime.start(CartId::generate()).await?;

    Ok((
        StatusCode::CREATED,
        Json(CartCreatedResponse {
            cart: handle.state(),
            workflow_id: handle.cart_id().clone(),
        }),
    ))
}

/// GET /cart/{id}
pub async fn get(
    State(runtime): State<CartRuntime>,
    Path(id): Path<String>,
) -> Result<Json<CartState>, ApiError> {
    Ok(Json(runtime.query(&CartId::new(id)).await?))
}

/// GET /cart/{id}/status: the cart plus its lifecycle and checkout details.
pub async fn status(
    State(runtime): State<CartRuntime>,
    Path(id): Path<String>,
) -> Result<Json<ProcessSnapshot>, ApiError> {
    Ok(Json(runtime.status(&CartId::new(id)).await?))
}

/// PUT /cart/{id}/add
#[tracing::instrument(skip(runtime, body))]
pub async fn add(
    State(runtime): State<CartRuntime>,
    Path(id): Path<String>,
    body: Result<Json<ItemPayload>, JsonRejection>,
) -> Result<Json<SignalResponse>, ApiError> {
    let Json(item) = body?;
    send(&runtime, id, CartSignal::AddItem(item)).await
}

/// PUT /cart/{id}/remove
#[tracing::instrument(skip(runtime, body))]
pub async fn remove(
    State(runtime): State<CartRuntime>,
    Path(id): Path<String>,
    body: Result<Json<ItemPayload>, JsonRejection>,
) -> Result<Json<SignalResponse>, ApiError> {
    let Json(item) = body?;
    send(&runtime, id, CartSignal::RemoveItem(item)).await
}

/// PUT /cart/{id}/email
#[tracing::instrument(skip(runtime, body))]
pub async fn email(
    State(runtime): State<CartRuntime>,
    Path(id): Path<String>,
    body: Result<Json<EmailPayload>, JsonRejection>,
) -> Result<Json<SignalResponse>, ApiError> {
    let Json(payload) = body?;
    send(&runtime, id, CartSignal::UpdateEmail(payload)).await
}

/// PUT /cart/{id}/checkout
///
/// Answers once the checkout is recorded. The charge outcome shows up later
/// in `GET /cart/{id}/status`.
#[tracing::instrument(skip(runtime, body))]
pub async fn checkout(
    State(runtime): State<CartRuntime>,
    Path(id): Path<String>,
    body: Result<Json<EmailPayload>, JsonRejection>,
) -> Result<Json<SignalResponse>, ApiError> {
    let Json(payload) = body?;
    send(&runtime, id, CartSignal::Checkout(payload)).await
}

async fn send(
    runtime: &CartRuntime,
    id: String,
    signal: CartSignal,
) -> Result<Json<SignalResponse>, ApiError> {
    let ack = runtime.signal(&CartId::new(id), signal).await?;
    if !ack.is_applied() {
        tracing::debug!(sequence = %ack.sequence, "signal acknowledged but ignored");
    }
    Ok(SignalResponse::ok())
}

/// Fallback for unknown paths.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Endpoint not found".to_string())
}
