//! Payment endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use serde::Deserialize;
use utoipa::ToSchema;

use clinic_common::id::{prefix, prefixed_ulid};
use clinic_common::protocol::ServerEvent;

use crate::auth::middleware::AuthAdmin;
use crate::db::schema::payments;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::payment::{NewPayment, Payment};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments", post(create_payment).get(list_payments))
        .route("/payments/{id}", get(get_payment))
        .route("/payments/{id}/status", patch(update_payment_status))
}

fn publish_payment(state: &AppState, payment: &Payment, updated: bool) {
    match serde_json::to_value(payment) {
        Ok(payload) => {
            let event = if updated {
                ServerEvent::PaymentUpdated { payment: payload }
            } else {
                ServerEvent::NewPayment { payment: payload }
            };
            state.hub.publish(&event);
        }
        Err(err) => tracing::error!(?err, "failed to serialize payment for broadcast"),
    }
}

// ---------------------------------------------------------------------------
// GET /api/payments
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/payments",
    tag = "Payments",
    responses(
        (status = 200, description = "All payments, newest first"),
        (status = 401, description = "Missing or invalid token"),
    ),
)]
pub async fn list_payments(
    _admin: AuthAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let mut conn = state.db.get().await?;
    let rows: Vec<Payment> = diesel_async::RunQueryDsl::load(
        payments::table
            .order(payments::created_at.desc())
            .select(Payment::as_select()),
        &mut conn,
    )
    .await?;

    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// GET /api/payments/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    tag = "Payments",
    responses(
        (status = 200, description = "The payment", body = Payment),
        (status = 404, description = "Unknown payment", body = ApiErrorBody),
    ),
)]
pub async fn get_payment(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    let mut conn = state.db.get().await?;
    let payment: Payment = diesel_async::RunQueryDsl::get_result(
        payments::table.find(&id).select(Payment::as_select()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Payment not found"))?;

    Ok(Json(payment))
}

// ---------------------------------------------------------------------------
// POST /api/payments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub amount: i64,
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
    pub payment_method: String,
    pub status: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/payments",
    tag = "Payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = Payment),
        (status = 401, description = "Missing or invalid token"),
    ),
)]
pub async fn create_payment(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    let id = prefixed_ulid(prefix::PAYMENT);
    let reference = state.provider.issue_reference("pay_ref");
    let now = Utc::now();

    let mut conn = state.db.get().await?;
    let payment: Payment = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(payments::table)
            .values(NewPayment {
                id: &id,
                appointment_id: body.appointment_id.as_deref(),
                patient_id: body.patient_id.as_deref(),
                amount: body.amount,
                method: &body.payment_method,
                status: body.status.as_deref().unwrap_or("pending"),
                reference: Some(&reference),
                created_at: now,
                updated_at: now,
            })
            .returning(Payment::as_returning()),
        &mut conn,
    )
    .await?;

    publish_payment(&state, &payment, false);

    Ok((StatusCode::CREATED, Json(payment)))
}

// ---------------------------------------------------------------------------
// PATCH /api/payments/{id}/status
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusRequest {
    pub status: String,
}

#[utoipa::path(
    patch,
    path = "/api/payments/{id}/status",
    tag = "Payments",
    request_body = UpdatePaymentStatusRequest,
    responses(
        (status = 200, description = "Updated payment", body = Payment),
        (status = 404, description = "Unknown payment", body = ApiErrorBody),
    ),
)]
pub async fn update_payment_status(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<Payment>, ApiError> {
    let mut conn = state.db.get().await?;
    let payment: Payment = diesel_async::RunQueryDsl::get_result(
        diesel::update(payments::table.find(&id))
            .set((
                payments::status.eq(&body.status),
                payments::updated_at.eq(Utc::now()),
            ))
            .returning(Payment::as_returning()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Payment not found"))?;

    publish_payment(&state, &payment, true);

    Ok(Json(payment))
}
