//! Appointment CRUD and booking endpoints.
//!
//! The mutating handlers here are the write path of the realtime core:
//! after a store write commits they publish a targeted event through the
//! broadcast hub and report the change to the change feed.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::AsyncConnection;
use scoped_futures::ScopedFutureExt;
use serde::Deserialize;
use serde_json::Value;

use clinic_common::id::{prefix, prefixed_ulid};
use clinic_common::protocol::{ChangeOp, ServerEvent};

use crate::auth::middleware::AuthAdmin;
use crate::db::schema::appointments;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::gateway::changes::APPOINTMENTS_TABLE;
use crate::models::appointment::{Appointment, NewAppointment, UpdateAppointment};
use crate::AppState;

/// Demo amount (minor units) attached to simulated payments.
const DEMO_AMOUNT: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/appointments",
            post(create_appointment).get(list_appointments),
        )
        .route("/appointments/slots", get(booked_slots))
        .route("/appointments/book", post(book_appointment))
        .route(
            "/appointments/{id}",
            get(get_appointment).patch(update_appointment),
        )
        .route("/appointments/{id}/status", patch(update_status))
}

/// Attach simulated external-provider fields to an appointment payload.
fn demo_enrich(state: &AppState, payload: &mut Value) {
    if let Some(obj) = payload.as_object_mut() {
        if !obj.contains_key("payment_id") {
            obj.insert(
                "payment_id".to_string(),
                Value::String(state.provider.issue_reference("demo_pay")),
            );
        }
        obj.entry("amount").or_insert(Value::from(DEMO_AMOUNT));
        obj.insert(
            "notifications".to_string(),
            serde_json::json!({ "email": "simulated", "whatsapp": "simulated" }),
        );
    }
}

fn to_payload(appointment: &Appointment) -> Result<Value, ApiError> {
    serde_json::to_value(appointment).map_err(|err| {
        tracing::error!(?err, "failed to serialize appointment");
        ApiError::internal("serialization")
    })
}

// ---------------------------------------------------------------------------
// POST /api/appointments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub reason: Option<String>,
    pub consultation_type: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/appointments",
    tag = "Appointments",
    request_body = CreateAppointmentRequest,
    responses(
        (status = 201, description = "Appointment created"),
        (status = 400, description = "Missing required fields", body = ApiErrorBody),
    ),
)]
pub async fn create_appointment(
    State(state): State<AppState>,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut errors = Vec::new();
    for (field, value) in [
        ("name", &body.name),
        ("email", &body.email),
        ("appointmentDate", &body.appointment_date),
    ] {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            errors.push(FieldError {
                field: field.to_string(),
                message: format!("{field} is required"),
            });
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let name = body.name.as_deref().unwrap_or_default().trim();
    let email = body.email.as_deref().unwrap_or_default().trim();
    // The booking form may submit a full ISO timestamp; keep the date part.
    let date = body
        .appointment_date
        .as_deref()
        .unwrap_or_default()
        .split('T')
        .next()
        .unwrap_or_default()
        .to_string();

    let id = prefixed_ulid(prefix::APPOINTMENT);
    let now = Utc::now();

    let mut conn = state.db.get().await?;
    let appointment: Appointment = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(appointments::table)
            .values(NewAppointment {
                id: &id,
                patient_name: name,
                patient_email: email,
                patient_phone: body.phone.as_deref(),
                date: &date,
                time: body.appointment_time.as_deref().unwrap_or("10:00"),
                reason: body.reason.as_deref().unwrap_or("General consultation"),
                kind: body.consultation_type.as_deref().unwrap_or("in-person"),
                status: "pending",
                payment_status: "pending",
                created_at: now,
                updated_at: now,
            })
            .returning(Appointment::as_returning()),
        &mut conn,
    )
    .await?;

    let mut payload = to_payload(&appointment)?;
    if state.config.demo_mode {
        demo_enrich(&state, &mut payload);
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("demo_mode".to_string(), Value::Bool(true));
            obj.insert(
                "message".to_string(),
                Value::String(
                    "Appointment created. Payment and notifications will be simulated."
                        .to_string(),
                ),
            );
        }
    }

    state.hub.publish(&ServerEvent::AppointmentCreated {
        appointment: payload.clone(),
    });
    state.changes.notify(APPOINTMENTS_TABLE, ChangeOp::Insert);

    Ok((StatusCode::CREATED, Json(payload)))
}

// ---------------------------------------------------------------------------
// GET /api/appointments
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/appointments",
    tag = "Appointments",
    responses(
        (status = 200, description = "All appointments, newest first"),
        (status = 401, description = "Missing or invalid token"),
    ),
)]
pub async fn list_appointments(
    _admin: AuthAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let rows = crate::models::appointment::list_newest_first(&state.db).await?;

    let mut data = Vec::with_capacity(rows.len());
    for appointment in &rows {
        let mut payload = to_payload(appointment)?;
        if state.config.demo_mode {
            demo_enrich(&state, &mut payload);
        }
        data.push(payload);
    }

    Ok(Json(data))
}

// ---------------------------------------------------------------------------
// GET /api/appointments/slots
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SlotsParams {
    pub date: Option<String>,
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct BookedSlot {
    pub date: String,
    pub time: String,
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookedSlotsResponse {
    pub booked_slots: Vec<BookedSlot>,
}

#[utoipa::path(
    get,
    path = "/api/appointments/slots",
    tag = "Appointments",
    params(("date" = String, Query, description = "Day to check, YYYY-MM-DD")),
    responses(
        (status = 200, description = "Confirmed slots for the date", body = BookedSlotsResponse),
        (status = 400, description = "Missing date", body = ApiErrorBody),
    ),
)]
pub async fn booked_slots(
    State(state): State<AppState>,
    Query(params): Query<SlotsParams>,
) -> Result<Json<BookedSlotsResponse>, ApiError> {
    let date = params
        .date
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::bad_request("Date is required"))?;

    let mut conn = state.db.get().await?;
    let rows: Vec<(String, String)> = diesel_async::RunQueryDsl::load(
        appointments::table
            .filter(appointments::date.eq(&date))
            .filter(appointments::status.eq("confirmed"))
            .select((appointments::date, appointments::time)),
        &mut conn,
    )
    .await?;

    Ok(Json(BookedSlotsResponse {
        booked_slots: rows
            .into_iter()
            .map(|(date, time)| BookedSlot { date, time })
            .collect(),
    }))
}

// ---------------------------------------------------------------------------
// POST /api/appointments/book
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BookAppointmentRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date: String,
    pub time: String,
    pub reason: String,
}

#[utoipa::path(
    post,
    path = "/api/appointments/book",
    tag = "Appointments",
    request_body = BookAppointmentRequest,
    responses(
        (status = 201, description = "Slot booked"),
        (status = 400, description = "Missing fields", body = ApiErrorBody),
        (status = 409, description = "Slot already booked", body = ApiErrorBody),
    ),
)]
pub async fn book_appointment(
    State(state): State<AppState>,
    Json(body): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut errors = Vec::new();
    for (field, value) in [
        ("name", &body.name),
        ("email", &body.email),
        ("phone", &body.phone),
        ("date", &body.date),
        ("time", &body.time),
        ("reason", &body.reason),
    ] {
        if value.trim().is_empty() {
            errors.push(FieldError {
                field: field.to_string(),
                message: format!("{field} is required"),
            });
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let id = prefixed_ulid(prefix::APPOINTMENT);
    let now = Utc::now();

    let mut conn = state.db.get().await?;

    // Collision check and insert must see the same snapshot, otherwise two
    // bookings for the same slot can race past each other.
    let appointment: Appointment = conn
        .transaction::<Appointment, ApiError, _>(|conn| {
            let body = &body;
            let id = &id;
            async move {
                let taken: Option<String> = diesel_async::RunQueryDsl::get_result(
                    appointments::table
                        .filter(appointments::date.eq(&body.date))
                        .filter(appointments::time.eq(&body.time))
                        .filter(appointments::status.eq("confirmed"))
                        .select(appointments::id),
                    conn,
                )
                .await
                .optional()?;

                if taken.is_some() {
                    return Err(ApiError::conflict("This slot is already booked"));
                }

                let appointment: Appointment = diesel_async::RunQueryDsl::get_result(
                    diesel::insert_into(appointments::table)
                        .values(NewAppointment {
                            id: &id,
                            patient_name: &body.name,
                            patient_email: &body.email,
                            patient_phone: Some(&body.phone),
                            date: &body.date,
                            time: &body.time,
                            reason: &body.reason,
                            kind: "in-person",
                            status: "confirmed",
                            payment_status: "pending",
                            created_at: now,
                            updated_at: now,
                        })
                        .returning(Appointment::as_returning()),
                    conn,
                )
                .await?;

                Ok(appointment)
            }
            .scope_boxed()
        })
        .await?;

    let mut payload = to_payload(&appointment)?;

    state.hub.publish(&ServerEvent::NewAppointment {
        data: payload.clone(),
    });
    state.changes.notify(APPOINTMENTS_TABLE, ChangeOp::Insert);

    if state.config.demo_mode {
        demo_enrich(&state, &mut payload);
    }

    Ok((StatusCode::CREATED, Json(payload)))
}

// ---------------------------------------------------------------------------
// GET /api/appointments/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/appointments/{id}",
    tag = "Appointments",
    responses(
        (status = 200, description = "The appointment"),
        (status = 404, description = "Unknown appointment", body = ApiErrorBody),
    ),
)]
pub async fn get_appointment(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut conn = state.db.get().await?;
    let appointment: Appointment = diesel_async::RunQueryDsl::get_result(
        appointments::table
            .find(&id)
            .select(Appointment::as_select()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    let mut payload = to_payload(&appointment)?;
    if state.config.demo_mode {
        demo_enrich(&state, &mut payload);
    }

    Ok(Json(payload))
}

// ---------------------------------------------------------------------------
// PATCH /api/appointments/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateAppointmentRequest {
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub reason: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

#[utoipa::path(
    patch,
    path = "/api/appointments/{id}",
    tag = "Appointments",
    request_body = UpdateAppointmentRequest,
    responses(
        (status = 200, description = "Updated appointment"),
        (status = 404, description = "Unknown appointment", body = ApiErrorBody),
    ),
)]
pub async fn update_appointment(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, ApiError> {
    let changeset = UpdateAppointment {
        patient_name: body.patient_name,
        patient_email: body.patient_email,
        patient_phone: body.patient_phone,
        date: body.date,
        time: body.time,
        reason: body.reason,
        kind: body.kind,
        status: body.status,
        payment_status: body.payment_status,
        updated_at: Some(Utc::now()),
    };

    let mut conn = state.db.get().await?;
    let appointment: Appointment = diesel_async::RunQueryDsl::get_result(
        diesel::update(appointments::table.find(&id))
            .set(&changeset)
            .returning(Appointment::as_returning()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    state.changes.notify(APPOINTMENTS_TABLE, ChangeOp::Update);

    let mut payload = to_payload(&appointment)?;
    if state.config.demo_mode && appointment.kind == "video" {
        if let Some(obj) = payload.as_object_mut() {
            obj.insert(
                "video_link".to_string(),
                Value::String(state.provider.issue_reference("demo_meeting")),
            );
            obj.insert(
                "notifications".to_string(),
                serde_json::json!({ "email": "simulated", "whatsapp": "simulated" }),
            );
        }
    }

    Ok(Json(payload))
}

// ---------------------------------------------------------------------------
// PATCH /api/appointments/{id}/status
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[utoipa::path(
    patch,
    path = "/api/appointments/{id}/status",
    tag = "Appointments",
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated appointment"),
        (status = 404, description = "Unknown appointment", body = ApiErrorBody),
    ),
)]
pub async fn update_status(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut conn = state.db.get().await?;
    let appointment: Appointment = diesel_async::RunQueryDsl::get_result(
        diesel::update(appointments::table.find(&id))
            .set((
                appointments::status.eq(&body.status),
                appointments::updated_at.eq(Utc::now()),
            ))
            .returning(Appointment::as_returning()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    let mut payload = to_payload(&appointment)?;

    state.hub.publish(&ServerEvent::AppointmentUpdate {
        appointment: payload.clone(),
    });
    state.changes.notify(APPOINTMENTS_TABLE, ChangeOp::Update);

    if state.config.demo_mode {
        demo_enrich(&state, &mut payload);
    }

    Ok(Json(payload))
}
