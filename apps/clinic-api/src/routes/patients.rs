//! Patient endpoints.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use clinic_common::protocol::ServerEvent;

use crate::auth::middleware::AuthAdmin;
use crate::db::schema::patients;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::patient::{Patient, UpdatePatient};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", get(list_patients))
        .route("/patients/{id}", get(get_patient).patch(update_patient))
}

// ---------------------------------------------------------------------------
// GET /api/patients
// ---------------------------------------------------------------------------

/// List entry with the joined display name the dashboard table renders.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/api/patients",
    tag = "Patients",
    responses(
        (status = 200, description = "All patients, newest first"),
        (status = 401, description = "Missing or invalid token"),
    ),
)]
pub async fn list_patients(
    _admin: AuthAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<PatientSummary>>, ApiError> {
    let mut conn = state.db.get().await?;
    let rows: Vec<Patient> = diesel_async::RunQueryDsl::load(
        patients::table
            .order(patients::created_at.desc())
            .select(Patient::as_select()),
        &mut conn,
    )
    .await?;

    let data = rows
        .into_iter()
        .map(|p| PatientSummary {
            name: p.full_name(),
            id: p.id,
            email: p.email,
            phone: p.phone,
            created_at: p.created_at,
            updated_at: p.updated_at,
        })
        .collect();

    Ok(Json(data))
}

// ---------------------------------------------------------------------------
// GET /api/patients/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/patients/{id}",
    tag = "Patients",
    responses(
        (status = 200, description = "The patient", body = Patient),
        (status = 404, description = "Unknown patient", body = ApiErrorBody),
    ),
)]
pub async fn get_patient(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let mut conn = state.db.get().await?;
    let patient: Patient = diesel_async::RunQueryDsl::get_result(
        patients::table.find(&id).select(Patient::as_select()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Patient not found"))?;

    Ok(Json(patient))
}

// ---------------------------------------------------------------------------
// PATCH /api/patients/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[utoipa::path(
    patch,
    path = "/api/patients/{id}",
    tag = "Patients",
    request_body = UpdatePatientRequest,
    responses(
        (status = 200, description = "Updated patient", body = Patient),
        (status = 404, description = "Unknown patient", body = ApiErrorBody),
    ),
)]
pub async fn update_patient(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdatePatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    let changeset = UpdatePatient {
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
        phone: body.phone,
        updated_at: Some(Utc::now()),
    };

    let mut conn = state.db.get().await?;
    let patient: Patient = diesel_async::RunQueryDsl::get_result(
        diesel::update(patients::table.find(&id))
            .set(&changeset)
            .returning(Patient::as_returning()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Patient not found"))?;

    match serde_json::to_value(&patient) {
        Ok(payload) => state
            .hub
            .publish(&ServerEvent::PatientUpdated { patient: payload }),
        Err(err) => tracing::error!(?err, "failed to serialize patient for broadcast"),
    }

    Ok(Json(patient))
}
