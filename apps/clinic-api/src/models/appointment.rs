use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::appointments;

/// A booked (or requested) appointment. `date` and `time` are kept as the
/// `YYYY-MM-DD` / `HH:MM` strings the booking form submits.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = appointments)]
pub struct Appointment {
    pub id: String,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: Option<String>,
    pub date: String,
    pub time: String,
    pub reason: String,
    /// Consultation kind: "in-person" or "video".
    #[serde(rename = "type")]
    pub kind: String,
    /// "pending", "confirmed", "cancelled", or "completed".
    pub status: String,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = appointments)]
pub struct NewAppointment<'a> {
    pub id: &'a str,
    pub patient_name: &'a str,
    pub patient_email: &'a str,
    pub patient_phone: Option<&'a str>,
    pub date: &'a str,
    pub time: &'a str,
    pub reason: &'a str,
    pub kind: &'a str,
    pub status: &'a str,
    pub payment_status: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = appointments)]
pub struct UpdateAppointment {
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub reason: Option<String>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Full appointment list, newest first — the shape every snapshot push and
/// the admin list endpoint share.
pub async fn list_newest_first(
    pool: &crate::db::pool::DbPool,
) -> Result<Vec<Appointment>, crate::error::ApiError> {
    let mut conn = pool.get().await?;
    let rows: Vec<Appointment> = diesel_async::RunQueryDsl::load(
        appointments::table
            .order(appointments::created_at.desc())
            .select(Appointment::as_select()),
        &mut conn,
    )
    .await?;
    Ok(rows)
}
