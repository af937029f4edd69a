use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::payments;

/// A payment record. `amount` is in minor currency units. `reference` is
/// the opaque id issued by the external payment provider (or its stub).
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = payments)]
pub struct Payment {
    pub id: String,
    pub appointment_id: Option<String>,
    pub patient_id: Option<String>,
    pub amount: i64,
    pub method: String,
    pub status: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPayment<'a> {
    pub id: &'a str,
    pub appointment_id: Option<&'a str>,
    pub patient_id: Option<&'a str>,
    pub amount: i64,
    pub method: &'a str,
    pub status: &'a str,
    pub reference: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
