//! Dashboard summary counters with month-over-month trends.
//!
//! Eight independent point-in-time counts (four per calendar month); no
//! transactional consistency across the reads is required, so a snapshot
//! may show slight skew under concurrent writes.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use diesel::prelude::*;

use clinic_common::protocol::{StatsSnapshot, StatsTrends};

use crate::db::pool::DbPool;
use crate::db::schema::{appointments, patients};
use crate::error::ApiError;

/// Counters for one calendar month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodCounts {
    pub appointments: i64,
    pub patients: i64,
    pub video_consultations: i64,
    pub pending_appointments: i64,
}

/// Percentage change from `prior` to `current`. A prior period of zero
/// yields 100 when anything exists now, 0 otherwise.
pub fn trend(current: i64, prior: i64) -> f64 {
    if prior == 0 {
        if current > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - prior) as f64 / prior as f64 * 100.0
    }
}

/// Assemble a snapshot from the current and prior month's counters.
pub fn snapshot_from_counts(current: PeriodCounts, prior: PeriodCounts) -> StatsSnapshot {
    StatsSnapshot {
        total_appointments: current.appointments,
        total_patients: current.patients,
        video_consultations: current.video_consultations,
        pending_appointments: current.pending_appointments,
        trends: StatsTrends {
            appointments: trend(current.appointments, prior.appointments),
            patients: trend(current.patients, prior.patients),
            video_consultations: trend(current.video_consultations, prior.video_consultations),
            pending_appointments: trend(
                current.pending_appointments,
                prior.pending_appointments,
            ),
        },
    }
}

/// Half-open UTC window covering the calendar month containing `now`.
pub fn month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .unwrap();
    let (next_year, next_month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .unwrap();
    (start, end)
}

/// Half-open UTC window covering the month immediately before `now`'s.
pub fn prior_month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (prev_year, prev_month) = if now.month() == 1 {
        (now.year() - 1, 12)
    } else {
        (now.year(), now.month() - 1)
    };
    let start = Utc
        .with_ymd_and_hms(prev_year, prev_month, 1, 0, 0, 0)
        .unwrap();
    let (end, _) = month_window(now);
    (start, end)
}

async fn period_counts(
    pool: &DbPool,
    window: (DateTime<Utc>, DateTime<Utc>),
) -> Result<PeriodCounts, ApiError> {
    let (start, end) = window;
    let mut conn = pool.get().await?;

    let appointment_count: i64 = diesel_async::RunQueryDsl::get_result(
        appointments::table
            .filter(appointments::created_at.ge(start))
            .filter(appointments::created_at.lt(end))
            .count(),
        &mut conn,
    )
    .await?;

    let patient_count: i64 = diesel_async::RunQueryDsl::get_result(
        patients::table
            .filter(patients::created_at.ge(start))
            .filter(patients::created_at.lt(end))
            .count(),
        &mut conn,
    )
    .await?;

    let video_count: i64 = diesel_async::RunQueryDsl::get_result(
        appointments::table
            .filter(appointments::kind.eq("video"))
            .filter(appointments::created_at.ge(start))
            .filter(appointments::created_at.lt(end))
            .count(),
        &mut conn,
    )
    .await?;

    let pending_count: i64 = diesel_async::RunQueryDsl::get_result(
        appointments::table
            .filter(appointments::status.eq("pending"))
            .filter(appointments::created_at.ge(start))
            .filter(appointments::created_at.lt(end))
            .count(),
        &mut conn,
    )
    .await?;

    Ok(PeriodCounts {
        appointments: appointment_count,
        patients: patient_count,
        video_consultations: video_count,
        pending_appointments: pending_count,
    })
}

/// Compute the snapshot for the calendar month containing `now` against
/// the immediately preceding month.
pub async fn gather(pool: &DbPool, now: DateTime<Utc>) -> Result<StatsSnapshot, ApiError> {
    let current = period_counts(pool, month_window(now)).await?;
    let prior = period_counts(pool, prior_month_window(now)).await?;
    Ok(snapshot_from_counts(current, prior))
}
