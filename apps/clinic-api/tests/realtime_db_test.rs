//! End-to-end tests against a real Postgres database.
//!
//! Every test skips (with a note) when DATABASE_URL is not configured.

mod common;

use chrono::Duration as ChronoDuration;
use chrono::Utc;
use futures_util::SinkExt;
use tokio_tungstenite::tungstenite;

// =========================================================================
// FETCH_INITIAL_DATA on an empty store
// =========================================================================

#[tokio::test]
async fn initial_data_on_empty_store_is_all_zero() {
    let _guard = common::db_lock().await;
    let Some(state) = common::db_state().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    common::clear_tables(&state.db).await;

    let token = common::admin_token(&state);
    let addr = common::start_server(state.clone()).await;
    let mut ws = common::connect_ws(addr, Some(&token)).await;
    common::wait_for_connections(&state, 1).await;

    ws.send(tungstenite::Message::Text(
        serde_json::json!({ "type": "FETCH_INITIAL_DATA" })
            .to_string()
            .into(),
    ))
    .await
    .expect("send fetch");

    let frame = common::next_json(&mut ws).await;
    assert_eq!(frame["type"], "INITIAL_DATA");
    assert_eq!(frame["appointments"].as_array().unwrap().len(), 0);
    assert_eq!(frame["stats"]["totalAppointments"], 0);
    assert_eq!(frame["stats"]["totalPatients"], 0);
    assert_eq!(frame["stats"]["videoConsultations"], 0);
    assert_eq!(frame["stats"]["pendingAppointments"], 0);
    assert_eq!(frame["stats"]["trends"]["appointments"], 0.0);
    assert_eq!(frame["stats"]["trends"]["patients"], 0.0);
    assert_eq!(frame["stats"]["trends"]["videoConsultations"], 0.0);
    assert_eq!(frame["stats"]["trends"]["pendingAppointments"], 0.0);
    assert!(frame["timestamp"].is_string());
}

// =========================================================================
// Write path + change feed
// =========================================================================

#[tokio::test]
async fn appointment_creation_pushes_both_event_families() {
    let _guard = common::db_lock().await;
    let Some(state) = common::db_state().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    common::clear_tables(&state.db).await;

    let token = common::admin_token(&state);
    let addr = common::start_server(state.clone()).await;

    let mut ws_a = common::connect_ws(addr, Some(&token)).await;
    let mut ws_b = common::connect_ws(addr, Some(&token)).await;
    common::wait_for_connections(&state, 2).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/appointments"))
        .json(&serde_json::json!({
            "name": "Ada Lovelace",
            "email": "ada@clinic.test",
            "appointmentDate": "2026-08-20T00:00:00.000Z",
            "appointmentTime": "09:30",
            "consultationType": "video",
        }))
        .send()
        .await
        .expect("create appointment");
    assert_eq!(resp.status(), 201);

    // Each connection receives the targeted broadcast AND a full refresh
    // from its own change-feed subscription; arrival order between the two
    // families is not guaranteed.
    for ws in [&mut ws_a, &mut ws_b] {
        let first = common::next_json(ws).await;
        let second = common::next_json(ws).await;

        let mut kinds = [
            first["type"].as_str().unwrap().to_string(),
            second["type"].as_str().unwrap().to_string(),
        ];
        kinds.sort();
        assert_eq!(kinds, ["APPOINTMENT_CREATED", "REALTIME_UPDATE"]);

        for frame in [&first, &second] {
            match frame["type"].as_str().unwrap() {
                "APPOINTMENT_CREATED" => {
                    assert_eq!(frame["appointment"]["patient_name"], "Ada Lovelace");
                    assert_eq!(frame["appointment"]["time"], "09:30");
                }
                "REALTIME_UPDATE" => {
                    assert_eq!(frame["event"], "INSERT");
                    assert_eq!(frame["appointments"].as_array().unwrap().len(), 1);
                    assert_eq!(frame["stats"]["totalAppointments"], 1);
                    assert_eq!(frame["stats"]["videoConsultations"], 1);
                }
                other => panic!("unexpected event type {other}"),
            }
        }
    }
}

// =========================================================================
// Stats endpoint month-over-month trend
// =========================================================================

#[tokio::test]
async fn stats_reflect_month_over_month_trend() {
    let _guard = common::db_lock().await;
    let Some(state) = common::db_state().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    common::clear_tables(&state.db).await;

    let now = Utc::now();
    let (prior_start, _) = clinic_api::stats::prior_month_window(now);
    let last_month = prior_start + ChronoDuration::days(1);

    // 5 appointments this month, 2 last month.
    for _ in 0..5 {
        common::insert_appointment_at(&state.db, now, "in-person", "pending").await;
    }
    for _ in 0..2 {
        common::insert_appointment_at(&state.db, last_month, "in-person", "confirmed").await;
    }

    let token = common::admin_token(&state);
    let addr = common::start_server(state.clone()).await;

    let client = reqwest::Client::new();
    let body: serde_json::Value = client
        .get(format!("http://{addr}/api/dashboard/stats"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("stats request")
        .json()
        .await
        .expect("parse stats");

    assert_eq!(body["totalAppointments"], 5);
    assert_eq!(body["pendingAppointments"], 5);
    assert_eq!(body["trends"]["appointments"], 150.0);
}

// =========================================================================
// Slot booking collision
// =========================================================================

#[tokio::test]
async fn booking_a_taken_slot_conflicts() {
    let _guard = common::db_lock().await;
    let Some(state) = common::db_state().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    common::clear_tables(&state.db).await;

    let addr = common::start_server(state.clone()).await;
    let client = reqwest::Client::new();

    let booking = serde_json::json!({
        "name": "Grace Hopper",
        "email": "grace@clinic.test",
        "phone": "555-0100",
        "date": "2026-09-01",
        "time": "11:00",
        "reason": "Follow-up",
    });

    let first = client
        .post(format!("http://{addr}/api/appointments/book"))
        .json(&booking)
        .send()
        .await
        .expect("first booking");
    assert_eq!(first.status(), 201);

    let second = client
        .post(format!("http://{addr}/api/appointments/book"))
        .json(&booking)
        .send()
        .await
        .expect("second booking");
    assert_eq!(second.status(), 409);
}
