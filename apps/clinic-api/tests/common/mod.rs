use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};

use clinic_api::config::Config;
use clinic_api::gateway::changes::ChangeFeed;
use clinic_api::gateway::hub::BroadcastHub;
use clinic_api::provider::ExternalProviderStub;
use clinic_api::AppState;

/// Build a Config for tests. The database URL falls back to an unreachable
/// placeholder — pool checkout is lazy, so tests that never touch the
/// store run without Postgres.
pub fn test_config() -> Config {
    Config {
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://127.0.0.1:1/clinic_unreachable".to_string()),
        port: 0,
        jwt_secret: "test-secret".to_string(),
        admin_email: "admin@clinic.test".to_string(),
        admin_password: "admin-pw".to_string(),
        demo_mode: false,
    }
}

pub fn test_state() -> AppState {
    state_with_config(test_config())
}

pub fn state_with_config(config: Config) -> AppState {
    AppState {
        db: clinic_api::db::pool::connect(&config.database_url),
        config: Arc::new(config),
        hub: Arc::new(BroadcastHub::new()),
        changes: ChangeFeed::new(),
        provider: Arc::new(ExternalProviderStub::new()),
    }
}

/// Mint a valid admin bearer token against the test config.
pub fn admin_token(state: &AppState) -> String {
    clinic_api::auth::tokens::issue(&state.config, &state.config.admin_email)
        .expect("issue admin token")
}

/// Start the full router on a random local port. The server runs in the
/// background for the rest of the test.
pub async fn start_server(state: AppState) -> SocketAddr {
    let app = clinic_api::routes::router().with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a realtime connection, optionally carrying a bearer token.
pub async fn connect_ws(addr: SocketAddr, token: Option<&str>) -> WsClient {
    let url = match token {
        Some(token) => format!("ws://{addr}/ws?token={token}"),
        None => format!("ws://{addr}/ws"),
    };
    let (stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    stream
}

/// Wait until the hub's registry reaches the expected connection count.
/// Registration happens inside the server's connection task, slightly
/// after the client handshake returns.
pub async fn wait_for_connections(state: &AppState, expected: usize) {
    let deadline = time::Instant::now() + Duration::from_secs(5);
    while state.hub.connection_count() != expected {
        assert!(
            time::Instant::now() < deadline,
            "hub never reached {expected} connections"
        );
        time::sleep(Duration::from_millis(10)).await;
    }
}

/// Read the next text frame as JSON, failing the test after a timeout.
pub async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(&text).expect("parse frame")
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("expected text frame, got: {other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Database-backed helpers
// ---------------------------------------------------------------------------

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

/// Serializes tests that truncate the shared database.
pub async fn db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::OnceLock<tokio::sync::Mutex<()>> = std::sync::OnceLock::new();
    LOCK.get_or_init(|| tokio::sync::Mutex::new(()))
        .lock()
        .await
}

/// AppState backed by the database named in `DATABASE_URL`, with pending
/// migrations applied. Returns `None` when the variable is unset so the
/// caller can skip.
pub async fn db_state() -> Option<AppState> {
    let database_url = std::env::var("DATABASE_URL").ok()?;

    tokio::task::spawn_blocking(move || {
        let mut conn =
            diesel::pg::PgConnection::establish(&database_url).expect("connect for migrations");
        conn.run_pending_migrations(MIGRATIONS)
            .expect("run migrations");
    })
    .await
    .expect("migration task");

    Some(test_state())
}

/// Empty every table, child tables first.
pub async fn clear_tables(db: &clinic_api::db::pool::DbPool) {
    use clinic_api::db::schema::{appointments, conversations, messages, patients, payments};

    let mut conn = db.get().await.expect("pool");
    diesel_async::RunQueryDsl::execute(diesel::delete(messages::table), &mut conn)
        .await
        .expect("clear messages");
    diesel_async::RunQueryDsl::execute(diesel::delete(conversations::table), &mut conn)
        .await
        .expect("clear conversations");
    diesel_async::RunQueryDsl::execute(diesel::delete(payments::table), &mut conn)
        .await
        .expect("clear payments");
    diesel_async::RunQueryDsl::execute(diesel::delete(appointments::table), &mut conn)
        .await
        .expect("clear appointments");
    diesel_async::RunQueryDsl::execute(diesel::delete(patients::table), &mut conn)
        .await
        .expect("clear patients");
}

/// Insert an appointment row with an explicit `created_at`, for stats
/// window tests.
pub async fn insert_appointment_at(
    db: &clinic_api::db::pool::DbPool,
    created_at: DateTime<Utc>,
    kind: &str,
    status: &str,
) -> String {
    use clinic_api::db::schema::appointments;
    use clinic_api::models::appointment::NewAppointment;

    let id = clinic_common::id::prefixed_ulid(clinic_common::id::prefix::APPOINTMENT);
    let mut conn = db.get().await.expect("pool");
    diesel_async::RunQueryDsl::execute(
        diesel::insert_into(appointments::table).values(NewAppointment {
            id: &id,
            patient_name: "Test Patient",
            patient_email: "patient@clinic.test",
            patient_phone: None,
            date: "2026-08-10",
            time: "10:00",
            reason: "Checkup",
            kind,
            status,
            payment_status: "pending",
            created_at,
            updated_at: created_at,
        }),
        &mut conn,
    )
    .await
    .expect("insert appointment");
    id
}

/// Expect a close frame with the given application close code.
pub async fn expect_close(ws: &mut WsClient, code: u16) {
    let msg = time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timeout waiting for close")
        .expect("stream ended")
        .expect("ws read error");

    match msg {
        tungstenite::Message::Close(Some(frame)) => {
            assert_eq!(
                frame.code,
                tungstenite::protocol::frame::coding::CloseCode::from(code)
            );
        }
        tungstenite::Message::Close(None) => {}
        other => panic!("expected Close frame, got: {other:?}"),
    }
}
