//! Messaging endpoints (patient ↔ staff conversations).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use serde::Deserialize;
use utoipa::ToSchema;

use clinic_common::id::{prefix, prefixed_ulid};
use clinic_common::protocol::ServerEvent;

use crate::auth::middleware::AuthAdmin;
use crate::db::schema::{conversations, messages};
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::conversation::{Conversation, NewConversation};
use crate::models::message::{Message, NewMessage};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", post(send_message))
        .route(
            "/messages/conversations",
            post(create_conversation).get(list_conversations),
        )
        .route(
            "/messages/conversation/{conversation_id}",
            get(conversation_messages),
        )
}

// ---------------------------------------------------------------------------
// GET /api/messages/conversation/{conversation_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/messages/conversation/{conversation_id}",
    tag = "Messages",
    responses(
        (status = 200, description = "Messages in the conversation, oldest first"),
        (status = 401, description = "Missing or invalid token"),
    ),
)]
pub async fn conversation_messages(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let mut conn = state.db.get().await?;
    let rows: Vec<Message> = diesel_async::RunQueryDsl::load(
        messages::table
            .filter(messages::conversation_id.eq(&conversation_id))
            .order(messages::created_at.asc())
            .select(Message::as_select()),
        &mut conn,
    )
    .await?;

    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// GET /api/messages/conversations
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/messages/conversations",
    tag = "Messages",
    responses(
        (status = 200, description = "Conversations, most recently active first"),
        (status = 401, description = "Missing or invalid token"),
    ),
)]
pub async fn list_conversations(
    _admin: AuthAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let mut conn = state.db.get().await?;
    let rows: Vec<Conversation> = diesel_async::RunQueryDsl::load(
        conversations::table
            .order(conversations::updated_at.desc())
            .select(Conversation::as_select()),
        &mut conn,
    )
    .await?;

    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// POST /api/messages/conversations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    pub patient_id: Option<String>,
    pub subject: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/messages/conversations",
    tag = "Messages",
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Conversation created", body = Conversation),
        (status = 401, description = "Missing or invalid token"),
    ),
)]
pub async fn create_conversation(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let id = prefixed_ulid(prefix::CONVERSATION);
    let now = Utc::now();

    let mut conn = state.db.get().await?;
    let conversation: Conversation = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(conversations::table)
            .values(NewConversation {
                id: &id,
                patient_id: body.patient_id.as_deref(),
                subject: body.subject.as_deref(),
                created_at: now,
                updated_at: now,
            })
            .returning(Conversation::as_returning()),
        &mut conn,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(conversation)))
}

// ---------------------------------------------------------------------------
// POST /api/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub sender: String,
    pub content: String,
}

#[utoipa::path(
    post,
    path = "/api/messages",
    tag = "Messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent", body = Message),
        (status = 404, description = "Unknown conversation", body = ApiErrorBody),
    ),
)]
pub async fn send_message(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let content = body.content.trim();
    if content.is_empty() {
        return Err(ApiError::validation(vec![FieldError {
            field: "content".to_string(),
            message: "Message content is required".to_string(),
        }]));
    }

    let mut conn = state.db.get().await?;

    // The conversation must exist before we attach a message to it.
    diesel_async::RunQueryDsl::get_result::<String>(
        conversations::table
            .find(&body.conversation_id)
            .select(conversations::id),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Conversation not found"))?;

    let id = prefixed_ulid(prefix::MESSAGE);
    let now = Utc::now();

    let message: Message = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(messages::table)
            .values(NewMessage {
                id: &id,
                conversation_id: &body.conversation_id,
                sender: &body.sender,
                content,
                created_at: now,
            })
            .returning(Message::as_returning()),
        &mut conn,
    )
    .await?;

    // Bump the conversation so it sorts to the top of the inbox.
    diesel_async::RunQueryDsl::execute(
        diesel::update(conversations::table.find(&body.conversation_id))
            .set(conversations::updated_at.eq(now)),
        &mut conn,
    )
    .await?;

    match serde_json::to_value(&message) {
        Ok(payload) => state
            .hub
            .publish(&ServerEvent::NewMessage { message: payload }),
        Err(err) => tracing::error!(?err, "failed to serialize message for broadcast"),
    }

    Ok((StatusCode::CREATED, Json(message)))
}
