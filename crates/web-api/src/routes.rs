use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::{ContactSummary, DirectMessageRequest};
use domain::{ApplicationRef, ChatMessage, ChatRoom, Notification, RoomId, UserId, UserPresence};

use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::state::AppState;
use crate::ws_session::ChatSession;

#[derive(Debug, Deserialize)]
struct DirectMessagePayload {
    recipient_id: Uuid,
    content: String,
    application_ref: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct DirectMessageResponse {
    room: ChatRoom,
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct MarkedResponse {
    marked: u64,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/direct", post(send_direct))
        .route("/rooms/{room_id}/messages", get(get_messages))
        .route("/rooms/{room_id}/read", post(mark_room_read))
        .route("/contacts", get(list_contacts))
        .route("/presence", get(get_presence))
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_notifications_read))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 所有 REST 接口都通过 `Authorization: Bearer` 认证。
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let token = bearer_token(headers)?;
    Ok(state.authenticator.authenticate(token).await?)
}

async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChatRoom>>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let rooms = state.chat_service.list_rooms(user_id).await?;
    Ok(Json(rooms))
}

async fn send_direct(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<DirectMessagePayload>,
) -> Result<(StatusCode, Json<DirectMessageResponse>), ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let (room, message) = state
        .chat_service
        .send_direct(DirectMessageRequest {
            sender_id: user_id,
            recipient_id: UserId::from(payload.recipient_id),
            application_ref: payload.application_ref.map(ApplicationRef::from),
            content: payload.content,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(DirectMessageResponse { room, message }),
    ))
}

/// 历史读取同时把调用方的未送达回执推进到已送达，
/// 与实时路径走同一个状态机。
async fn get_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let room_id = RoomId::from(room_id);
    let messages = state.chat_service.history(user_id, room_id).await?;
    state
        .receipt_service
        .mark_room_delivered(user_id, room_id)
        .await?;
    Ok(Json(messages))
}

async fn mark_room_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
) -> Result<Json<MarkedResponse>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let marked = state
        .receipt_service
        .mark_room_read(user_id, RoomId::from(room_id))
        .await?;
    Ok(Json(MarkedResponse { marked }))
}

async fn list_contacts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ContactSummary>>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let contacts = state.chat_service.contacts(user_id).await?;
    Ok(Json(contacts))
}

async fn get_presence(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserPresence>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let presence = state.presence_service.get_or_init(user_id).await?;
    Ok(Json(presence))
}

async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let notifications = state.notification_service.list(user_id).await?;
    Ok(Json(notifications))
}

async fn mark_notifications_read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MarkedResponse>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let marked = state.notification_service.mark_all_read(user_id).await?;
    Ok(Json(MarkedResponse { marked }))
}

/// WebSocket 握手：token 在查询串里，认证失败直接拒绝升级。
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = state.authenticator.authenticate(&query.token).await?;
    Ok(ws.on_upgrade(move |socket| ChatSession::new(state, user_id).run(socket)))
}
