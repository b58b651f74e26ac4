//! WebSocket 会话。
//!
//! 每个连接一个会话。握手认证在升级前完成，会话内命令严格按到达
//! 顺序处理，跨会话的协调只通过广播总线和存储。除握手失败外任何
//! 错误都不关闭连接，统一回 `error` 事件。

use std::collections::HashSet;

use application::{ApplicationError, Group, SendMessageRequest, Subscriber};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::{ClientCommand, RoomId, ServerEvent, UserId};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// WebSocket 写操作命令，统一经过发送任务串行写出。
#[derive(Debug)]
enum WsCommand {
    SendText(String),
    SendPong(Vec<u8>),
}

pub struct ChatSession {
    state: AppState,
    user_id: UserId,
}

impl ChatSession {
    pub fn new(state: AppState, user_id: UserId) -> Self {
        Self { state, user_id }
    }

    pub async fn run(self, socket: WebSocket) {
        let (subscriber, mut events) = Subscriber::new(self.user_id);
        let session_id = subscriber.session_id();
        let personal = Group::user(self.user_id);

        if let Err(err) = self.state.bus.join(personal, subscriber.clone()).await {
            warn!(user_id = %self.user_id, error = %err, "personal group join failed");
            return;
        }
        if let Err(err) = self.state.presence_service.set_online(self.user_id, true).await {
            warn!(user_id = %self.user_id, error = %err, "presence online failed");
        }
        info!(user_id = %self.user_id, session_id = %session_id, "chat session started");

        let (mut sink, mut incoming) = socket.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        // welcome 必须是连接上的第一个事件，bus_healthy 告诉客户端
        // 实时通道当前是否可靠，不可靠时应退回轮询。
        let welcome = ServerEvent::Welcome {
            user_id: self.user_id,
            timestamp: chrono::Utc::now(),
            bus_healthy: self.state.bus.healthy().await,
        };
        send_event(&cmd_tx, &welcome).await;

        // 发送任务：唯一接触 socket 写端的地方
        let send_task = tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                let result = match cmd {
                    WsCommand::SendText(text) => sink.send(WsMessage::Text(text.into())).await,
                    WsCommand::SendPong(data) => sink.send(WsMessage::Pong(data.into())).await,
                };
                if result.is_err() {
                    break;
                }
            }
        });

        // 中继任务：把总线事件转发给客户端。收到别人发的消息时顺带
        // 推进送达回执（实时路径的 delivered）。
        let relay_task = tokio::spawn({
            let cmd_tx = cmd_tx.clone();
            let receipt_service = self.state.receipt_service.clone();
            let user_id = self.user_id;
            async move {
                while let Some(event) = events.recv().await {
                    if let ServerEvent::ChatMessage { message, .. } = &event {
                        if message.sender_id != Some(user_id) {
                            if let Err(err) =
                                receipt_service.mark_delivered(user_id, message.id).await
                            {
                                warn!(user_id = %user_id, error = %err, "delivery receipt failed");
                            }
                        }
                    }
                    match serde_json::to_string(&event) {
                        Ok(payload) => {
                            if cmd_tx.send(WsCommand::SendText(payload)).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "failed to serialize websocket payload");
                        }
                    }
                }
            }
        });

        // 命令循环：严格按到达顺序逐条处理
        let mut joined_rooms: HashSet<RoomId> = HashSet::new();
        while let Some(Ok(message)) = incoming.next().await {
            match message {
                WsMessage::Text(text) => {
                    self.dispatch(&text, &subscriber, &mut joined_rooms, &cmd_tx)
                        .await;
                }
                WsMessage::Ping(data) => {
                    if cmd_tx
                        .send(WsCommand::SendPong(data.to_vec()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                WsMessage::Close(_) => break,
                WsMessage::Pong(_) | WsMessage::Binary(_) => {}
            }
        }

        // 清理：离开所有分组，下线（顺带清除输入中状态）并广播
        for room_id in &joined_rooms {
            self.state
                .bus
                .leave(&Group::room(*room_id), session_id)
                .await;
        }
        self.state.bus.leave(&personal, session_id).await;
        if let Err(err) = self
            .state
            .presence_service
            .set_online(self.user_id, false)
            .await
        {
            warn!(user_id = %self.user_id, error = %err, "presence offline failed");
        }
        relay_task.abort();
        send_task.abort();
        info!(user_id = %self.user_id, session_id = %session_id, "chat session ended");
    }

    /// 解析并执行一条命令。格式错误和业务错误都只回 error 事件。
    async fn dispatch(
        &self,
        text: &str,
        subscriber: &Subscriber,
        joined_rooms: &mut HashSet<RoomId>,
        cmd_tx: &mpsc::Sender<WsCommand>,
    ) {
        let command = match serde_json::from_str::<ClientCommand>(text) {
            Ok(command) => command,
            Err(err) => {
                debug!(user_id = %self.user_id, error = %err, "malformed command");
                let event = ServerEvent::Error {
                    code: "VALIDATION_ERROR".to_string(),
                    message: "malformed command payload".to_string(),
                };
                send_event(cmd_tx, &event).await;
                return;
            }
        };

        if let Err(err) = self
            .handle_command(command, subscriber, joined_rooms, cmd_tx)
            .await
        {
            debug!(user_id = %self.user_id, error = %err, "command failed");
            let event = ServerEvent::Error {
                code: err.code().to_string(),
                message: err.to_string(),
            };
            send_event(cmd_tx, &event).await;
        }
    }

    async fn handle_command(
        &self,
        command: ClientCommand,
        subscriber: &Subscriber,
        joined_rooms: &mut HashSet<RoomId>,
        cmd_tx: &mpsc::Sender<WsCommand>,
    ) -> Result<(), ApplicationError> {
        match command {
            ClientCommand::JoinRoom { room_id } => {
                // 分组成员资格只是授权结果的缓存，这里必须重新检查
                self.state.guard.ensure_access(self.user_id, room_id).await?;
                self.state
                    .bus
                    .join(Group::room(room_id), subscriber.clone())
                    .await?;
                joined_rooms.insert(room_id);
                send_event(cmd_tx, &ServerEvent::RoomJoined { room_id }).await;
                // 进入房间即视为收到了积压的消息
                self.state
                    .receipt_service
                    .mark_room_delivered(self.user_id, room_id)
                    .await?;
            }
            ClientCommand::LeaveRoom { room_id } => {
                self.state
                    .bus
                    .leave(&Group::room(room_id), subscriber.session_id())
                    .await;
                joined_rooms.remove(&room_id);
                send_event(cmd_tx, &ServerEvent::RoomLeft { room_id }).await;
            }
            ClientCommand::SendMessage {
                room_id,
                content,
                temp_id,
            } => {
                let message = self
                    .state
                    .chat_service
                    .send_message(SendMessageRequest {
                        room_id,
                        sender_id: self.user_id,
                        content,
                        temp_id: temp_id.clone(),
                    })
                    .await?;
                // 发送方的直接确认，不经过广播
                let ack = ServerEvent::MessageSent {
                    message_id: message.id,
                    room_id,
                    temp_id,
                    created_at: message.created_at,
                };
                send_event(cmd_tx, &ack).await;
            }
            ClientCommand::MarkRead { room_id } => {
                self.state
                    .receipt_service
                    .mark_room_read(self.user_id, room_id)
                    .await?;
            }
            ClientCommand::Typing { room_id, is_typing } => {
                self.state
                    .presence_service
                    .set_typing(self.user_id, room_id, is_typing)
                    .await?;
            }
        }
        Ok(())
    }
}

async fn send_event(cmd_tx: &mpsc::Sender<WsCommand>, event: &ServerEvent) {
    match serde_json::to_string(event) {
        Ok(payload) => {
            if cmd_tx.send(WsCommand::SendText(payload)).await.is_err() {
                debug!("send channel closed");
            }
        }
        Err(err) => {
            warn!(error = %err, "failed to serialize event");
        }
    }
}
