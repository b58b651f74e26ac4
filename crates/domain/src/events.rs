//! WebSocket 线上格式。
//!
//! 入站命令和出站事件都是带标签的 serde 枚举，反序列化失败统一映射成
//! 校验错误事件，而不是悄悄丢弃或断开连接。

use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;
use crate::value_objects::{MessageId, RoomId, Timestamp, UserId};

/// 客户端通过连接发来的命令，按到达顺序逐条处理。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    SendMessage {
        room_id: RoomId,
        content: String,
        /// 客户端本地生成的临时 id，用于乐观 UI 的确认对账。
        temp_id: Option<String>,
    },
    MarkRead {
        room_id: RoomId,
    },
    Typing {
        room_id: RoomId,
        is_typing: bool,
    },
}

/// 服务端推送给客户端的事件。同一结构也是广播总线上的载荷。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Welcome {
        user_id: UserId,
        timestamp: Timestamp,
        /// 广播总线健康标志，不健康时客户端应退回轮询。
        bus_healthy: bool,
    },
    ChatMessage {
        message: ChatMessage,
        temp_id: Option<String>,
    },
    MessageSent {
        message_id: MessageId,
        room_id: RoomId,
        temp_id: Option<String>,
        created_at: Timestamp,
    },
    RoomJoined {
        room_id: RoomId,
    },
    RoomLeft {
        room_id: RoomId,
    },
    DeliveryReceipt {
        deliverer_id: UserId,
        message_ids: Vec<MessageId>,
    },
    ReadReceipt {
        reader_id: UserId,
        room_id: RoomId,
        timestamp: Timestamp,
    },
    TypingIndicator {
        user_id: UserId,
        room_id: RoomId,
        is_typing: bool,
    },
    PresenceUpdate {
        user_id: UserId,
        is_online: bool,
        last_seen: Timestamp,
    },
    Notification {
        content: String,
        category: String,
        created_at: Timestamp,
    },
    Error {
        code: String,
        message: String,
    },
}
