use serde::{Deserialize, Serialize};

use crate::value_objects::{MessageContent, MessageId, RoomId, Timestamp, UserId};

/// 房间内的一条消息。创建后不可变，`created_at` 是房间内唯一的排序键。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    /// 系统消息没有发送者。
    pub sender_id: Option<UserId>,
    pub content: MessageContent,
    pub created_at: Timestamp,
}

impl ChatMessage {
    pub fn new(
        id: MessageId,
        room_id: RoomId,
        sender_id: UserId,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            room_id,
            sender_id: Some(sender_id),
            content,
            created_at,
        }
    }

    pub fn new_system(
        id: MessageId,
        room_id: RoomId,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            room_id,
            sender_id: None,
            content,
            created_at,
        }
    }

    pub fn is_system(&self) -> bool {
        self.sender_id.is_none()
    }
}
