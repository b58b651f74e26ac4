//! 聊天用例服务：发消息、房间查询、直聊房间、联系人列表。

use std::sync::Arc;

use domain::{
    ChatMessage, ChatRoom, DomainError, MessageContent, MessageId, MessageReceipt, RoomId,
    RoomKind, ServerEvent, Timestamp, UserId,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::RoomAccessGuard;
use crate::bus::{EventBus, Group};
use crate::clock::Clock;
use crate::error::ApplicationError;
use crate::repository::{
    ChatRoomRepository, MessageRepository, PresenceRepository, ReceiptRepository,
};

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    /// 客户端生成的临时 id，原样带回给房间广播和发送方确认。
    pub temp_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DirectMessageRequest {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub application_ref: Option<domain::ApplicationRef>,
    pub content: String,
}

/// 联系人列表条目：对端用户加上所在房间的未读/预览信息。
#[derive(Debug, Clone, Serialize)]
pub struct ContactSummary {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub room_name: String,
    pub last_message: Option<ChatMessage>,
    pub unread_count: i64,
    pub is_online: bool,
    pub last_seen: Option<Timestamp>,
}

pub struct ChatServiceDependencies {
    pub rooms: Arc<dyn ChatRoomRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub receipts: Arc<dyn ReceiptRepository>,
    pub presence: Arc<dyn PresenceRepository>,
    pub guard: RoomAccessGuard,
    pub bus: Arc<dyn EventBus>,
    pub clock: Arc<dyn Clock>,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub const HISTORY_LIMIT: i64 = 200;

    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 发送一条消息。
    ///
    /// 守卫检查 → 消息+回执+房间时间戳一个事务落库 → 广播到房间分组，
    /// 并给不在房间分组里的接收者补发到个人分组。落库之后的广播失败
    /// 只记录日志，消息已持久化，接收方靠回执和历史补齐。
    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<ChatMessage, ApplicationError> {
        let SendMessageRequest {
            room_id,
            sender_id,
            content,
            temp_id,
        } = request;

        self.deps.guard.ensure_access(sender_id, room_id).await?;
        let room = self
            .deps
            .rooms
            .find_by_id(room_id)
            .await?
            .ok_or(DomainError::RoomNotFound)?;
        if !room.is_active {
            return Err(DomainError::RoomInactive.into());
        }

        let content = MessageContent::new(content)?;
        let now = self.deps.clock.now();
        let message = ChatMessage::new(
            MessageId::new(Uuid::new_v4()),
            room_id,
            sender_id,
            content,
            now,
        );

        let participants = self.deps.rooms.participants(room_id).await?;
        let recipients: Vec<UserId> = participants
            .into_iter()
            .filter(|p| *p != sender_id)
            .collect();
        let receipts: Vec<MessageReceipt> = recipients
            .iter()
            .map(|recipient| MessageReceipt::new_sent(message.id, *recipient))
            .collect();

        self.deps
            .messages
            .create_with_receipts(&message, &receipts)
            .await?;
        info!(
            message_id = %message.id,
            room_id = %room_id,
            sender_id = %sender_id,
            recipients = recipients.len(),
            "message persisted"
        );

        let event = ServerEvent::ChatMessage {
            message: message.clone(),
            temp_id,
        };
        let room_group = Group::room(room_id);
        if let Err(err) = self.deps.bus.publish(&room_group, event.clone()).await {
            warn!(room_id = %room_id, error = %err, "room broadcast failed");
        }
        for recipient in &recipients {
            if self.deps.bus.is_member(&room_group, *recipient).await {
                continue;
            }
            let personal = Group::user(*recipient);
            if let Err(err) = self.deps.bus.publish(&personal, event.clone()).await {
                warn!(recipient = %recipient, error = %err, "personal broadcast failed");
            }
        }

        Ok(message)
    }

    /// 取出或创建两人之间的直聊房间，并发送第一条消息。
    pub async fn send_direct(
        &self,
        request: DirectMessageRequest,
    ) -> Result<(ChatRoom, ChatMessage), ApplicationError> {
        let DirectMessageRequest {
            sender_id,
            recipient_id,
            application_ref,
            content,
        } = request;

        let participants = [sender_id, recipient_id];
        ChatRoom::validate_participants(RoomKind::Direct, &participants)?;

        let room = match self
            .deps
            .rooms
            .find_direct_between(sender_id, recipient_id)
            .await?
        {
            Some(existing) => existing,
            None => {
                let room = ChatRoom::new(
                    RoomId::new(Uuid::new_v4()),
                    "Direct chat",
                    RoomKind::Direct,
                    application_ref,
                    self.deps.clock.now(),
                )?;
                self.deps.rooms.create(&room, &participants).await?;
                info!(room_id = %room.id, "direct room created");
                room
            }
        };

        let message = self
            .send_message(SendMessageRequest {
                room_id: room.id,
                sender_id,
                content,
                temp_id: None,
            })
            .await?;
        Ok((room, message))
    }

    /// 调用方的活跃房间，按最近消息排序。
    pub async fn list_rooms(&self, user_id: UserId) -> Result<Vec<ChatRoom>, ApplicationError> {
        Ok(self.deps.rooms.list_for_user(user_id).await?)
    }

    /// 房间消息历史，时间升序。调用方必须是参与者。
    pub async fn history(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Vec<ChatMessage>, ApplicationError> {
        self.deps.guard.ensure_access(user_id, room_id).await?;
        Ok(self
            .deps
            .messages
            .list_for_room(room_id, Self::HISTORY_LIMIT)
            .await?)
    }

    /// 联系人列表：每个房间一个对端条目，带未读数、最近消息和在线标志，
    /// 按最近消息时间倒序。
    pub async fn contacts(&self, user_id: UserId) -> Result<Vec<ContactSummary>, ApplicationError> {
        let rooms = self.deps.rooms.list_for_user(user_id).await?;
        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            let participants = self.deps.rooms.participants(room.id).await?;
            let Some(contact) = participants.into_iter().find(|p| *p != user_id) else {
                continue;
            };

            let last_message = self.deps.messages.last_in_room(room.id).await?;
            let unread_count = self.deps.receipts.unread_count(room.id, user_id).await?;
            let presence = self.deps.presence.find(contact).await?;

            summaries.push(ContactSummary {
                user_id: contact,
                room_id: room.id,
                room_name: room.name,
                is_online: presence.as_ref().is_some_and(|p| p.is_online),
                last_seen: presence.map(|p| p.last_seen),
                last_message,
                unread_count,
            });
        }
        summaries.sort_by(|a, b| {
            let a_key = a.last_message.as_ref().map(|m| m.created_at);
            let b_key = b.last_message.as_ref().map(|m| m.created_at);
            b_key.cmp(&a_key)
        });
        Ok(summaries)
    }
}
