//! 内存存储实现。
//!
//! 单进程部署和测试使用的仓储实现，全部数据放在一把读写锁后面，
//! 借助锁的互斥获得与数据库事务相同的原子性。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    ChatMessage, ChatRoom, MessageId, MessageReceipt, Notification, NotificationId,
    RepositoryError, RoomId, RoomKind, Timestamp, UserId, UserPresence,
};
use tokio::sync::RwLock;

use crate::repository::{
    ChatRoomRepository, MessageRepository, NotificationRepository, PresenceRepository,
    ReceiptRepository,
};

#[derive(Default)]
struct Inner {
    rooms: HashMap<RoomId, ChatRoom>,
    participants: HashMap<RoomId, Vec<UserId>>,
    messages: Vec<ChatMessage>,
    receipts: HashMap<(MessageId, UserId), MessageReceipt>,
    presence: HashMap<UserId, UserPresence>,
    notifications: Vec<Notification>,
}

/// 一个对象同时实现全部仓储接口，方便按 trait object 分发注入。
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRoomRepository for MemoryStore {
    async fn create(
        &self,
        room: &ChatRoom,
        participants: &[UserId],
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        if inner.rooms.contains_key(&room.id) {
            return Err(RepositoryError::Conflict);
        }
        inner.rooms.insert(room.id, room.clone());
        inner.participants.insert(room.id, participants.to_vec());
        Ok(())
    }

    async fn find_by_id(&self, room_id: RoomId) -> Result<Option<ChatRoom>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.rooms.get(&room_id).cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<ChatRoom>, RepositoryError> {
        let inner = self.inner.read().await;
        let mut rooms: Vec<ChatRoom> = inner
            .rooms
            .values()
            .filter(|room| room.is_active)
            .filter(|room| {
                inner
                    .participants
                    .get(&room.id)
                    .is_some_and(|p| p.contains(&user_id))
            })
            .cloned()
            .collect();
        rooms.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rooms)
    }

    async fn participants(&self, room_id: RoomId) -> Result<Vec<UserId>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.participants.get(&room_id).cloned().unwrap_or_default())
    }

    async fn is_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .participants
            .get(&room_id)
            .is_some_and(|p| p.contains(&user_id)))
    }

    async fn find_direct_between(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<ChatRoom>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rooms
            .values()
            .filter(|room| room.is_active && room.kind == RoomKind::Direct)
            .find(|room| {
                inner
                    .participants
                    .get(&room.id)
                    .is_some_and(|p| p.contains(&a) && p.contains(&b))
            })
            .cloned())
    }

    async fn contacts_of(&self, user_id: UserId) -> Result<Vec<UserId>, RepositoryError> {
        let inner = self.inner.read().await;
        let mut contacts = Vec::new();
        for (room_id, members) in &inner.participants {
            let active = inner.rooms.get(room_id).is_some_and(|r| r.is_active);
            if !active || !members.contains(&user_id) {
                continue;
            }
            for member in members {
                if *member != user_id && !contacts.contains(member) {
                    contacts.push(*member);
                }
            }
        }
        Ok(contacts)
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn create_with_receipts(
        &self,
        message: &ChatMessage,
        receipts: &[MessageReceipt],
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        let room = inner
            .rooms
            .get_mut(&message.room_id)
            .ok_or(RepositoryError::NotFound)?;
        room.touch(message.created_at);
        inner.messages.push(message.clone());
        for receipt in receipts {
            inner
                .receipts
                .insert((receipt.message_id, receipt.recipient_id), receipt.clone());
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        message_id: MessageId,
    ) -> Result<Option<ChatMessage>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.messages.iter().find(|m| m.id == message_id).cloned())
    }

    async fn list_for_room(
        &self,
        room_id: RoomId,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let inner = self.inner.read().await;
        let mut messages: Vec<ChatMessage> = inner
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        // 最近 N 条，按时间正序返回
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.truncate(limit.max(0) as usize);
        messages.reverse();
        Ok(messages)
    }

    async fn last_in_room(&self, room_id: RoomId) -> Result<Option<ChatMessage>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .max_by_key(|m| m.created_at)
            .cloned())
    }
}

impl Inner {
    fn message_room(&self, message_id: MessageId) -> Option<RoomId> {
        self.messages
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| m.room_id)
    }

    fn room_message_ids(&self, room_id: RoomId) -> Vec<MessageId> {
        self.messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .map(|m| m.id)
            .collect()
    }
}

#[async_trait]
impl ReceiptRepository for MemoryStore {
    async fn mark_room_delivered(
        &self,
        room_id: RoomId,
        recipient_id: UserId,
        at: Timestamp,
    ) -> Result<Vec<MessageReceipt>, RepositoryError> {
        let mut inner = self.inner.write().await;
        let message_ids = inner.room_message_ids(room_id);
        let mut transitioned = Vec::new();
        for message_id in message_ids {
            if let Some(receipt) = inner.receipts.get_mut(&(message_id, recipient_id)) {
                if receipt.mark_delivered(at) {
                    transitioned.push(receipt.clone());
                }
            }
        }
        Ok(transitioned)
    }

    async fn mark_delivered(
        &self,
        message_id: MessageId,
        recipient_id: UserId,
        at: Timestamp,
    ) -> Result<Option<MessageReceipt>, RepositoryError> {
        let mut inner = self.inner.write().await;
        let Some(receipt) = inner.receipts.get_mut(&(message_id, recipient_id)) else {
            return Ok(None);
        };
        if receipt.mark_delivered(at) {
            Ok(Some(receipt.clone()))
        } else {
            Ok(None)
        }
    }

    async fn mark_room_read(
        &self,
        room_id: RoomId,
        recipient_id: UserId,
        at: Timestamp,
    ) -> Result<u64, RepositoryError> {
        let mut inner = self.inner.write().await;
        let message_ids = inner.room_message_ids(room_id);
        let mut transitioned = 0;
        for message_id in message_ids {
            if let Some(receipt) = inner.receipts.get_mut(&(message_id, recipient_id)) {
                if receipt.mark_read(at) {
                    transitioned += 1;
                }
            }
        }
        Ok(transitioned)
    }

    async fn unread_count(
        &self,
        room_id: RoomId,
        recipient_id: UserId,
    ) -> Result<i64, RepositoryError> {
        let inner = self.inner.read().await;
        let count = inner
            .receipts
            .values()
            .filter(|r| r.recipient_id == recipient_id && !r.read)
            .filter(|r| inner.message_room(r.message_id) == Some(room_id))
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl PresenceRepository for MemoryStore {
    async fn find(&self, user_id: UserId) -> Result<Option<UserPresence>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.presence.get(&user_id).cloned())
    }

    async fn upsert(&self, presence: &UserPresence) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        inner.presence.insert(presence.user_id, presence.clone());
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn create(&self, notification: &Notification) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        inner.notifications.push(notification.clone());
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let inner = self.inner.read().await;
        let mut list: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list.truncate(limit.max(0) as usize);
        Ok(list)
    }

    async fn mark_all_read(&self, user_id: UserId, at: Timestamp) -> Result<u64, RepositoryError> {
        let mut inner = self.inner.write().await;
        let mut transitioned = 0;
        for notification in inner
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id)
        {
            if notification.mark_read(at) {
                transitioned += 1;
            }
        }
        Ok(transitioned)
    }

    async fn find_by_id(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.notifications.iter().find(|n| n.id == id).cloned())
    }
}
