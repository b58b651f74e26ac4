//! 消息仓储实现

use std::sync::Arc;

use application::repository::MessageRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    ChatMessage, MessageContent, MessageId, MessageReceipt, RepositoryError, RoomId, UserId,
};
use sqlx::FromRow;
use uuid::Uuid;

use super::map_sqlx;
use crate::db::DbPool;

/// 数据库消息模型
#[derive(Debug, Clone, FromRow)]
struct DbChatMessage {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbChatMessage> for ChatMessage {
    type Error = RepositoryError;

    fn try_from(row: DbChatMessage) -> Result<Self, Self::Error> {
        // 落库前内容已通过校验，这里失败意味着数据被绕过写入。
        let content = MessageContent::new(row.content)
            .map_err(|err| RepositoryError::storage_with_source("invalid stored content", err))?;
        Ok(ChatMessage {
            id: MessageId::from(row.id),
            room_id: RoomId::from(row.room_id),
            sender_id: row.sender_id.map(UserId::from),
            content,
            created_at: row.created_at,
        })
    }
}

const MESSAGE_COLUMNS: &str = "id, room_id, sender_id, content, created_at";

pub struct PostgresMessageRepository {
    pool: Arc<DbPool>,
}

impl PostgresMessageRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn create_with_receipts(
        &self,
        message: &ChatMessage,
        receipts: &[MessageReceipt],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        sqlx::query(
            r#"INSERT INTO chat_messages (id, room_id, sender_id, content, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.room_id))
        .bind(message.sender_id.map(Uuid::from))
        .bind(message.content.as_str())
        .bind(message.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        for receipt in receipts {
            sqlx::query(
                r#"INSERT INTO message_receipts (message_id, recipient_id, delivered, delivered_at, is_read, read_at)
                   VALUES ($1, $2, $3, $4, $5, $6)"#,
            )
            .bind(Uuid::from(receipt.message_id))
            .bind(Uuid::from(receipt.recipient_id))
            .bind(receipt.delivered)
            .bind(receipt.delivered_at)
            .bind(receipt.read)
            .bind(receipt.read_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }

        sqlx::query("UPDATE chat_rooms SET updated_at = $2 WHERE id = $1")
            .bind(Uuid::from(message.room_id))
            .bind(message.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)
    }

    async fn find_by_id(
        &self,
        message_id: MessageId,
    ) -> Result<Option<ChatMessage>, RepositoryError> {
        let row = sqlx::query_as::<_, DbChatMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = $1"
        ))
        .bind(Uuid::from(message_id))
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(ChatMessage::try_from).transpose()
    }

    async fn list_for_room(
        &self,
        room_id: RoomId,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        // 取最近 N 条，但按时间正序返回
        let rows = sqlx::query_as::<_, DbChatMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM (
                 SELECT {MESSAGE_COLUMNS} FROM chat_messages
                 WHERE room_id = $1 ORDER BY created_at DESC LIMIT $2
             ) latest ORDER BY created_at ASC"
        ))
        .bind(Uuid::from(room_id))
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    async fn last_in_room(&self, room_id: RoomId) -> Result<Option<ChatMessage>, RepositoryError> {
        let row = sqlx::query_as::<_, DbChatMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE room_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(Uuid::from(room_id))
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(ChatMessage::try_from).transpose()
    }
}
