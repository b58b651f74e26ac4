//! 回执仓储实现
//!
//! 全部更新语句都带状态前置条件（delivered = FALSE / is_read = FALSE），
//! 状态机的单向推进由数据库保证，并发重复调用天然幂等。

use std::sync::Arc;

use application::repository::ReceiptRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{MessageId, MessageReceipt, RepositoryError, RoomId, Timestamp, UserId};
use sqlx::FromRow;
use uuid::Uuid;

use super::map_sqlx;
use crate::db::DbPool;

/// 数据库回执模型
#[derive(Debug, Clone, FromRow)]
struct DbReceipt {
    pub message_id: Uuid,
    pub recipient_id: Uuid,
    pub delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

impl From<DbReceipt> for MessageReceipt {
    fn from(row: DbReceipt) -> Self {
        MessageReceipt {
            message_id: MessageId::from(row.message_id),
            recipient_id: UserId::from(row.recipient_id),
            delivered: row.delivered,
            delivered_at: row.delivered_at,
            read: row.is_read,
            read_at: row.read_at,
        }
    }
}

const RECEIPT_COLUMNS: &str =
    "mr.message_id, mr.recipient_id, mr.delivered, mr.delivered_at, mr.is_read, mr.read_at";

pub struct PostgresReceiptRepository {
    pool: Arc<DbPool>,
}

impl PostgresReceiptRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReceiptRepository for PostgresReceiptRepository {
    async fn mark_room_delivered(
        &self,
        room_id: RoomId,
        recipient_id: UserId,
        at: Timestamp,
    ) -> Result<Vec<MessageReceipt>, RepositoryError> {
        let rows = sqlx::query_as::<_, DbReceipt>(&format!(
            r#"UPDATE message_receipts mr
               SET delivered = TRUE, delivered_at = $3
               FROM chat_messages m
               WHERE mr.message_id = m.id
                 AND m.room_id = $1
                 AND mr.recipient_id = $2
                 AND mr.delivered = FALSE
               RETURNING {RECEIPT_COLUMNS}"#
        ))
        .bind(Uuid::from(room_id))
        .bind(Uuid::from(recipient_id))
        .bind(at)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(MessageReceipt::from).collect())
    }

    async fn mark_delivered(
        &self,
        message_id: MessageId,
        recipient_id: UserId,
        at: Timestamp,
    ) -> Result<Option<MessageReceipt>, RepositoryError> {
        let row = sqlx::query_as::<_, DbReceipt>(&format!(
            r#"UPDATE message_receipts mr
               SET delivered = TRUE, delivered_at = $3
               WHERE mr.message_id = $1
                 AND mr.recipient_id = $2
                 AND mr.delivered = FALSE
               RETURNING {RECEIPT_COLUMNS}"#
        ))
        .bind(Uuid::from(message_id))
        .bind(Uuid::from(recipient_id))
        .bind(at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(MessageReceipt::from))
    }

    async fn mark_room_read(
        &self,
        room_id: RoomId,
        recipient_id: UserId,
        at: Timestamp,
    ) -> Result<u64, RepositoryError> {
        // 已读隐含已送达：delivered_at 只在尚未送达时跟随 read_at。
        let result = sqlx::query(
            r#"UPDATE message_receipts mr
               SET is_read = TRUE,
                   read_at = $3,
                   delivered = TRUE,
                   delivered_at = COALESCE(mr.delivered_at, $3)
               FROM chat_messages m
               WHERE mr.message_id = m.id
                 AND m.room_id = $1
                 AND mr.recipient_id = $2
                 AND mr.is_read = FALSE"#,
        )
        .bind(Uuid::from(room_id))
        .bind(Uuid::from(recipient_id))
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn unread_count(
        &self,
        room_id: RoomId,
        recipient_id: UserId,
    ) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM message_receipts mr
               JOIN chat_messages m ON m.id = mr.message_id
               WHERE m.room_id = $1 AND mr.recipient_id = $2 AND mr.is_read = FALSE"#,
        )
        .bind(Uuid::from(room_id))
        .bind(Uuid::from(recipient_id))
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(count)
    }
}
