//! 聊天室仓储实现

use std::sync::Arc;

use application::repository::ChatRoomRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{ApplicationRef, ChatRoom, RepositoryError, RoomId, RoomKind, UserId};
use sqlx::FromRow;
use uuid::Uuid;

use super::map_sqlx;
use crate::db::DbPool;

/// 数据库聊天室模型
#[derive(Debug, Clone, FromRow)]
struct DbChatRoom {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub application_ref: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl From<DbChatRoom> for ChatRoom {
    fn from(row: DbChatRoom) -> Self {
        let kind = match row.kind.as_str() {
            "direct" => RoomKind::Direct,
            "system" => RoomKind::System,
            _ => RoomKind::Group,
        };
        ChatRoom {
            id: RoomId::from(row.id),
            name: row.name,
            kind,
            application_ref: row.application_ref.map(ApplicationRef::from),
            created_at: row.created_at,
            updated_at: row.updated_at,
            is_active: row.is_active,
        }
    }
}

const ROOM_COLUMNS: &str = "id, name, kind, application_ref, created_at, updated_at, is_active";
const ROOM_COLUMNS_R: &str =
    "r.id, r.name, r.kind, r.application_ref, r.created_at, r.updated_at, r.is_active";

pub struct PostgresChatRoomRepository {
    pool: Arc<DbPool>,
}

impl PostgresChatRoomRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRoomRepository for PostgresChatRoomRepository {
    async fn create(
        &self,
        room: &ChatRoom,
        participants: &[UserId],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        sqlx::query(
            r#"INSERT INTO chat_rooms (id, name, kind, application_ref, created_at, updated_at, is_active)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(Uuid::from(room.id))
        .bind(&room.name)
        .bind(room.kind.as_str())
        .bind(room.application_ref.map(|r| r.0))
        .bind(room.created_at)
        .bind(room.updated_at)
        .bind(room.is_active)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        for participant in participants {
            sqlx::query(
                "INSERT INTO room_participants (room_id, user_id, joined_at) VALUES ($1, $2, $3)",
            )
            .bind(Uuid::from(room.id))
            .bind(Uuid::from(*participant))
            .bind(room.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)
    }

    async fn find_by_id(&self, room_id: RoomId) -> Result<Option<ChatRoom>, RepositoryError> {
        let row = sqlx::query_as::<_, DbChatRoom>(&format!(
            "SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE id = $1"
        ))
        .bind(Uuid::from(room_id))
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(ChatRoom::from))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<ChatRoom>, RepositoryError> {
        let rows = sqlx::query_as::<_, DbChatRoom>(&format!(
            r#"SELECT {ROOM_COLUMNS_R} FROM chat_rooms r
               JOIN room_participants p ON p.room_id = r.id
               WHERE p.user_id = $1 AND r.is_active
               ORDER BY r.updated_at DESC"#
        ))
        .bind(Uuid::from(user_id))
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(ChatRoom::from).collect())
    }

    async fn participants(&self, room_id: RoomId) -> Result<Vec<UserId>, RepositoryError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM room_participants WHERE room_id = $1")
                .bind(Uuid::from(room_id))
                .fetch_all(&*self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(|(id,)| UserId::from(id)).collect())
    }

    async fn is_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM room_participants WHERE room_id = $1 AND user_id = $2)",
        )
        .bind(Uuid::from(room_id))
        .bind(Uuid::from(user_id))
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(exists)
    }

    async fn find_direct_between(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<ChatRoom>, RepositoryError> {
        let row = sqlx::query_as::<_, DbChatRoom>(&format!(
            r#"SELECT {ROOM_COLUMNS_R} FROM chat_rooms r
               WHERE r.kind = 'direct' AND r.is_active
                 AND EXISTS(SELECT 1 FROM room_participants WHERE room_id = r.id AND user_id = $1)
                 AND EXISTS(SELECT 1 FROM room_participants WHERE room_id = r.id AND user_id = $2)
               LIMIT 1"#
        ))
        .bind(Uuid::from(a))
        .bind(Uuid::from(b))
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(ChatRoom::from))
    }

    async fn contacts_of(&self, user_id: UserId) -> Result<Vec<UserId>, RepositoryError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"SELECT DISTINCT other.user_id FROM room_participants own
               JOIN room_participants other ON other.room_id = own.room_id
               JOIN chat_rooms r ON r.id = own.room_id
               WHERE own.user_id = $1 AND other.user_id <> $1 AND r.is_active"#,
        )
        .bind(Uuid::from(user_id))
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(|(id,)| UserId::from(id)).collect())
    }
}
