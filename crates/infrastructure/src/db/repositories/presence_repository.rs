//! 在线状态仓储实现

use std::sync::Arc;

use application::repository::PresenceRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{RepositoryError, RoomId, UserId, UserPresence};
use sqlx::FromRow;
use uuid::Uuid;

use super::map_sqlx;
use crate::db::DbPool;

/// 数据库在线状态模型
#[derive(Debug, Clone, FromRow)]
struct DbPresence {
    pub user_id: Uuid,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub typing_in_room: Option<Uuid>,
    pub last_typing_update: Option<DateTime<Utc>>,
}

impl From<DbPresence> for UserPresence {
    fn from(row: DbPresence) -> Self {
        UserPresence {
            user_id: UserId::from(row.user_id),
            is_online: row.is_online,
            last_seen: row.last_seen,
            typing_in_room: row.typing_in_room.map(RoomId::from),
            last_typing_update: row.last_typing_update,
        }
    }
}

pub struct PostgresPresenceRepository {
    pool: Arc<DbPool>,
}

impl PostgresPresenceRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PresenceRepository for PostgresPresenceRepository {
    async fn find(&self, user_id: UserId) -> Result<Option<UserPresence>, RepositoryError> {
        let row = sqlx::query_as::<_, DbPresence>(
            r#"SELECT user_id, is_online, last_seen, typing_in_room, last_typing_update
               FROM user_presence WHERE user_id = $1"#,
        )
        .bind(Uuid::from(user_id))
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(UserPresence::from))
    }

    async fn upsert(&self, presence: &UserPresence) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO user_presence (user_id, is_online, last_seen, typing_in_room, last_typing_update)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (user_id) DO UPDATE
               SET is_online = EXCLUDED.is_online,
                   last_seen = EXCLUDED.last_seen,
                   typing_in_room = EXCLUDED.typing_in_room,
                   last_typing_update = EXCLUDED.last_typing_update"#,
        )
        .bind(Uuid::from(presence.user_id))
        .bind(presence.is_online)
        .bind(presence.last_seen)
        .bind(presence.typing_in_room.map(Uuid::from))
        .bind(presence.last_typing_update)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }
}
