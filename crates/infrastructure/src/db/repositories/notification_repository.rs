//! 通知仓储实现

use std::sync::Arc;

use application::repository::NotificationRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Notification, NotificationCategory, NotificationId, RepositoryError, Timestamp, UserId};
use sqlx::FromRow;
use uuid::Uuid;

use super::map_sqlx;
use crate::db::DbPool;

/// 数据库通知模型
#[derive(Debug, Clone, FromRow)]
struct DbNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

impl From<DbNotification> for Notification {
    fn from(row: DbNotification) -> Self {
        let category = match row.category.as_str() {
            "job_application" => NotificationCategory::JobApplication,
            "application_status" => NotificationCategory::ApplicationStatus,
            "job_invitation" => NotificationCategory::JobInvitation,
            "verification_status" => NotificationCategory::VerificationStatus,
            "message" => NotificationCategory::Message,
            _ => NotificationCategory::General,
        };
        Notification {
            id: NotificationId::from(row.id),
            user_id: UserId::from(row.user_id),
            content: row.content,
            category,
            created_at: row.created_at,
            read: row.is_read,
            read_at: row.read_at,
        }
    }
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, content, category, created_at, is_read, read_at";

pub struct PostgresNotificationRepository {
    pool: Arc<DbPool>,
}

impl PostgresNotificationRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO notifications (id, user_id, content, category, created_at, is_read, read_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(Uuid::from(notification.id))
        .bind(Uuid::from(notification.user_id))
        .bind(&notification.content)
        .bind(notification.category.as_str())
        .bind(notification.created_at)
        .bind(notification.read)
        .bind(notification.read_at)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query_as::<_, DbNotification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(Uuid::from(user_id))
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_all_read(&self, user_id: UserId, at: Timestamp) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = $2 WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(Uuid::from(user_id))
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn find_by_id(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, RepositoryError> {
        let row = sqlx::query_as::<_, DbNotification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Notification::from))
    }
}
