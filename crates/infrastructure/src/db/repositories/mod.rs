//! Postgres 仓储实现。
//!
//! 每个仓储一个文件，行模型（`Db*` 结构）只在这一层出现，
//! 与领域实体的互转在各自文件里完成。

mod message_repository;
mod notification_repository;
mod presence_repository;
mod receipt_repository;
mod room_repository;

pub use message_repository::PostgresMessageRepository;
pub use notification_repository::PostgresNotificationRepository;
pub use presence_repository::PostgresPresenceRepository;
pub use receipt_repository::PostgresReceiptRepository;
pub use room_repository::PostgresChatRoomRepository;

use domain::RepositoryError;

pub(crate) fn map_sqlx(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
        other => RepositoryError::storage_with_source("database query failed", other),
    }
}
