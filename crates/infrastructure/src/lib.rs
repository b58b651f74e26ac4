//! 基础设施层：Postgres 仓储实现与 Redis 广播总线。

pub mod db;
pub mod redis_bus;

pub use db::{Db, DbPool};
pub use redis_bus::RedisEventBus;
