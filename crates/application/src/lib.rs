//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理访问控制、事务边界、
//! 以及对外部适配器（身份认证、广播总线、持久化存储）的抽象。

pub mod access;
pub mod auth;
pub mod bus;
pub mod clock;
pub mod error;
pub mod memory;
pub mod repository;
pub mod services;

pub use access::RoomAccessGuard;
pub use auth::{AuthError, Authenticator};
pub use bus::{BusError, EventBus, Group, LocalEventBus, Subscriber};
pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use memory::MemoryStore;
pub use repository::{
    ChatRoomRepository, MessageRepository, NotificationRepository, PresenceRepository,
    ReceiptRepository,
};
pub use services::{
    ChatService, ChatServiceDependencies, ContactSummary, DirectMessageRequest,
    NotificationService, NotificationServiceDependencies, PresenceService,
    PresenceServiceDependencies, ReceiptService, ReceiptServiceDependencies, SendMessageRequest,
};
