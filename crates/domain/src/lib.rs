//! 招聘平台消息子系统核心领域模型
//!
//! 包含聊天室、消息、回执、在线状态和通知等核心实体，
//! 以及实时事件的线上格式定义。

pub mod chat_room;
pub mod errors;
pub mod events;
pub mod message;
pub mod notification;
pub mod presence;
pub mod receipt;
pub mod value_objects;

pub use chat_room::{ChatRoom, RoomKind};
pub use errors::{DomainError, RepositoryError};
pub use events::{ClientCommand, ServerEvent};
pub use message::ChatMessage;
pub use notification::{Notification, NotificationCategory};
pub use presence::UserPresence;
pub use receipt::MessageReceipt;
pub use value_objects::{
    ApplicationRef, MessageContent, MessageId, NotificationId, RoomId, Timestamp, UserId,
};
