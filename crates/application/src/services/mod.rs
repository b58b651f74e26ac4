mod chat_service;
mod notification_service;
mod presence_service;
mod receipt_service;

#[cfg(test)]
mod tests;

#[cfg(test)]
mod receipt_service_tests;

pub use chat_service::{
    ChatService, ChatServiceDependencies, ContactSummary, DirectMessageRequest, SendMessageRequest,
};
pub use notification_service::{NotificationService, NotificationServiceDependencies};
pub use presence_service::{PresenceService, PresenceServiceDependencies};
pub use receipt_service::{ReceiptService, ReceiptServiceDependencies};
