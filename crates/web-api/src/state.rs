use std::sync::Arc;

use application::{
    Authenticator, ChatService, EventBus, NotificationService, PresenceService, ReceiptService,
    RoomAccessGuard,
};

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub receipt_service: Arc<ReceiptService>,
    pub presence_service: Arc<PresenceService>,
    pub notification_service: Arc<NotificationService>,
    pub guard: RoomAccessGuard,
    pub bus: Arc<dyn EventBus>,
    pub authenticator: Arc<dyn Authenticator>,
}
