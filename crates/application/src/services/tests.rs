//! 服务层测试共用的组装脚手架：内存存储 + 进程内总线。

use std::sync::Arc;

use domain::{ChatRoom, RoomId, RoomKind, ServerEvent, UserId};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::access::RoomAccessGuard;
use crate::bus::{EventBus, Group, LocalEventBus, Subscriber};
use crate::clock::{Clock, SystemClock};
use crate::memory::MemoryStore;
use crate::services::{
    ChatService, ChatServiceDependencies, NotificationService, NotificationServiceDependencies,
    PresenceService, PresenceServiceDependencies, ReceiptService, ReceiptServiceDependencies,
};

pub struct TestEnv {
    pub store: MemoryStore,
    pub bus: Arc<LocalEventBus>,
    pub chat: ChatService,
    pub receipts: ReceiptService,
    pub presence: PresenceService,
    pub notifications: NotificationService,
}

impl TestEnv {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let bus = Arc::new(LocalEventBus::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let dyn_bus: Arc<dyn EventBus> = bus.clone();
        let rooms: Arc<dyn crate::repository::ChatRoomRepository> = Arc::new(store.clone());
        let guard = RoomAccessGuard::new(rooms.clone());

        let chat = ChatService::new(ChatServiceDependencies {
            rooms: rooms.clone(),
            messages: Arc::new(store.clone()),
            receipts: Arc::new(store.clone()),
            presence: Arc::new(store.clone()),
            guard: guard.clone(),
            bus: dyn_bus.clone(),
            clock: clock.clone(),
        });
        let receipts = ReceiptService::new(ReceiptServiceDependencies {
            receipts: Arc::new(store.clone()),
            messages: Arc::new(store.clone()),
            rooms: rooms.clone(),
            guard: guard.clone(),
            bus: dyn_bus.clone(),
            clock: clock.clone(),
        });
        let presence = PresenceService::new(PresenceServiceDependencies {
            presence: Arc::new(store.clone()),
            rooms: rooms.clone(),
            guard,
            bus: dyn_bus.clone(),
            clock: clock.clone(),
        });
        let notifications = NotificationService::new(NotificationServiceDependencies {
            notifications: Arc::new(store.clone()),
            bus: dyn_bus,
            clock,
        });

        Self {
            store,
            bus,
            chat,
            receipts,
            presence,
            notifications,
        }
    }

    pub async fn make_room(&self, kind: RoomKind, participants: &[UserId]) -> ChatRoom {
        use crate::repository::ChatRoomRepository;
        let room = ChatRoom::new(
            RoomId::from(Uuid::new_v4()),
            "test room",
            kind,
            None,
            chrono::Utc::now(),
        )
        .unwrap();
        self.store.create(&room, participants).await.unwrap();
        room
    }

    /// 把用户的一个新会话加入指定分组，返回它的事件接收端。
    pub async fn listen(&self, user_id: UserId, groups: &[Group]) -> UnboundedReceiver<ServerEvent> {
        let (subscriber, rx) = Subscriber::new(user_id);
        for group in groups {
            self.bus.join(*group, subscriber.clone()).await.unwrap();
        }
        rx
    }
}

pub fn user() -> UserId {
    UserId::from(Uuid::new_v4())
}

/// 取走已经送达的全部事件（事件在 publish await 返回时已入通道）。
pub fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
