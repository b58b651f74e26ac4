//! 集成测试脚手架：内存存储 + 进程内总线组装出完整路由。

use std::net::SocketAddr;
use std::sync::Arc;

use application::{
    Authenticator, ChatService, ChatServiceDependencies, Clock, EventBus, LocalEventBus,
    MemoryStore, NotificationService, NotificationServiceDependencies, PresenceService,
    PresenceServiceDependencies, ReceiptService, ReceiptServiceDependencies, RoomAccessGuard,
    SystemClock,
};
use application::repository::ChatRoomRepository;
use domain::{ChatRoom, RoomId, RoomKind, UserId};
use tokio::net::TcpListener;
use uuid::Uuid;
use web_api::{router, AppState, JwtConfig, JwtService};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub struct TestApp {
    pub addr: SocketAddr,
    pub store: MemoryStore,
    pub state: AppState,
    pub jwt: JwtService,
}

impl TestApp {
    /// 组装完整的应用并在随机端口上启动。
    pub async fn spawn() -> Self {
        let store = MemoryStore::new();
        let bus: Arc<dyn EventBus> = Arc::new(LocalEventBus::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let rooms: Arc<dyn ChatRoomRepository> = Arc::new(store.clone());
        let guard = RoomAccessGuard::new(rooms.clone());
        let jwt = JwtService::new(JwtConfig {
            secret: TEST_SECRET.to_string(),
            expiration_hours: 1,
        });

        let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
            rooms: rooms.clone(),
            messages: Arc::new(store.clone()),
            receipts: Arc::new(store.clone()),
            presence: Arc::new(store.clone()),
            guard: guard.clone(),
            bus: bus.clone(),
            clock: clock.clone(),
        }));
        let receipt_service = Arc::new(ReceiptService::new(ReceiptServiceDependencies {
            receipts: Arc::new(store.clone()),
            messages: Arc::new(store.clone()),
            rooms: rooms.clone(),
            guard: guard.clone(),
            bus: bus.clone(),
            clock: clock.clone(),
        }));
        let presence_service = Arc::new(PresenceService::new(PresenceServiceDependencies {
            presence: Arc::new(store.clone()),
            rooms: rooms.clone(),
            guard: guard.clone(),
            bus: bus.clone(),
            clock: clock.clone(),
        }));
        let notification_service = Arc::new(NotificationService::new(
            NotificationServiceDependencies {
                notifications: Arc::new(store.clone()),
                bus: bus.clone(),
                clock,
            },
        ));

        let authenticator: Arc<dyn Authenticator> = Arc::new(jwt.clone());
        let state = AppState {
            chat_service,
            receipt_service,
            presence_service,
            notification_service,
            guard,
            bus,
            authenticator,
        };

        let app = router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.ok();
        });

        Self {
            addr,
            store,
            state,
            jwt,
        }
    }

    pub fn token_for(&self, user_id: UserId) -> String {
        self.jwt.generate_token(Uuid::from(user_id)).expect("token")
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    /// 直接在存储里准备一个房间。
    pub async fn seed_room(&self, kind: RoomKind, participants: &[UserId]) -> ChatRoom {
        let room = ChatRoom::new(
            RoomId::from(Uuid::new_v4()),
            "recruiter chat",
            kind,
            None,
            chrono::Utc::now(),
        )
        .expect("room");
        self.store.create(&room, participants).await.expect("seed");
        room
    }
}

pub fn user() -> UserId {
    UserId::from(Uuid::new_v4())
}
