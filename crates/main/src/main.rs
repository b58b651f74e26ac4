//! 主应用程序入口
//!
//! 组装存储、广播总线和用例服务，启动 Axum Web API 服务。

use std::sync::Arc;

use application::{
    Authenticator, ChatService, ChatServiceDependencies, Clock, EventBus, LocalEventBus,
    NotificationService, NotificationServiceDependencies, PresenceService,
    PresenceServiceDependencies, ReceiptService, ReceiptServiceDependencies, RoomAccessGuard,
    SystemClock,
};
use application::repository::ChatRoomRepository;
use config::AppConfig;
use infrastructure::db::repositories::{
    PostgresChatRoomRepository, PostgresMessageRepository, PostgresNotificationRepository,
    PostgresPresenceRepository, PostgresReceiptRepository,
};
use infrastructure::{Db, RedisEventBus};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env_with_defaults();
    config.validate()?;

    tracing::info!(
        database = config.database.url.split('@').next_back().unwrap_or("unknown"),
        "connecting to database"
    );
    let pool = Arc::new(
        Db::create_pool(&config.database.url, config.database.max_connections).await?,
    );

    // 运行迁移
    sqlx::migrate!("../../migrations").run(&*pool).await?;

    // 仓储
    let rooms: Arc<dyn ChatRoomRepository> =
        Arc::new(PostgresChatRoomRepository::new(pool.clone()));
    let messages = Arc::new(PostgresMessageRepository::new(pool.clone()));
    let receipts = Arc::new(PostgresReceiptRepository::new(pool.clone()));
    let presence = Arc::new(PostgresPresenceRepository::new(pool.clone()));
    let notifications = Arc::new(PostgresNotificationRepository::new(pool));

    // 广播总线：配置了 Redis 时用 Pub/Sub，否则进程内总线
    let bus: Arc<dyn EventBus> = match &config.broadcast.redis_url {
        Some(url) => {
            tracing::info!("using redis event bus");
            Arc::new(RedisEventBus::connect(url).await.map_err(|err| {
                anyhow::anyhow!("redis event bus connection failed: {err}")
            })?)
        }
        None => {
            tracing::info!("using in-process event bus");
            Arc::new(LocalEventBus::new())
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let guard = RoomAccessGuard::new(rooms.clone());

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        rooms: rooms.clone(),
        messages: messages.clone(),
        receipts: receipts.clone(),
        presence: presence.clone(),
        guard: guard.clone(),
        bus: bus.clone(),
        clock: clock.clone(),
    }));
    let receipt_service = Arc::new(ReceiptService::new(ReceiptServiceDependencies {
        receipts,
        messages,
        rooms: rooms.clone(),
        guard: guard.clone(),
        bus: bus.clone(),
        clock: clock.clone(),
    }));
    let presence_service = Arc::new(PresenceService::new(PresenceServiceDependencies {
        presence,
        rooms,
        guard: guard.clone(),
        bus: bus.clone(),
        clock: clock.clone(),
    }));
    let notification_service = Arc::new(NotificationService::new(
        NotificationServiceDependencies {
            notifications,
            bus: bus.clone(),
            clock,
        },
    ));

    let jwt_service = JwtService::new(config.jwt.clone());
    let authenticator: Arc<dyn Authenticator> = Arc::new(jwt_service);

    let state = AppState {
        chat_service,
        receipt_service,
        presence_service,
        notification_service,
        guard,
        bus,
        authenticator,
    };

    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %addr, "messaging server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
