//! Redis Pub/Sub 广播总线
//!
//! 多进程部署时的总线实现：分组对应一个 Redis 频道，发布走 PUBLISH，
//! 一个后台中继任务用模式订阅接收全部频道，把事件投递给本进程的
//! 分组成员表。进程自己发布的消息同样经由 Redis 回流投递，保证同一
//! 分组事件在所有进程看到一致的顺序。

use std::sync::Arc;
use std::time::Duration;

use application::bus::{BusError, EventBus, Group, GroupTable, Subscriber};
use async_trait::async_trait;
use domain::{ServerEvent, UserId};
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::Client;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const CHANNEL_PREFIX: &str = "bus:";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub struct RedisEventBus {
    manager: ConnectionManager,
    table: Arc<GroupTable>,
}

impl RedisEventBus {
    /// 建立 Redis 连接并启动订阅中继任务。
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = Client::open(url).map_err(|err| BusError::failed(err.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|err| BusError::failed(err.to_string()))?;

        let table = Arc::new(GroupTable::new());
        tokio::spawn(relay_loop(client, table.clone()));
        info!("redis event bus connected");

        Ok(Self { manager, table })
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn join(&self, group: Group, subscriber: Subscriber) -> Result<(), BusError> {
        self.table.join(group, subscriber).await;
        Ok(())
    }

    async fn leave(&self, group: &Group, session_id: Uuid) {
        self.table.leave(group, session_id).await;
    }

    async fn publish(&self, group: &Group, event: ServerEvent) -> Result<(), BusError> {
        let channel = format!("{CHANNEL_PREFIX}{group}");
        let payload =
            serde_json::to_string(&event).map_err(|err| BusError::failed(err.to_string()))?;

        // 瞬时故障重试一次，之后交给上层的尽力而为策略。
        let mut conn = self.manager.clone();
        let mut attempts = 0;
        loop {
            attempts += 1;
            match redis::cmd("PUBLISH")
                .arg(&channel)
                .arg(&payload)
                .query_async::<i64>(&mut conn)
                .await
            {
                Ok(_) => return Ok(()),
                Err(err) if attempts < 2 => {
                    warn!(channel = %channel, error = %err, "publish failed, retrying");
                }
                Err(err) => return Err(BusError::failed(err.to_string())),
            }
        }
    }

    async fn is_member(&self, group: &Group, user_id: UserId) -> bool {
        self.table.contains_user(group, user_id).await
    }

    async fn healthy(&self) -> bool {
        let mut conn = self.manager.clone();
        let cmd = redis::cmd("PING");
        let ping = cmd.query_async::<String>(&mut conn);
        matches!(timeout(HEALTH_TIMEOUT, ping).await, Ok(Ok(_)))
    }
}

/// 订阅中继：断线后重连并重新订阅，事件解析失败只丢弃单条。
async fn relay_loop(client: Client, table: Arc<GroupTable>) {
    let pattern = format!("{CHANNEL_PREFIX}*");
    loop {
        let mut pubsub = match client.get_async_pubsub().await {
            Ok(pubsub) => pubsub,
            Err(err) => {
                error!(error = %err, "pubsub connection failed");
                sleep(RECONNECT_DELAY).await;
                continue;
            }
        };
        if let Err(err) = pubsub.psubscribe(&pattern).await {
            error!(error = %err, "pattern subscribe failed");
            sleep(RECONNECT_DELAY).await;
            continue;
        }
        debug!(pattern = %pattern, "relay subscribed");

        let mut stream = pubsub.on_message();
        while let Some(message) = stream.next().await {
            let channel = message.get_channel_name();
            let Some(group) = Group::parse(channel.trim_start_matches(CHANNEL_PREFIX)) else {
                warn!(channel = %channel, "unrecognized channel");
                continue;
            };
            let payload: String = match message.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(channel = %channel, error = %err, "unreadable payload");
                    continue;
                }
            };
            match serde_json::from_str::<ServerEvent>(&payload) {
                Ok(event) => {
                    table.deliver(&group, &event).await;
                }
                Err(err) => {
                    warn!(channel = %channel, error = %err, "undecodable event");
                }
            }
        }
        warn!("relay stream ended, reconnecting");
        sleep(RECONNECT_DELAY).await;
    }
}
