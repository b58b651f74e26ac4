//! 广播总线抽象。
//!
//! 进程内的发布/订阅设施，支持命名分组：每个连接可以加入/离开分组，
//! 向分组发布的事件会异步送达当前所有成员。总线的分组成员表是唯一的
//! 跨会话运行时共享状态，完全由总线实现持有。传输层可替换
//! （内存实现或分布式 Pub/Sub）。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{RoomId, ServerEvent, UserId};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// 命名分组。个人分组承载回执、通知和在线状态变化，
/// 房间分组承载房间内的消息和输入指示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    User(UserId),
    Room(RoomId),
}

impl Group {
    pub fn user(id: UserId) -> Self {
        Group::User(id)
    }

    pub fn room(id: RoomId) -> Self {
        Group::Room(id)
    }

    /// 解析 `user:{uuid}` / `room:{uuid}` 形式的分组名（Display 的逆操作）。
    pub fn parse(value: &str) -> Option<Self> {
        let (kind, id) = value.split_once(':')?;
        let id = Uuid::parse_str(id).ok()?;
        match kind {
            "user" => Some(Group::User(UserId::from(id))),
            "room" => Some(Group::Room(RoomId::from(id))),
            _ => None,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::User(id) => write!(f, "user:{id}"),
            Group::Room(id) => write!(f, "room:{id}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BusError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 一个连接会话在总线上的身份：会话自己的出站通道加上它代表的用户。
/// 同一个订阅者可以加入任意多个分组，事件按发布顺序进入同一个通道。
#[derive(Clone)]
pub struct Subscriber {
    session_id: Uuid,
    user_id: UserId,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

impl Subscriber {
    pub fn new(user_id: UserId) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                session_id: Uuid::new_v4(),
                user_id,
                sender,
            },
            receiver,
        )
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    fn deliver(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// 广播总线接口。
///
/// 分组成员资格只是此前一次成功鉴权的缓存，不是事实来源：
/// 每条命令仍然必须重新走访问检查。
#[async_trait]
pub trait EventBus: Send + Sync {
    /// 把订阅者加入分组。
    async fn join(&self, group: Group, subscriber: Subscriber) -> Result<(), BusError>;

    /// 把会话从分组移除。对不在分组内的会话是空操作。
    async fn leave(&self, group: &Group, session_id: Uuid);

    /// 向分组的当前全部成员发布事件。空分组是成功的空操作。
    async fn publish(&self, group: &Group, event: ServerEvent) -> Result<(), BusError>;

    /// 指定用户当前是否有会话在分组内。
    async fn is_member(&self, group: &Group, user_id: UserId) -> bool;

    /// 总线自身的健康状况，连接建立时写入 welcome 事件。
    async fn healthy(&self) -> bool;
}

/// 分组成员表。内存总线直接使用它投递；分布式实现用它管理
/// 本进程内的订阅者，跨进程投递走外部传输。
#[derive(Default)]
pub struct GroupTable {
    groups: RwLock<HashMap<Group, Vec<Subscriber>>>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn join(&self, group: Group, subscriber: Subscriber) {
        let mut groups = self.groups.write().await;
        groups.entry(group).or_default().push(subscriber);
    }

    pub async fn leave(&self, group: &Group, session_id: Uuid) {
        let mut groups = self.groups.write().await;
        if let Some(members) = groups.get_mut(group) {
            members.retain(|m| m.session_id != session_id);
            if members.is_empty() {
                groups.remove(group);
            }
        }
    }

    /// 投递给分组的全部成员，顺带清理已断开的通道。返回触达的会话数。
    pub async fn deliver(&self, group: &Group, event: &ServerEvent) -> usize {
        let mut groups = self.groups.write().await;
        let Some(members) = groups.get_mut(group) else {
            return 0;
        };

        let mut reached = 0;
        members.retain(|m| {
            if m.deliver(event.clone()) {
                reached += 1;
                true
            } else {
                false
            }
        });
        if members.is_empty() {
            groups.remove(group);
        }
        reached
    }

    pub async fn contains_user(&self, group: &Group, user_id: UserId) -> bool {
        let groups = self.groups.read().await;
        groups
            .get(group)
            .map(|members| members.iter().any(|m| m.user_id == user_id))
            .unwrap_or(false)
    }
}

/// 内存实现的广播总线，单进程部署用，也是测试的默认实现。
#[derive(Clone, Default)]
pub struct LocalEventBus {
    table: Arc<GroupTable>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventBus for LocalEventBus {
    async fn join(&self, group: Group, subscriber: Subscriber) -> Result<(), BusError> {
        self.table.join(group, subscriber).await;
        Ok(())
    }

    async fn leave(&self, group: &Group, session_id: Uuid) {
        self.table.leave(group, session_id).await;
    }

    async fn publish(&self, group: &Group, event: ServerEvent) -> Result<(), BusError> {
        self.table.deliver(group, &event).await;
        Ok(())
    }

    async fn is_member(&self, group: &Group, user_id: UserId) -> bool {
        self.table.contains_user(group, user_id).await
    }

    async fn healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(code: &str) -> ServerEvent {
        ServerEvent::Error {
            code: code.to_string(),
            message: String::new(),
        }
    }

    #[tokio::test]
    async fn publish_reaches_all_group_members_in_order() {
        let bus = LocalEventBus::new();
        let user_a = UserId::from(Uuid::new_v4());
        let user_b = UserId::from(Uuid::new_v4());
        let room = Group::room(RoomId::from(Uuid::new_v4()));

        let (sub_a, mut rx_a) = Subscriber::new(user_a);
        let (sub_b, mut rx_b) = Subscriber::new(user_b);
        bus.join(room, sub_a).await.unwrap();
        bus.join(room, sub_b).await.unwrap();

        bus.publish(&room, event("first")).await.unwrap();
        bus.publish(&room, event("second")).await.unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.recv().await.unwrap() {
                ServerEvent::Error { code, .. } => assert_eq!(code, "first"),
                other => panic!("unexpected event: {other:?}"),
            }
            match rx.recv().await.unwrap() {
                ServerEvent::Error { code, .. } => assert_eq!(code, "second"),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn publish_to_empty_group_is_noop() {
        let bus = LocalEventBus::new();
        let group = Group::user(UserId::from(Uuid::new_v4()));
        assert!(bus.publish(&group, event("x")).await.is_ok());
    }

    #[tokio::test]
    async fn membership_follows_join_and_leave() {
        let bus = LocalEventBus::new();
        let user = UserId::from(Uuid::new_v4());
        let room = Group::room(RoomId::from(Uuid::new_v4()));

        let (sub, _rx) = Subscriber::new(user);
        let session_id = sub.session_id();

        assert!(!bus.is_member(&room, user).await);
        bus.join(room, sub).await.unwrap();
        assert!(bus.is_member(&room, user).await);
        bus.leave(&room, session_id).await;
        assert!(!bus.is_member(&room, user).await);
    }

    #[tokio::test]
    async fn leaving_one_group_keeps_other_memberships() {
        let bus = LocalEventBus::new();
        let user = UserId::from(Uuid::new_v4());
        let personal = Group::user(user);
        let room = Group::room(RoomId::from(Uuid::new_v4()));

        let (sub, mut rx) = Subscriber::new(user);
        let session_id = sub.session_id();
        bus.join(personal, sub.clone()).await.unwrap();
        bus.join(room, sub).await.unwrap();

        bus.leave(&room, session_id).await;

        bus.publish(&personal, event("still-here")).await.unwrap();
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn closed_subscribers_are_pruned_on_publish() {
        let bus = LocalEventBus::new();
        let user = UserId::from(Uuid::new_v4());
        let group = Group::user(user);

        let (sub, rx) = Subscriber::new(user);
        bus.join(group, sub).await.unwrap();
        drop(rx);

        bus.publish(&group, event("gone")).await.unwrap();
        assert!(!bus.is_member(&group, user).await);
    }
}
