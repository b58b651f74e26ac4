//! 持久化仓储接口。
//!
//! 应用层只依赖这些 trait，具体实现（Postgres 或测试用的内存存储）
//! 由组装层注入。

use async_trait::async_trait;
use domain::{
    ChatMessage, ChatRoom, MessageId, MessageReceipt, Notification, NotificationId,
    RepositoryError, RoomId, Timestamp, UserId, UserPresence,
};

/// 聊天室及其参与者集合。
#[async_trait]
pub trait ChatRoomRepository: Send + Sync {
    /// 创建房间并写入参与者集合。
    async fn create(&self, room: &ChatRoom, participants: &[UserId])
        -> Result<(), RepositoryError>;

    async fn find_by_id(&self, room_id: RoomId) -> Result<Option<ChatRoom>, RepositoryError>;

    /// 用户参与的全部活跃房间，按 `updated_at` 倒序。
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<ChatRoom>, RepositoryError>;

    async fn participants(&self, room_id: RoomId) -> Result<Vec<UserId>, RepositoryError>;

    async fn is_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError>;

    /// 查找两人之间已有的活跃 direct 房间。
    async fn find_direct_between(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<ChatRoom>, RepositoryError>;

    /// 用户在所有房间里的对端参与者集合（去重，不含本人）。
    async fn contacts_of(&self, user_id: UserId) -> Result<Vec<UserId>, RepositoryError>;
}

/// 消息仓储。消息不可变，落库后只读。
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 原子写入：消息、每个接收者的初始回执、房间 `updated_at` 刷新，
    /// 三者同一事务。kind 决定参与者校验已在上层完成。
    async fn create_with_receipts(
        &self,
        message: &ChatMessage,
        receipts: &[MessageReceipt],
    ) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        message_id: MessageId,
    ) -> Result<Option<ChatMessage>, RepositoryError>;

    /// 房间消息历史，按 `created_at` 升序。
    async fn list_for_room(
        &self,
        room_id: RoomId,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, RepositoryError>;

    /// 房间最新一条消息，联系人列表的预览用。
    async fn last_in_room(&self, room_id: RoomId) -> Result<Option<ChatMessage>, RepositoryError>;
}

/// 送达/已读回执仓储。更新都是集合化的幂等操作。
#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    /// 把该用户在房间内所有未送达回执标记为已送达。
    /// 返回实际发生转换的回执（按消息的发送者聚合由上层负责）。
    async fn mark_room_delivered(
        &self,
        room_id: RoomId,
        recipient_id: UserId,
        at: Timestamp,
    ) -> Result<Vec<MessageReceipt>, RepositoryError>;

    /// 单条消息送达，幂等。返回发生转换后的回执，未转换返回 None。
    async fn mark_delivered(
        &self,
        message_id: MessageId,
        recipient_id: UserId,
        at: Timestamp,
    ) -> Result<Option<MessageReceipt>, RepositoryError>;

    /// 把该用户在房间内所有未读回执标记为已读（共享同一时间戳）。
    /// 返回实际发生转换的数量。
    async fn mark_room_read(
        &self,
        room_id: RoomId,
        recipient_id: UserId,
        at: Timestamp,
    ) -> Result<u64, RepositoryError>;

    /// 用户在房间内未读（read=false）回执数。
    async fn unread_count(
        &self,
        room_id: RoomId,
        recipient_id: UserId,
    ) -> Result<i64, RepositoryError>;
}

/// 在线状态仓储，每用户一行 upsert。
#[async_trait]
pub trait PresenceRepository: Send + Sync {
    /// 读取用户状态，不存在时返回 None。
    async fn find(&self, user_id: UserId) -> Result<Option<UserPresence>, RepositoryError>;

    /// 整行 upsert。
    async fn upsert(&self, presence: &UserPresence) -> Result<(), RepositoryError>;
}

/// 通知仓储。
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<(), RepositoryError>;

    /// 用户的通知，按创建时间倒序。
    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError>;

    /// 全部标记已读（共享同一时间戳），返回实际转换的数量。
    async fn mark_all_read(&self, user_id: UserId, at: Timestamp) -> Result<u64, RepositoryError>;

    async fn find_by_id(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, RepositoryError>;
}
