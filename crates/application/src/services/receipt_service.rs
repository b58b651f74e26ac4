//! 回执状态机服务。
//!
//! 送达有两条触发路径（加入房间/拉取历史时的批量路径，和会话收到
//! 消息时的单条路径），两条路径汇聚到同一个实现上，保证状态只会
//! SENT → DELIVERED → READ 单向推进。

use std::collections::HashMap;
use std::sync::Arc;

use domain::{DomainError, MessageId, RoomId, ServerEvent, UserId};
use tracing::{debug, warn};

use crate::access::RoomAccessGuard;
use crate::bus::{EventBus, Group};
use crate::clock::Clock;
use crate::error::ApplicationError;
use crate::repository::{ChatRoomRepository, MessageRepository, ReceiptRepository};

pub struct ReceiptServiceDependencies {
    pub receipts: Arc<dyn ReceiptRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub rooms: Arc<dyn ChatRoomRepository>,
    pub guard: RoomAccessGuard,
    pub bus: Arc<dyn EventBus>,
    pub clock: Arc<dyn Clock>,
}

pub struct ReceiptService {
    deps: ReceiptServiceDependencies,
}

impl ReceiptService {
    pub fn new(deps: ReceiptServiceDependencies) -> Self {
        Self { deps }
    }

    /// 批量送达：用户加入房间或拉取历史时，把房间内所有未送达回执
    /// 置为已送达，并按消息发送者聚合后给每个发送者的个人分组推一条
    /// `delivery_receipt`。幂等，重复调用不再发事件。
    pub async fn mark_room_delivered(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<usize, ApplicationError> {
        self.deps.guard.ensure_access(user_id, room_id).await?;
        let now = self.deps.clock.now();
        let transitioned = self
            .deps
            .receipts
            .mark_room_delivered(room_id, user_id, now)
            .await?;
        if transitioned.is_empty() {
            return Ok(0);
        }
        debug!(
            user_id = %user_id,
            room_id = %room_id,
            count = transitioned.len(),
            "receipts delivered"
        );

        // 按发送者聚合，系统消息没有发送者、无人需要回执。
        let mut by_sender: HashMap<UserId, Vec<MessageId>> = HashMap::new();
        for receipt in &transitioned {
            let Some(message) = self.deps.messages.find_by_id(receipt.message_id).await? else {
                continue;
            };
            if let Some(sender) = message.sender_id {
                by_sender.entry(sender).or_default().push(receipt.message_id);
            }
        }
        for (sender, message_ids) in by_sender {
            self.publish_best_effort(
                Group::user(sender),
                ServerEvent::DeliveryReceipt {
                    deliverer_id: user_id,
                    message_ids,
                },
            )
            .await;
        }
        Ok(transitioned.len())
    }

    /// 单条送达：会话实时收到一条别人发的消息时调用。幂等。
    pub async fn mark_delivered(
        &self,
        user_id: UserId,
        message_id: MessageId,
    ) -> Result<(), ApplicationError> {
        let now = self.deps.clock.now();
        let Some(receipt) = self
            .deps
            .receipts
            .mark_delivered(message_id, user_id, now)
            .await?
        else {
            return Ok(());
        };

        let message = self
            .deps
            .messages
            .find_by_id(receipt.message_id)
            .await?
            .ok_or(DomainError::MessageNotFound)?;
        if let Some(sender) = message.sender_id {
            self.publish_best_effort(
                Group::user(sender),
                ServerEvent::DeliveryReceipt {
                    deliverer_id: user_id,
                    message_ids: vec![message_id],
                },
            )
            .await;
        }
        Ok(())
    }

    /// 整房已读：一个共享时间戳置所有未读回执为已读（隐含已送达），
    /// 给房间其余每个参与者的个人分组推 `read_receipt`。返回转换数。
    pub async fn mark_room_read(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<u64, ApplicationError> {
        self.deps.guard.ensure_access(user_id, room_id).await?;
        let now = self.deps.clock.now();
        let transitioned = self
            .deps
            .receipts
            .mark_room_read(room_id, user_id, now)
            .await?;
        if transitioned == 0 {
            return Ok(0);
        }
        debug!(user_id = %user_id, room_id = %room_id, count = transitioned, "receipts read");

        let participants = self.deps.rooms.participants(room_id).await?;
        for participant in participants.into_iter().filter(|p| *p != user_id) {
            self.publish_best_effort(
                Group::user(participant),
                ServerEvent::ReadReceipt {
                    reader_id: user_id,
                    room_id,
                    timestamp: now,
                },
            )
            .await;
        }
        Ok(transitioned)
    }

    async fn publish_best_effort(&self, group: Group, event: ServerEvent) {
        if let Err(err) = self.deps.bus.publish(&group, event).await {
            warn!(group = %group, error = %err, "receipt broadcast failed");
        }
    }
}
