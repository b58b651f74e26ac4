//! 在线状态与输入指示服务。

use std::sync::Arc;

use domain::{RoomId, ServerEvent, UserId, UserPresence};
use tracing::{debug, warn};

use crate::access::RoomAccessGuard;
use crate::bus::{EventBus, Group};
use crate::clock::Clock;
use crate::error::ApplicationError;
use crate::repository::{ChatRoomRepository, PresenceRepository};

pub struct PresenceServiceDependencies {
    pub presence: Arc<dyn PresenceRepository>,
    pub rooms: Arc<dyn ChatRoomRepository>,
    pub guard: RoomAccessGuard,
    pub bus: Arc<dyn EventBus>,
    pub clock: Arc<dyn Clock>,
}

pub struct PresenceService {
    deps: PresenceServiceDependencies,
}

impl PresenceService {
    pub fn new(deps: PresenceServiceDependencies) -> Self {
        Self { deps }
    }

    /// 上线/下线。upsert 状态行、刷新 last_seen（下线顺带清除输入中），
    /// 然后把 `presence_update` 推给该用户所有房间里的对端参与者。
    /// 广播是尽力而为的：失败记日志，状态行已经落库。
    pub async fn set_online(
        &self,
        user_id: UserId,
        is_online: bool,
    ) -> Result<UserPresence, ApplicationError> {
        let now = self.deps.clock.now();
        let mut presence = self
            .deps
            .presence
            .find(user_id)
            .await?
            .unwrap_or_else(|| UserPresence::new(user_id, now));
        presence.set_online(is_online, now);
        self.deps.presence.upsert(&presence).await?;
        debug!(user_id = %user_id, is_online, "presence updated");

        let event = ServerEvent::PresenceUpdate {
            user_id,
            is_online,
            last_seen: presence.last_seen,
        };
        for contact in self.deps.rooms.contacts_of(user_id).await? {
            if let Err(err) = self
                .deps
                .bus
                .publish(&Group::user(contact), event.clone())
                .await
            {
                warn!(contact = %contact, error = %err, "presence broadcast failed");
            }
        }
        Ok(presence)
    }

    /// 输入指示。只发给房间分组，不落历史。
    pub async fn set_typing(
        &self,
        user_id: UserId,
        room_id: RoomId,
        is_typing: bool,
    ) -> Result<(), ApplicationError> {
        self.deps.guard.ensure_access(user_id, room_id).await?;

        let now = self.deps.clock.now();
        let mut presence = self
            .deps
            .presence
            .find(user_id)
            .await?
            .unwrap_or_else(|| UserPresence::new(user_id, now));
        presence.set_typing(is_typing.then_some(room_id), now);
        self.deps.presence.upsert(&presence).await?;

        let event = ServerEvent::TypingIndicator {
            user_id,
            room_id,
            is_typing,
        };
        if let Err(err) = self.deps.bus.publish(&Group::room(room_id), event).await {
            warn!(room_id = %room_id, error = %err, "typing broadcast failed");
        }
        Ok(())
    }

    /// 调用方自己的状态行，第一次读取时创建。
    pub async fn get_or_init(&self, user_id: UserId) -> Result<UserPresence, ApplicationError> {
        if let Some(presence) = self.deps.presence.find(user_id).await? {
            return Ok(presence);
        }
        let presence = UserPresence::new(user_id, self.deps.clock.now());
        self.deps.presence.upsert(&presence).await?;
        Ok(presence)
    }
}
