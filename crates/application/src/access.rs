//! 房间访问检查。

use std::sync::Arc;

use domain::{DomainError, RoomId, UserId};
use tracing::warn;

use crate::error::ApplicationError;
use crate::repository::ChatRoomRepository;

/// 房间访问守卫。
///
/// 每条涉及房间的命令（join_room、send_message、mark_read、typing、
/// 历史读取）都必须经过这里，即便会话此前已经加入过该房间的分组：
/// 分组成员资格只是缓存，参与者表才是事实来源。
#[derive(Clone)]
pub struct RoomAccessGuard {
    rooms: Arc<dyn ChatRoomRepository>,
}

impl RoomAccessGuard {
    pub fn new(rooms: Arc<dyn ChatRoomRepository>) -> Self {
        Self { rooms }
    }

    /// 用户当前是否可以访问房间。房间不存在视为无权访问。
    pub async fn can_access(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<bool, ApplicationError> {
        Ok(self.rooms.is_participant(room_id, user_id).await?)
    }

    /// 校验访问权限，无权访问时返回授权错误。
    pub async fn ensure_access(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<(), ApplicationError> {
        if self.can_access(user_id, room_id).await? {
            Ok(())
        } else {
            warn!(user_id = %user_id, room_id = %room_id, "room access denied");
            Err(ApplicationError::Domain(DomainError::NotRoomParticipant))
        }
    }
}
