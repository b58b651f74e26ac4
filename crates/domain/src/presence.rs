use serde::{Deserialize, Serialize};

use crate::value_objects::{RoomId, Timestamp, UserId};

/// 用户的实时在线状态，每个用户至多一条记录（upsert 语义）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPresence {
    pub user_id: UserId,
    pub is_online: bool,
    pub last_seen: Timestamp,
    pub typing_in_room: Option<RoomId>,
    pub last_typing_update: Option<Timestamp>,
}

impl UserPresence {
    pub fn new(user_id: UserId, now: Timestamp) -> Self {
        Self {
            user_id,
            is_online: false,
            last_seen: now,
            typing_in_room: None,
            last_typing_update: None,
        }
    }

    /// 上线/下线。下线时清除输入中状态。
    pub fn set_online(&mut self, is_online: bool, now: Timestamp) {
        self.is_online = is_online;
        self.last_seen = now;
        if !is_online {
            self.typing_in_room = None;
            self.last_typing_update = None;
        }
    }

    /// 更新"正在输入"状态。room 为 None 表示停止输入。
    pub fn set_typing(&mut self, room: Option<RoomId>, now: Timestamp) {
        self.last_typing_update = room.map(|_| now);
        self.typing_in_room = room;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn going_offline_clears_typing_state() {
        let now = Utc::now();
        let mut presence = UserPresence::new(UserId::from(Uuid::new_v4()), now);
        presence.set_online(true, now);
        presence.set_typing(Some(RoomId::from(Uuid::new_v4())), now);
        assert!(presence.typing_in_room.is_some());

        presence.set_online(false, now);
        assert!(!presence.is_online);
        assert!(presence.typing_in_room.is_none());
        assert!(presence.last_typing_update.is_none());
    }

    #[test]
    fn stop_typing_clears_update_timestamp() {
        let now = Utc::now();
        let mut presence = UserPresence::new(UserId::from(Uuid::new_v4()), now);
        presence.set_typing(Some(RoomId::from(Uuid::new_v4())), now);
        assert_eq!(presence.last_typing_update, Some(now));

        presence.set_typing(None, now);
        assert!(presence.typing_in_room.is_none());
        assert!(presence.last_typing_update.is_none());
    }
}
