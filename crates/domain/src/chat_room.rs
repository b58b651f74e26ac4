use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{ApplicationRef, RoomId, Timestamp, UserId};

/// 房间类型。
///
/// direct 房间固定两个参与者（招聘方与候选人），group/system 至少一个。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Direct,
    Group,
    System,
}

impl RoomKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomKind::Direct => "direct",
            RoomKind::Group => "group",
            RoomKind::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: RoomId,
    pub name: String,
    pub kind: RoomKind,
    /// 指向外部求职申请的不透明引用，核心从不解引用。
    pub application_ref: Option<ApplicationRef>,
    pub created_at: Timestamp,
    /// 每有新消息就会被刷新，作为联系人列表的排序键。
    pub updated_at: Timestamp,
    pub is_active: bool,
}

impl ChatRoom {
    pub fn new(
        id: RoomId,
        name: impl Into<String>,
        kind: RoomKind,
        application_ref: Option<ApplicationRef>,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        let name = Self::validate_name(name.into())?;
        Ok(Self {
            id,
            name,
            kind,
            application_ref,
            created_at,
            updated_at: created_at,
            is_active: true,
        })
    }

    /// 校验参与者集合是否满足房间类型的不变式。
    pub fn validate_participants(
        kind: RoomKind,
        participants: &[UserId],
    ) -> Result<(), DomainError> {
        match kind {
            RoomKind::Direct => {
                if participants.len() != 2 || participants[0] == participants[1] {
                    return Err(DomainError::DirectRoomParticipantCount);
                }
            }
            RoomKind::Group | RoomKind::System => {
                if participants.is_empty() {
                    return Err(DomainError::EmptyParticipantSet);
                }
            }
        }
        Ok(())
    }

    /// 新消息到达时刷新排序时间戳。
    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }

    /// 房间从不删除，只停用。
    pub fn deactivate(&mut self, now: Timestamp) {
        self.is_active = false;
        self.updated_at = now;
    }

    fn validate_name(name: String) -> Result<String, DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument("name", "cannot be empty"));
        }
        if trimmed.len() > 255 {
            return Err(DomainError::invalid_argument("name", "too long"));
        }
        Ok(trimmed.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user() -> UserId {
        UserId::from(Uuid::new_v4())
    }

    #[test]
    fn direct_room_requires_exactly_two_distinct_participants() {
        let a = user();
        let b = user();

        assert!(ChatRoom::validate_participants(RoomKind::Direct, &[a, b]).is_ok());
        assert_eq!(
            ChatRoom::validate_participants(RoomKind::Direct, &[a]),
            Err(DomainError::DirectRoomParticipantCount)
        );
        assert_eq!(
            ChatRoom::validate_participants(RoomKind::Direct, &[a, a]),
            Err(DomainError::DirectRoomParticipantCount)
        );
        assert_eq!(
            ChatRoom::validate_participants(RoomKind::Direct, &[a, b, user()]),
            Err(DomainError::DirectRoomParticipantCount)
        );
    }

    #[test]
    fn group_room_requires_at_least_one_participant() {
        assert!(ChatRoom::validate_participants(RoomKind::Group, &[user()]).is_ok());
        assert_eq!(
            ChatRoom::validate_participants(RoomKind::Group, &[]),
            Err(DomainError::EmptyParticipantSet)
        );
    }

    #[test]
    fn touch_bumps_updated_at() {
        let created = Utc::now();
        let mut room = ChatRoom::new(
            RoomId::from(Uuid::new_v4()),
            "Chat with Alex",
            RoomKind::Direct,
            None,
            created,
        )
        .unwrap();

        let later = created + chrono::Duration::seconds(5);
        room.touch(later);
        assert_eq!(room.updated_at, later);
        assert_eq!(room.created_at, created);
    }

    #[test]
    fn deactivate_keeps_room_but_marks_inactive() {
        let now = Utc::now();
        let mut room = ChatRoom::new(
            RoomId::from(Uuid::new_v4()),
            "Recruiting updates",
            RoomKind::System,
            None,
            now,
        )
        .unwrap();

        room.deactivate(now);
        assert!(!room.is_active);
    }
}
