use serde::{Deserialize, Serialize};

use crate::value_objects::{NotificationId, Timestamp, UserId};

/// 通知分类，对应平台里会触发推送的几类业务事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    JobApplication,
    ApplicationStatus,
    JobInvitation,
    VerificationStatus,
    Message,
    General,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::JobApplication => "job_application",
            NotificationCategory::ApplicationStatus => "application_status",
            NotificationCategory::JobInvitation => "job_invitation",
            NotificationCategory::VerificationStatus => "verification_status",
            NotificationCategory::Message => "message",
            NotificationCategory::General => "general",
        }
    }
}

/// 外部子系统（匹配引擎、申请状态更新等）产生的通知。
/// 消息核心只负责落库、实时推送和标记已读。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub content: String,
    pub category: NotificationCategory,
    pub created_at: Timestamp,
    pub read: bool,
    pub read_at: Option<Timestamp>,
}

impl Notification {
    pub fn new(
        id: NotificationId,
        user_id: UserId,
        content: impl Into<String>,
        category: NotificationCategory,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            content: content.into(),
            category,
            created_at,
            read: false,
            read_at: None,
        }
    }

    /// 标记已读，幂等。
    pub fn mark_read(&mut self, at: Timestamp) -> bool {
        if self.read {
            return false;
        }
        self.read = true;
        self.read_at = Some(at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn mark_read_is_idempotent() {
        let now = Utc::now();
        let mut n = Notification::new(
            NotificationId::from(Uuid::new_v4()),
            UserId::from(Uuid::new_v4()),
            "Your application moved to interview",
            NotificationCategory::ApplicationStatus,
            now,
        );

        assert!(n.mark_read(now));
        let later = now + chrono::Duration::seconds(1);
        assert!(!n.mark_read(later));
        assert_eq!(n.read_at, Some(now));
    }
}
