use serde::{Deserialize, Serialize};

use crate::value_objects::{MessageId, Timestamp, UserId};

/// 每个接收者对单条消息的送达/已读状态。
///
/// 状态机：SENT → DELIVERED → READ，只能单向推进。重复施加已经发生过的
/// 转换是空操作而不是错误，时间戳从不回退。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub message_id: MessageId,
    pub recipient_id: UserId,
    pub delivered: bool,
    pub delivered_at: Option<Timestamp>,
    pub read: bool,
    pub read_at: Option<Timestamp>,
}

impl MessageReceipt {
    /// 消息落库时为每个非发送者参与者创建的初始回执。
    pub fn new_sent(message_id: MessageId, recipient_id: UserId) -> Self {
        Self {
            message_id,
            recipient_id,
            delivered: false,
            delivered_at: None,
            read: false,
            read_at: None,
        }
    }

    /// 标记送达。已送达时返回 false（幂等空操作）。
    pub fn mark_delivered(&mut self, at: Timestamp) -> bool {
        if self.delivered {
            return false;
        }
        self.delivered = true;
        self.delivered_at = Some(at);
        true
    }

    /// 标记已读。已读隐含已送达：read=true 必然 delivered=true 且
    /// read_at >= delivered_at。已读时返回 false。
    pub fn mark_read(&mut self, at: Timestamp) -> bool {
        if self.read {
            return false;
        }
        if !self.delivered {
            self.delivered = true;
            self.delivered_at = Some(at);
        }
        self.read = true;
        self.read_at = Some(at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn receipt() -> MessageReceipt {
        MessageReceipt::new_sent(MessageId::from(Uuid::new_v4()), UserId::from(Uuid::new_v4()))
    }

    #[test]
    fn starts_undelivered_and_unread() {
        let r = receipt();
        assert!(!r.delivered);
        assert!(!r.read);
        assert!(r.delivered_at.is_none());
        assert!(r.read_at.is_none());
    }

    #[test]
    fn delivery_is_idempotent_and_timestamp_never_moves() {
        let mut r = receipt();
        let first = Utc::now();
        assert!(r.mark_delivered(first));

        let later = first + Duration::seconds(30);
        assert!(!r.mark_delivered(later));
        assert_eq!(r.delivered_at, Some(first));
    }

    #[test]
    fn read_implies_delivered_with_shared_timestamp() {
        let mut r = receipt();
        let at = Utc::now();
        assert!(r.mark_read(at));

        assert!(r.delivered);
        assert!(r.read);
        assert_eq!(r.delivered_at, Some(at));
        assert_eq!(r.read_at, Some(at));
    }

    #[test]
    fn read_at_never_precedes_delivered_at() {
        let mut r = receipt();
        let delivered = Utc::now();
        let read = delivered + Duration::seconds(10);

        r.mark_delivered(delivered);
        r.mark_read(read);

        assert!(r.read_at.unwrap() >= r.delivered_at.unwrap());
    }

    #[test]
    fn transitions_after_read_are_noops() {
        let mut r = receipt();
        let at = Utc::now();
        r.mark_read(at);

        let later = at + Duration::minutes(5);
        assert!(!r.mark_delivered(later));
        assert!(!r.mark_read(later));
        assert_eq!(r.read_at, Some(at));
        assert_eq!(r.delivered_at, Some(at));
    }
}
