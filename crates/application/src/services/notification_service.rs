//! 通知落库与实时扇出。
//!
//! 生产者（匹配引擎、申请状态流转等外部子系统）只管调用 `notify`，
//! 永远不知道接收者当前是否在线：行先落库，实时推送尽力而为，
//! 掉线的用户重连后通过列表接口补齐。

use std::sync::Arc;

use domain::{Notification, NotificationCategory, NotificationId, ServerEvent, UserId};
use tracing::{info, warn};
use uuid::Uuid;

use crate::bus::{EventBus, Group};
use crate::clock::Clock;
use crate::error::ApplicationError;
use crate::repository::NotificationRepository;

pub struct NotificationServiceDependencies {
    pub notifications: Arc<dyn NotificationRepository>,
    pub bus: Arc<dyn EventBus>,
    pub clock: Arc<dyn Clock>,
}

pub struct NotificationService {
    deps: NotificationServiceDependencies,
}

impl NotificationService {
    pub const LIST_LIMIT: i64 = 100;

    pub fn new(deps: NotificationServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn notify(
        &self,
        recipient_id: UserId,
        content: impl Into<String>,
        category: NotificationCategory,
    ) -> Result<Notification, ApplicationError> {
        let notification = Notification::new(
            NotificationId::from(Uuid::new_v4()),
            recipient_id,
            content,
            category,
            self.deps.clock.now(),
        );
        self.deps.notifications.create(&notification).await?;
        info!(
            notification_id = %notification.id,
            recipient_id = %recipient_id,
            category = category.as_str(),
            "notification stored"
        );

        let event = ServerEvent::Notification {
            content: notification.content.clone(),
            category: notification.category.as_str().to_string(),
            created_at: notification.created_at,
        };
        if let Err(err) = self
            .deps
            .bus
            .publish(&Group::user(recipient_id), event)
            .await
        {
            warn!(recipient_id = %recipient_id, error = %err, "notification push failed");
        }
        Ok(notification)
    }

    pub async fn list(&self, user_id: UserId) -> Result<Vec<Notification>, ApplicationError> {
        Ok(self
            .deps
            .notifications
            .list_for_user(user_id, Self::LIST_LIMIT)
            .await?)
    }

    /// 全部标记已读，共享一个时间戳。返回实际转换的数量。
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, ApplicationError> {
        let now = self.deps.clock.now();
        Ok(self.deps.notifications.mark_all_read(user_id, now).await?)
    }
}
