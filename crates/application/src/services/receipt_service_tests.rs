//! 回执状态机单元测试：单向推进、幂等、事件扇出。

use domain::{DomainError, RoomKind, ServerEvent};

use crate::bus::Group;
use crate::error::ApplicationError;
use crate::repository::ReceiptRepository;
use crate::services::tests::{drain, user, TestEnv};
use crate::services::SendMessageRequest;

async fn send(env: &TestEnv, room: domain::RoomId, sender: domain::UserId, content: &str) -> domain::ChatMessage {
    env.chat
        .send_message(SendMessageRequest {
            room_id: room,
            sender_id: sender,
            content: content.to_string(),
            temp_id: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn room_delivered_notifies_sender_once() {
    let env = TestEnv::new();
    let (a, b) = (user(), user());
    let room = env.make_room(RoomKind::Direct, &[a, b]).await;
    let m1 = send(&env, room.id, a, "one").await;
    let m2 = send(&env, room.id, a, "two").await;
    let mut rx_a = env.listen(a, &[Group::user(a)]).await;

    let count = env.receipts.mark_room_delivered(b, room.id).await.unwrap();
    assert_eq!(count, 2);

    let events = drain(&mut rx_a);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerEvent::DeliveryReceipt {
            deliverer_id,
            message_ids,
        } => {
            assert_eq!(*deliverer_id, b);
            let mut ids = message_ids.clone();
            ids.sort_by_key(|id| uuid::Uuid::from(*id));
            let mut expected = vec![m1.id, m2.id];
            expected.sort_by_key(|id| uuid::Uuid::from(*id));
            assert_eq!(ids, expected);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // 再次调用已无可转换的回执，也不再发事件。
    assert_eq!(env.receipts.mark_room_delivered(b, room.id).await.unwrap(), 0);
    assert!(drain(&mut rx_a).is_empty());
}

#[tokio::test]
async fn single_delivery_is_idempotent() {
    let env = TestEnv::new();
    let (a, b) = (user(), user());
    let room = env.make_room(RoomKind::Direct, &[a, b]).await;
    let message = send(&env, room.id, a, "hello").await;
    let mut rx_a = env.listen(a, &[Group::user(a)]).await;

    env.receipts.mark_delivered(b, message.id).await.unwrap();
    env.receipts.mark_delivered(b, message.id).await.unwrap();

    let events = drain(&mut rx_a);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ServerEvent::DeliveryReceipt { .. }));
}

#[tokio::test]
async fn room_read_flips_only_callers_receipts() {
    let env = TestEnv::new();
    let (a, b, c) = (user(), user(), user());
    let room = env.make_room(RoomKind::Group, &[a, b, c]).await;
    send(&env, room.id, a, "for everyone").await;

    let count = env.receipts.mark_room_read(b, room.id).await.unwrap();
    assert_eq!(count, 1);

    assert_eq!(env.store.unread_count(room.id, b).await.unwrap(), 0);
    assert_eq!(env.store.unread_count(room.id, c).await.unwrap(), 1);
}

#[tokio::test]
async fn room_read_broadcasts_to_other_participants() {
    let env = TestEnv::new();
    let (a, b, c) = (user(), user(), user());
    let room = env.make_room(RoomKind::Group, &[a, b, c]).await;
    send(&env, room.id, a, "news").await;
    let mut rx_a = env.listen(a, &[Group::user(a)]).await;
    let mut rx_c = env.listen(c, &[Group::user(c)]).await;

    env.receipts.mark_room_read(b, room.id).await.unwrap();

    for rx in [&mut rx_a, &mut rx_c] {
        let events = drain(rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::ReadReceipt {
                reader_id, room_id, ..
            } => {
                assert_eq!(*reader_id, b);
                assert_eq!(*room_id, room.id);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[tokio::test]
async fn read_implies_delivered() {
    let env = TestEnv::new();
    let (a, b) = (user(), user());
    let room = env.make_room(RoomKind::Direct, &[a, b]).await;
    let message = send(&env, room.id, a, "skip ahead").await;

    env.receipts.mark_room_read(b, room.id).await.unwrap();

    // 已读之后送达已是既成事实，不再产生转换。
    let transitioned = env
        .store
        .mark_delivered(message.id, b, chrono::Utc::now())
        .await
        .unwrap();
    assert!(transitioned.is_none());
}

#[tokio::test]
async fn repeated_room_read_is_silent() {
    let env = TestEnv::new();
    let (a, b) = (user(), user());
    let room = env.make_room(RoomKind::Direct, &[a, b]).await;
    send(&env, room.id, a, "message").await;
    env.receipts.mark_room_read(b, room.id).await.unwrap();

    let mut rx_a = env.listen(a, &[Group::user(a)]).await;
    assert_eq!(env.receipts.mark_room_read(b, room.id).await.unwrap(), 0);
    assert!(drain(&mut rx_a).is_empty());
}

#[tokio::test]
async fn non_participant_cannot_mark_read() {
    let env = TestEnv::new();
    let (a, b, outsider) = (user(), user(), user());
    let room = env.make_room(RoomKind::Direct, &[a, b]).await;
    send(&env, room.id, a, "private").await;

    let result = env.receipts.mark_room_read(outsider, room.id).await;
    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::NotRoomParticipant))
    ));
    assert_eq!(env.store.unread_count(room.id, b).await.unwrap(), 1);
}
