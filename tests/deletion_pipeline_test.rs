//! Queued user deletion: enqueue, dequeue-and-delete, redelivery and the worker.

mod common;

use std::time::Duration;

use uuid::Uuid;

use matching_api::domain::Message;
use matching_api::errors::ErrorKind;
use matching_api::infra::MessageQueue;
use matching_api::jobs::DeletionWorker;
use matching_api::services::ServiceContainer;

use common::test_app;

#[tokio::test]
async fn test_enqueue_then_dequeue_deletes_exactly_one_user() {
    let app = test_app();
    let users = app.services.users();
    let doomed = users.create("doomed@example.com".into()).await.unwrap();
    let kept = users.create("kept@example.com".into()).await.unwrap();

    users.enqueue_deletion(doomed.id).await.unwrap();

    assert_eq!(users.dequeue_and_delete(10).await.unwrap(), 1);
    assert_eq!(users.dequeue_and_delete(10).await.unwrap(), 0);

    assert_eq!(users.get(doomed.id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(users.get(kept.id).await.unwrap(), kept);
    assert!(app.queue.is_empty().await);
}

#[tokio::test]
async fn test_dequeue_on_empty_queue_returns_zero() {
    let app = test_app();

    assert_eq!(app.services.users().dequeue_and_delete(10).await.unwrap(), 0);
}

#[tokio::test]
async fn test_enqueue_does_not_check_existence() {
    let app = test_app();
    let users = app.services.users();

    users.enqueue_deletion(Uuid::now_v7()).await.unwrap();

    assert_eq!(users.dequeue_and_delete(10).await.unwrap(), 1);
    assert!(app.queue.is_empty().await);
}

#[tokio::test]
async fn test_deleted_user_is_evicted_from_cache() {
    let app = test_app();
    let users = app.services.users();
    let user = users.create("cached@example.com".into()).await.unwrap();
    assert!(app.cache.contains(user.id).await);

    users.enqueue_deletion(user.id).await.unwrap();
    users.dequeue_and_delete(1).await.unwrap();

    assert!(!app.cache.contains(user.id).await);
}

#[tokio::test]
async fn test_batch_is_limited_to_ten_messages() {
    let app = test_app();
    let users = app.services.users();
    for _ in 0..12 {
        users.enqueue_deletion(Uuid::now_v7()).await.unwrap();
    }

    assert_eq!(users.dequeue_and_delete(50).await.unwrap(), 10);
    assert_eq!(users.dequeue_and_delete(50).await.unwrap(), 2);
}

#[tokio::test]
async fn test_non_positive_batch_size_still_receives_one() {
    let app = test_app();
    let users = app.services.users();
    users.enqueue_deletion(Uuid::now_v7()).await.unwrap();
    users.enqueue_deletion(Uuid::now_v7()).await.unwrap();

    assert_eq!(users.dequeue_and_delete(0).await.unwrap(), 1);
    assert_eq!(app.queue.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_store_delete_is_redelivered_after_visibility_timeout() {
    let app = test_app();
    let users = app.services.users();
    let user = users.create("retry@example.com".into()).await.unwrap();
    users.enqueue_deletion(user.id).await.unwrap();

    app.db.fail_next_user_removes(1).await;
    assert_eq!(users.dequeue_and_delete(10).await.unwrap(), 0);
    assert_eq!(app.db.user_count().await, 1);
    assert_eq!(app.queue.in_flight().await, 1);

    // Still leased
    assert_eq!(users.dequeue_and_delete(10).await.unwrap(), 0);

    tokio::time::advance(app.config.visibility_timeout + Duration::from_secs(1)).await;

    assert_eq!(users.dequeue_and_delete(10).await.unwrap(), 1);
    assert_eq!(app.db.user_count().await, 0);
    assert!(app.queue.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_failed_acknowledge_is_redelivered_and_completes() {
    let app = test_app();
    let users = app.services.users();
    let user = users.create("ack@example.com".into()).await.unwrap();
    users.enqueue_deletion(user.id).await.unwrap();

    app.queue.fail_next_deletes(1);
    assert_eq!(users.dequeue_and_delete(10).await.unwrap(), 0);
    assert_eq!(app.db.user_count().await, 0);

    tokio::time::advance(app.config.visibility_timeout + Duration::from_secs(1)).await;

    // The user is already gone; the redelivered message is still acknowledged.
    assert_eq!(users.dequeue_and_delete(10).await.unwrap(), 1);
    assert!(app.queue.is_empty().await);
}

#[tokio::test]
async fn test_undecodable_message_is_left_on_the_queue() {
    let app = test_app();
    app.queue.send(&Message::new("not a uuid")).await.unwrap();

    assert_eq!(app.services.users().dequeue_and_delete(10).await.unwrap(), 0);
    assert_eq!(app.queue.in_flight().await, 1);
}

#[tokio::test]
async fn test_receive_failure_is_reported() {
    let app = test_app();
    app.queue.set_receive_failure(true);

    let err = app
        .services
        .users()
        .dequeue_and_delete(10)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transient);
}

#[tokio::test(start_paused = true)]
async fn test_worker_drains_queue_until_shutdown() {
    let app = test_app();
    let users = app.services.users();
    for i in 0..3 {
        let user = users.create(format!("w{}@example.com", i)).await.unwrap();
        users.enqueue_deletion(user.id).await.unwrap();
    }

    let worker = DeletionWorker::new(users.clone(), &app.config);
    let stats = worker
        .run_until(tokio::time::sleep(Duration::from_secs(5)))
        .await;

    assert_eq!(stats.deleted, 3);
    assert_eq!(stats.failed_polls, 0);
    assert!(stats.batches >= 2);
    assert_eq!(app.db.user_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_worker_backs_off_after_failed_poll() {
    let app = test_app();
    app.queue.set_receive_failure(true);

    let worker = DeletionWorker::new(app.services.users(), &app.config)
        .with_error_backoff(Duration::from_secs(5));
    let stats = worker
        .run_until(tokio::time::sleep(Duration::from_secs(12)))
        .await;

    assert_eq!(stats.deleted, 0);
    assert_eq!(stats.failed_polls, stats.batches);
    assert!((2..=3).contains(&stats.failed_polls));
}
