//! Transaction boundaries of the in-memory unit of work.

use std::sync::Arc;
use std::time::Duration;

use matching_api::domain::User;
use matching_api::errors::{AppError, ErrorKind};
use matching_api::infra::{MemoryDatabase, MemoryUnitOfWork, UnitOfWork};

fn unit_of_work() -> (Arc<MemoryDatabase>, Arc<MemoryUnitOfWork>) {
    let db = MemoryDatabase::new();
    let uow = Arc::new(MemoryUnitOfWork::new(db.clone(), Duration::from_secs(5)));
    (db, uow)
}

#[tokio::test]
async fn test_commit_makes_writes_visible() {
    let (db, uow) = unit_of_work();
    let user = User::new("commit@example.com").unwrap();

    let saved = uow
        .transaction(|ctx| Box::pin(async move { ctx.users().save(&user).await }))
        .await
        .unwrap();

    assert_eq!(db.user_count().await, 1);
    assert_eq!(
        uow.users().find_by_id(None, saved.id).await.unwrap(),
        Some(saved)
    );
}

#[tokio::test]
async fn test_error_rolls_back_every_write() {
    let (db, uow) = unit_of_work();
    let first = User::new("first@example.com").unwrap();
    let second = User::new("second@example.com").unwrap();

    let result: Result<(), AppError> = uow
        .transaction(|ctx| {
            Box::pin(async move {
                ctx.users().save(&first).await?;
                ctx.users().save(&second).await?;
                Err(AppError::conflict("abort"))
            })
        })
        .await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Conflict);
    assert_eq!(db.user_count().await, 0);
}

#[tokio::test]
async fn test_writes_are_visible_inside_but_not_outside_until_commit() {
    let (db, uow) = unit_of_work();
    let user = User::new("inside@example.com").unwrap();
    let outside = uow.users();
    let id = user.id;

    let (seen_inside, seen_outside) = uow
        .transaction(|ctx| {
            Box::pin(async move {
                ctx.users().save(&user).await?;
                let inside = ctx.users().find_by_id(id).await?.is_some();
                let outside = outside.find_by_id(None, id).await?.is_some();
                Ok::<_, AppError>((inside, outside))
            })
        })
        .await
        .unwrap();

    assert!(seen_inside);
    assert!(!seen_outside);
    assert_eq!(db.user_count().await, 1);
}

#[tokio::test]
async fn test_panic_rolls_back_and_propagates() {
    let (db, uow) = unit_of_work();
    let user = User::new("panic@example.com").unwrap();

    let handle = tokio::spawn({
        let uow = uow.clone();
        async move {
            uow.transaction(|ctx| {
                Box::pin(async move {
                    let saved = ctx.users().save(&user).await?;
                    if saved.id == user.id {
                        panic!("boom");
                    }
                    Ok::<(), AppError>(())
                })
            })
            .await
        }
    });

    let err = handle.await.unwrap_err();
    assert!(err.is_panic());
    assert_eq!(db.user_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_rolls_back() {
    let (db, uow) = unit_of_work();
    let user = User::new("slow@example.com").unwrap();

    let result = uow
        .transaction(|ctx| {
            Box::pin(async move {
                ctx.users().save(&user).await?;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<(), AppError>(())
            })
        })
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, AppError::Timeout(_)));
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert_eq!(db.user_count().await, 0);
}

#[tokio::test]
async fn test_rollback_failure_keeps_original_error_kind() {
    let (db, uow) = unit_of_work();
    db.fail_next_rollbacks(1).await;

    let result: Result<(), AppError> = uow
        .transaction(|_ctx| Box::pin(async move { Err(AppError::invalid_argument("bad input")) }))
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, AppError::RollbackFailed { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_begin_failure_runs_nothing() {
    let (db, uow) = unit_of_work();
    db.fail_next_begins(1).await;
    let user = User::new("never@example.com").unwrap();

    let result = uow
        .transaction(|ctx| Box::pin(async move { ctx.users().save(&user).await }))
        .await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Transient);
    assert_eq!(db.user_count().await, 0);
}
