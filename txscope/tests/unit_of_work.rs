use std::sync::Arc;
use tests_common::{MockDriver, MockOp};
use txscope::{ConnectionSource, DbError, TransactionScope, UnitOfWork};

async fn pooled_source(driver: &MockDriver, url: &str) -> Arc<ConnectionSource<MockDriver>> {
    let source = Arc::new(ConnectionSource::pooled(driver.clone(), url.to_string()));
    source.connect().await.unwrap();
    source
}

async fn two_scope_unit(driver: &MockDriver) -> UnitOfWork<MockDriver> {
    let mut uow = UnitOfWork::new();
    for name in ["main", "audit"] {
        let source = pooled_source(driver, &format!("mock://{name}")).await;
        uow.push(name, TransactionScope::new(source));
    }
    uow
}

#[tokio::test]
async fn successful_run_commits_every_scope_in_configured_order() {
    let driver = MockDriver::new();
    let uow = two_scope_unit(&driver).await;

    let out: Result<i32, DbError> = uow
        .run(|uow| {
            Box::pin(async move {
                uow.scope("main").unwrap().begin().await?;
                uow.scope("audit").unwrap().begin().await?;
                Ok(41 + 1)
            })
        })
        .await;
    assert_eq!(out.unwrap(), 42);

    let commits: Vec<String> = driver
        .log()
        .into_iter()
        .filter(|e| e.starts_with("commit"))
        .collect();
    assert_eq!(commits, vec!["commit[1]", "commit[2]"]);
    assert!(uow.iter().all(|(_, scope)| !scope.is_bound()));
    assert_eq!(driver.released(), 2);
}

#[tokio::test]
async fn failed_run_rolls_back_even_scopes_that_never_began() {
    let driver = MockDriver::new();
    let uow = two_scope_unit(&driver).await;

    let out: Result<(), DbError> = uow
        .run(|uow| {
            Box::pin(async move {
                // Bind "main" with a plain statement, no begin.
                uow.scope("main").unwrap().exec("SELECT 1", &[]).await?;
                Err(DbError::query("downstream handler failed"))
            })
        })
        .await;
    assert!(matches!(out, Err(DbError::Query { .. })));

    let log = driver.log();
    assert!(log.contains(&"rollback[1]".to_string()));
    assert!(!log.iter().any(|e| e.starts_with("commit")));
    assert_eq!(driver.released(), 1);
}

#[tokio::test]
async fn failed_run_skips_scopes_that_never_bound_a_handle() {
    let driver = MockDriver::new();
    let uow = two_scope_unit(&driver).await;

    let out: Result<(), DbError> = uow
        .run(|uow| {
            Box::pin(async move {
                uow.scope("audit").unwrap().begin().await?;
                Err(DbError::query("downstream handler failed"))
            })
        })
        .await;
    assert!(out.is_err());

    // Only the bound "audit" scope saw a rollback; "main" never touched the
    // pool at all.
    let rollbacks: Vec<String> = driver
        .log()
        .into_iter()
        .filter(|e| e.starts_with("rollback"))
        .collect();
    assert_eq!(rollbacks.len(), 1);
    assert_eq!(driver.acquired(), 1);
}

#[tokio::test]
async fn commit_failure_propagates_and_leaves_later_scopes_bound() {
    let driver = MockDriver::new();
    let uow = two_scope_unit(&driver).await;

    uow.scope("main").unwrap().begin().await.unwrap();
    uow.scope("audit").unwrap().begin().await.unwrap();

    driver.fail_once(MockOp::Commit);
    let err = uow.commit_all().await.unwrap_err();
    assert!(matches!(err, DbError::Transaction { .. }));

    // First scope kept its handle after the failed commit; second was never
    // asked to commit.
    assert!(uow.scope("main").unwrap().is_bound());
    assert!(uow.scope("audit").unwrap().is_bound());
    assert!(!driver.log().iter().any(|e| e.starts_with("commit")));
}

#[tokio::test]
async fn rollback_failure_is_swallowed_and_the_handle_force_released() {
    let driver = MockDriver::new();
    let uow = two_scope_unit(&driver).await;

    uow.scope("main").unwrap().begin().await.unwrap();
    uow.scope("audit").unwrap().begin().await.unwrap();

    driver.fail_once(MockOp::Rollback);
    uow.rollback_all().await;

    // Both handles are back in their pools even though the first rollback
    // failed, and the second scope still got its rollback.
    assert!(uow.iter().all(|(_, scope)| !scope.is_bound()));
    assert_eq!(driver.released(), 2);
    let rollbacks: Vec<String> = driver
        .log()
        .into_iter()
        .filter(|e| e.starts_with("rollback"))
        .collect();
    assert_eq!(rollbacks, vec!["rollback[2]".to_string()]);
}

#[tokio::test]
async fn run_maps_a_custom_error_type_through_from() {
    #[derive(Debug)]
    enum AppError {
        Db(DbError),
        Teapot,
    }
    impl From<DbError> for AppError {
        fn from(e: DbError) -> Self {
            AppError::Db(e)
        }
    }

    let driver = MockDriver::new();
    let uow = two_scope_unit(&driver).await;

    let out: Result<(), AppError> = uow
        .run(|_uow| Box::pin(async { Err(AppError::Teapot) }))
        .await;
    assert!(matches!(out, Err(AppError::Teapot)));

    // A commit failure on the success path surfaces through the same type.
    uow.scope("main").unwrap().begin().await.unwrap();
    driver.fail_once(MockOp::Commit);
    let out: Result<(), AppError> = uow.run(|_uow| Box::pin(async { Ok(()) })).await;
    assert!(matches!(out, Err(AppError::Db(DbError::Transaction { .. }))));
}

#[tokio::test]
async fn empty_unit_commits_and_rolls_back_as_no_ops() {
    let uow: UnitOfWork<MockDriver> = UnitOfWork::new();
    assert!(uow.is_empty());
    assert_eq!(uow.len(), 0);
    uow.commit_all().await.unwrap();
    uow.rollback_all().await;
}
