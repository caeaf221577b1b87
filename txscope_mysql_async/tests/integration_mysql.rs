#![cfg(feature = "mysql-async")]

use std::sync::Arc;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::mysql::Mysql;
use txscope_core::{
    ConnectionSource, DbError, DbResult, Record, TransactionScope, Value, DEFAULT_DRAIN_TIMEOUT,
};
use txscope_mysql_async::MysqlDriver;

fn skip_containers() -> bool {
    std::env::var("SKIP_CONTAINER_TESTS")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

// Quick check to see if Docker is available; if not, skip container tests gracefully.
fn containers_usable() -> bool {
    if skip_containers() {
        return false;
    }
    std::process::Command::new("docker")
        .arg("version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Construct a working MySQL connection URL by trying a few common credential
/// combos used by popular MySQL container images.
async fn mysql_url_from_node(
    node: &testcontainers::ContainerAsync<Mysql>,
) -> DbResult<String> {
    let host = "127.0.0.1";
    let port: u16 = node.get_host_port_ipv4(3306).await;
    let candidates: &[(&str, &str, &str)] = &[
        ("mysql", "mysql", "mysql"),
        ("root", "root", "mysql"),
        ("root", "", "mysql"),
        ("test", "test", "mysql"),
    ];
    for (user, pass, db) in candidates {
        let url = if pass.is_empty() {
            format!("mysql://{user}@{host}:{port}/{db}")
        } else {
            format!("mysql://{user}:{pass}@{host}:{port}/{db}")
        };
        if mysql_async::Pool::new(url.as_str())
            .get_conn()
            .await
            .is_ok()
        {
            return Ok(url);
        }
    }
    Err(DbError::connection(
        "unable to connect to MySQL container with known credentials",
    ))
}

const USERS_SQL: &str =
    "CREATE TABLE IF NOT EXISTS users (id BIGINT PRIMARY KEY AUTO_INCREMENT, email VARCHAR(255) NOT NULL, active BOOLEAN NOT NULL)";

/// Apply the schema with small retries to accommodate server startup time.
async fn apply_migration_with_retry(scope: &TransactionScope<MysqlDriver>) -> DbResult<()> {
    let mut last = None;
    for _ in 0..10 {
        match scope.exec(USERS_SQL, &[]).await {
            Ok(_) => return Ok(()),
            Err(e) => last = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    Err(last.unwrap_or_else(|| DbError::connection("migration failed after retries")))
}

#[ignore]
#[tokio::test(flavor = "multi_thread")]
async fn mysql_scope_transaction_roundtrip() -> DbResult<()> {
    if !containers_usable() {
        eprintln!("[integration] Skipping: Docker not available");
        return Ok(());
    }

    let node = Mysql::default().start().await;
    let url = mysql_url_from_node(&node).await?;
    let opts = mysql_async::Opts::from_url(&url).map_err(DbError::connection)?;

    let source = Arc::new(ConnectionSource::pooled(MysqlDriver, opts));
    source.connect().await?;

    let scope = TransactionScope::new(source.clone());
    apply_migration_with_retry(&scope).await?;
    scope.release().await;
    assert_eq!(source.in_flight(), 0);

    // Committed work is visible from a fresh scope.
    let scope = TransactionScope::new(source.clone());
    scope.begin().await?;
    let inserted = scope
        .insert(
            "users",
            Record::new().field("email", "a@example.com").field("active", true),
        )
        .await?;
    assert!(inserted.as_one().and_then(|o| o.last_insert_id).is_some());
    scope.commit().await?;
    assert!(!scope.is_bound());

    let reader = TransactionScope::new(source.clone());
    let found = reader
        .exec("SELECT email FROM users WHERE active = ?", &[Value::Bool(true)])
        .await?;
    assert_eq!(found.rows.len(), 1);
    assert_eq!(
        found.rows[0].get("email"),
        Some(&Value::String("a@example.com".into()))
    );
    reader.release().await;

    // Rolled-back work is not.
    let writer = TransactionScope::new(source.clone());
    writer.begin().await?;
    writer
        .insert(
            "users",
            Record::new().field("email", "b@example.com").field("active", false),
        )
        .await?;
    writer.rollback().await?;

    let reader = TransactionScope::new(source.clone());
    let all = reader.exec("SELECT id FROM users", &[]).await?;
    assert_eq!(all.rows.len(), 1);

    let updated = reader
        .update(
            "users",
            &Record::new().field("active", false),
            Some("email=?"),
            &[Value::String("a@example.com".into())],
        )
        .await?;
    assert_eq!(updated, 1);

    let deleted = reader.delete("users", None, &[]).await?;
    assert_eq!(deleted, 1);
    reader.release().await;

    source.shutdown(DEFAULT_DRAIN_TIMEOUT).await;
    Ok(())
}
