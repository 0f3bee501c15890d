//! Reads against a swingstore-shaped SQLite fixture.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use upgrade_ledger::{SqliteStateReader, StateReader};
use upgrade_types::BundleId;

async fn write_fixture(path: &Path) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    let statements = [
        "CREATE TABLE kvStore (key TEXT PRIMARY KEY, value TEXT)",
        "CREATE TABLE bundles (bundleID TEXT PRIMARY KEY, bundle BLOB)",
        r#"CREATE TABLE transcriptSpans (
            vatID TEXT, startPos INTEGER, endPos INTEGER, hash TEXT,
            isCurrent INTEGER CHECK (isCurrent = 1), incarnation INTEGER,
            PRIMARY KEY (vatID, startPos))"#,
        "INSERT INTO bundles VALUES ('b1-aaa', x'00')",
        "INSERT INTO bundles VALUES ('b1-bbb', x'00')",
        r#"INSERT INTO kvStore VALUES ('vat.dynamicIDs', '["v9","v43"]')"#,
        r#"INSERT INTO kvStore VALUES ('v9.options', '{"name":"zoe"}')"#,
        r#"INSERT INTO kvStore VALUES ('v43.options', '{"name":"zcf-b1-77f-vaultFactory"}')"#,
        r#"INSERT INTO kvStore VALUES ('v43.source', '{"bundleID":"b1-77f"}')"#,
        "INSERT INTO transcriptSpans VALUES ('v43', 0, 10, 'h0', NULL, 0)",
        "INSERT INTO transcriptSpans VALUES ('v43', 10, 25, 'h1', 1, 1)",
        "INSERT INTO transcriptSpans VALUES ('v9', 0, 5, 'h2', 1, 0)",
    ];
    for stmt in statements {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }
    pool.close().await;
}

#[tokio::test]
async fn reads_installed_bundles_and_incarnations() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("swingstore.sqlite");
    write_fixture(&db).await;

    let reader = SqliteStateReader::open(&db).await.unwrap();

    let ids = reader.list_installed_bundle_ids().await.unwrap();
    assert_eq!(
        ids.into_iter().collect::<Vec<_>>(),
        vec![BundleId::new("b1-aaa"), BundleId::new("b1-bbb")]
    );
    assert!(reader.is_installed(&BundleId::new("b1-aaa")).await.unwrap());
    assert!(!reader.is_installed(&BundleId::new("b1-ccc")).await.unwrap());

    let details = reader.vat_details("vaultFactory").await.unwrap();
    assert_eq!(details.vat_id, "v43");
    assert_eq!(details.incarnation, 1);
    assert_eq!(details.bundle_id.as_deref(), Some("b1-77f"));

    assert_eq!(reader.current_incarnation("zoe").await.unwrap(), 0);
}

#[tokio::test]
async fn missing_rows_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("swingstore.sqlite");
    write_fixture(&db).await;

    let reader = SqliteStateReader::open(&db).await.unwrap();
    assert!(reader.kv_get("no.such.key").await.unwrap_err().is_not_found());
    assert!(reader
        .current_incarnation("provisionPool")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn refuses_to_create_a_missing_database() {
    let dir = tempfile::tempdir().unwrap();
    let result = SqliteStateReader::open(dir.path().join("absent.sqlite")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn sees_rows_committed_after_open() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("swingstore.sqlite");
    write_fixture(&db).await;
    let reader = SqliteStateReader::open(&db).await.unwrap();

    let writer = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(SqliteConnectOptions::new().filename(&db))
        .await
        .unwrap();
    sqlx::query("INSERT INTO bundles VALUES ('b1-ccc', x'00')")
        .execute(&writer)
        .await
        .unwrap();
    writer.close().await;

    assert!(reader.is_installed(&BundleId::new("b1-ccc")).await.unwrap());
}
