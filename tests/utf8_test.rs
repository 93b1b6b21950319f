//! Integration tests for UTF-8 round trips through the query tool.

use serde_json::{Value as JsonValue, json};
use sql_query_mcp::db::PoolManager;
use sql_query_mcp::mcp::{QueryWorkers, ToolGateway};
use sql_query_mcp::models::{DatabaseType, PoolConfig};
use sql_query_mcp::tools::QUERY_TOOL_NAME;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::sync::Arc;
use tempfile::TempDir;

fn sql_args(sql: &str) -> serde_json::Map<String, JsonValue> {
    let mut args = serde_json::Map::new();
    args.insert("sql".to_string(), json!(sql));
    args
}

#[tokio::test]
async fn test_sqlite_utf8_chinese_characters() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("utf8.db");
    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true),
    )
    .await
    .unwrap();
    sqlx::raw_sql(
        "CREATE TABLE utf8_test (id INTEGER PRIMARY KEY, name TEXT, description TEXT);
         INSERT INTO utf8_test VALUES (1, '张三', '这是中文描述');
         INSERT INTO utf8_test VALUES (2, 'Zoë', 'emoji 🎉');",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let config = PoolConfig::builder(DatabaseType::SQLite)
        .database(path.to_string_lossy())
        .build()
        .unwrap();
    let gateway = ToolGateway::new(Arc::new(PoolManager::new(config)), QueryWorkers::new(2));

    let payload = gateway
        .invoke_serialized(
            QUERY_TOOL_NAME,
            Some(&sql_args("SELECT name, description FROM utf8_test ORDER BY id")),
        )
        .await;
    assert!(payload.contains("张三"), "non-ASCII must not be escaped");

    let value: JsonValue = serde_json::from_str(&payload).unwrap();
    assert_eq!(
        value["data"],
        json!([
            {"name": "张三", "description": "这是中文描述"},
            {"name": "Zoë", "description": "emoji 🎉"}
        ])
    );
}

/// Test that requires a running MySQL database.
/// Set TEST_MYSQL_URL environment variable to run this test.
#[tokio::test]
async fn test_mysql_utf8_literal() {
    let mysql_url = match std::env::var("TEST_MYSQL_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: TEST_MYSQL_URL not set");
            return;
        }
    };

    let config = PoolConfig::from_url(&mysql_url)
        .unwrap()
        .pool_size(2)
        .build()
        .unwrap();
    let gateway = ToolGateway::new(Arc::new(PoolManager::new(config)), QueryWorkers::new(2));

    let result = gateway
        .invoke(
            QUERY_TOOL_NAME,
            Some(&sql_args("SELECT '张三' AS name, '🎉' AS party")),
        )
        .await;
    assert!(result.is_success(), "{:?}", result);
    let row = &result.rows().unwrap()[0];
    assert_eq!(row["name"], json!("张三"));
    assert_eq!(row["party"], json!("🎉"));

    gateway.pool().shutdown().await;
}
