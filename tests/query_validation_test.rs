//! Integration tests for query validation and result serialization.
//!
//! These tests verify that the query guard rejects anything that does not
//! start with SELECT, and that every outcome serializes to the documented
//! JSON shape.

use serde_json::{Value as JsonValue, json};
use sql_query_mcp::error::DbError;
use sql_query_mcp::models::{ErrorCode, QueryResult};
use sql_query_mcp::tools::guard::validate;

/// Test that write statements are rejected with InvalidQuery.
#[test]
fn test_query_rejects_writes() {
    for sql in [
        "INSERT INTO users (name) VALUES ('test')",
        "UPDATE users SET name = 'changed' WHERE id = 1",
        "DELETE FROM users WHERE id = 1",
        "CREATE TABLE test (id INT PRIMARY KEY)",
        "DROP TABLE users",
        "TRUNCATE users",
        "REPLACE INTO users VALUES (1, 'x')",
    ] {
        let err = validate(sql).unwrap_err();
        assert!(
            matches!(err, DbError::InvalidQuery { .. }),
            "Should be InvalidQuery for {sql:?}, got: {:?}",
            err
        );
        assert_eq!(err.code(), ErrorCode::InvalidQuery);
    }
}

/// Test that reads other than SELECT are rejected too (prefix rule only).
#[test]
fn test_query_rejects_non_select_reads() {
    for sql in ["SHOW TABLES", "EXPLAIN SELECT 1", "DESCRIBE users", "WITH t AS (SELECT 1) SELECT * FROM t"] {
        assert!(validate(sql).is_err(), "{sql:?} should be rejected");
    }
}

/// Test that SELECT statements pass regardless of case and whitespace.
#[test]
fn test_query_allows_select() {
    for sql in [
        "SELECT * FROM users",
        "select id from users",
        "\t\n  SeLeCt 1  \n",
        "SELECT(1)",
    ] {
        assert!(validate(sql).is_ok(), "{sql:?} should be allowed");
    }
}

/// Test that the rejection message echoes a bounded preview.
#[test]
fn test_rejection_message_preview() {
    let long = format!("UPDATE t SET c = '{}'", "x".repeat(200));
    let result: QueryResult = validate(&long).unwrap_err().into();
    let message = result.message().unwrap();
    assert!(message.contains("UPDATE t SET"));
    assert!(message.contains("..."));
    assert!(!message.contains(&"x".repeat(100)));
}

#[test]
fn test_success_shape() {
    let mut row = serde_json::Map::new();
    row.insert("id".to_string(), json!(1));
    row.insert("name".to_string(), json!("Alice"));

    let value: JsonValue = serde_json::from_str(&QueryResult::success(vec![row]).to_json()).unwrap();
    assert_eq!(
        value,
        json!({"success": true, "data": [{"id": 1, "name": "Alice"}]})
    );
}

#[test]
fn test_failure_shapes() {
    let value: JsonValue =
        serde_json::from_str(&QueryResult::from(DbError::invalid_query("DROP")).to_json()).unwrap();
    assert_eq!(value["success"], json!(false));
    assert_eq!(value["error_code"], json!("INVALID_QUERY"));
    assert!(value.get("timeout_seconds").is_none());

    let value: JsonValue =
        serde_json::from_str(&QueryResult::from(DbError::timeout("3024", 15)).to_json()).unwrap();
    assert_eq!(value["error_code"], json!("TIMEOUT"));
    assert_eq!(value["timeout_seconds"], json!(15));
    assert!(value["message"].as_str().unwrap().contains("15"));
}

#[test]
fn test_non_ascii_is_preserved() {
    let mut row = serde_json::Map::new();
    row.insert("name".to_string(), json!("张三"));
    let payload = QueryResult::success(vec![row]).to_json();
    assert!(payload.contains("张三"));
}
