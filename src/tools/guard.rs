//! Read-only statement guard.
//!
//! The `query` tool only accepts statements whose trimmed, case-folded text
//! starts with the `SELECT` keyword. This is a syntactic prefix check: the
//! statement is not parsed, so anything after the leading keyword (including
//! a second `;`-separated statement) is not inspected. Read-only database
//! credentials remain the real line of defense.
//!
//! When several `;`-separated statements do run, their rows are concatenated
//! into a single `data` array, so rows from different statements may carry
//! different columns.

use crate::error::{DbError, DbResult};
use tracing::warn;

/// Leading keyword every accepted statement must start with.
const READ_KEYWORD: &str = "SELECT";

/// Characters of the original statement echoed back on rejection.
pub const PREVIEW_CHARS: usize = 50;

/// Validate that a statement is a read-only `SELECT`.
///
/// Leading and trailing whitespace is ignored and the keyword is matched
/// case-insensitively. The keyword must be a whole token: `SELECT*` and
/// `select(1)` pass, `SELECTED` does not.
///
/// # Examples
///
/// ```
/// use sql_query_mcp::tools::guard::validate;
///
/// assert!(validate("  select * from users").is_ok());
/// assert!(validate("DELETE FROM users").is_err());
/// ```
pub fn validate(sql: &str) -> DbResult<()> {
    if starts_with_select(sql) {
        return Ok(());
    }

    let preview = preview(sql);
    warn!(sql = %preview, "Rejected non-SELECT statement");
    Err(DbError::invalid_query(preview))
}

fn starts_with_select(sql: &str) -> bool {
    let trimmed = sql.trim();
    let Some(head) = trimmed.get(..READ_KEYWORD.len()) else {
        return false;
    };
    if !head.eq_ignore_ascii_case(READ_KEYWORD) {
        return false;
    }
    trimmed[READ_KEYWORD.len()..]
        .chars()
        .next()
        .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
}

/// First [`PREVIEW_CHARS`] characters of the untrimmed statement, with an
/// ellipsis when it was cut.
pub fn preview(sql: &str) -> String {
    let mut chars = sql.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
