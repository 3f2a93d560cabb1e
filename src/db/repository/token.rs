use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::*;

/// Store the hash of a freshly issued token. Earlier tokens of the same
/// user and scope stay valid.
pub fn store_token(
    conn: &Connection,
    user_id: i64,
    scope: TokenScope,
    key_hash: &[u8; 32],
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO auth_tokens (user_id, scope, key_hash, created)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, scope.as_str(), key_hash.as_slice(), Utc::now()],
    )?;
    Ok(())
}

/// Resolve a token hash to its owning user id.
pub fn find_token_owner(
    conn: &Connection,
    key_hash: &[u8; 32],
    scope: TokenScope,
) -> Result<Option<i64>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT user_id FROM auth_tokens WHERE key_hash = ?1 AND scope = ?2",
            params![key_hash.as_slice(), scope.as_str()],
            |row| row.get(0),
        )
        .optional()?)
}

/// Revoke a single token by its hash.
pub fn delete_token(
    conn: &Connection,
    key_hash: &[u8; 32],
    scope: TokenScope,
) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM auth_tokens WHERE key_hash = ?1 AND scope = ?2",
        params![key_hash.as_slice(), scope.as_str()],
    )?;
    Ok(deleted > 0)
}

/// Revoke every token the user holds, in all scopes.
pub fn delete_user_tokens(conn: &Connection, user_id: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM auth_tokens WHERE user_id = ?1", params![user_id])?)
}
