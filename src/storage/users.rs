use duckdb::Connection;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Prefix that makes leaked keys easy to recognise in logs and scanners.
const API_KEY_PREFIX: &str = "sp_";

/// A dashboard user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub is_admin: bool,
}

/// Create a user with a random id.
pub fn create_user(
    conn: &Connection,
    username: &str,
    is_admin: bool,
) -> Result<User, duckdb::Error> {
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        username: username.to_string(),
        is_admin,
    };
    conn.execute(
        "INSERT INTO users (id, username, is_admin) VALUES (?, ?, ?)",
        duckdb::params![user.id, user.username, user.is_admin],
    )?;
    Ok(user)
}

/// Issue a new API key for `user_id` and return it in plaintext.
///
/// Only the SHA-256 hash is stored; the plaintext cannot be recovered later.
pub fn create_api_key(conn: &Connection, user_id: &str) -> Result<String, duckdb::Error> {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let key = format!("{API_KEY_PREFIX}{}", hex::encode(bytes));

    conn.execute(
        "INSERT INTO api_keys (key_hash, user_id) VALUES (?, ?)",
        duckdb::params![hash_api_key(&key), user_id],
    )?;
    Ok(key)
}

/// Resolve the user owning a plaintext API key.
pub fn find_user_by_api_key(conn: &Connection, key: &str) -> Result<Option<User>, duckdb::Error> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.is_admin
         FROM api_keys k JOIN users u ON u.id = k.user_id
         WHERE k.key_hash = ?",
    )?;
    match stmt.query_row(duckdb::params![hash_api_key(key)], |row| {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            is_admin: row.get(2)?,
        })
    }) {
        Ok(user) => Ok(Some(user)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Hex-encoded SHA-256 of an API key.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::storage::schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_api_key_round_trip() {
        let conn = setup_test_db();
        let user = create_user(&conn, "alice", false).unwrap();
        let key = create_api_key(&conn, &user.id).unwrap();

        assert!(key.starts_with(API_KEY_PREFIX));
        assert_eq!(find_user_by_api_key(&conn, &key).unwrap(), Some(user));
    }

    #[test]
    fn test_unknown_key() {
        let conn = setup_test_db();
        create_user(&conn, "alice", false).unwrap();
        assert_eq!(find_user_by_api_key(&conn, "sp_deadbeef").unwrap(), None);
    }

    #[test]
    fn test_plaintext_key_not_stored() {
        let conn = setup_test_db();
        let user = create_user(&conn, "admin", true).unwrap();
        let key = create_api_key(&conn, &user.id).unwrap();

        let stored: String = conn
            .prepare("SELECT key_hash FROM api_keys")
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap();
        assert_ne!(stored, key);
        assert_eq!(stored, hash_api_key(&key));
    }

    #[test]
    fn test_keys_are_unique() {
        let conn = setup_test_db();
        let user = create_user(&conn, "bob", false).unwrap();
        let a = create_api_key(&conn, &user.id).unwrap();
        let b = create_api_key(&conn, &user.id).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = hash_api_key("sp_example");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
