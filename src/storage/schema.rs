use duckdb::Connection;

const CREATE_WEBSITES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS websites (
    id          VARCHAR PRIMARY KEY,
    name        VARCHAR NOT NULL,
    domain      VARCHAR NOT NULL,
    user_id     VARCHAR,
    created_at  TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)
";

/// `event_type` 1 is a pageview, 2 a custom event.
const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS events (
    website_id      VARCHAR NOT NULL,
    session_id      VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL,
    event_type      TINYINT NOT NULL DEFAULT 1,
    url_path        VARCHAR NOT NULL DEFAULT '/',
    referrer_domain VARCHAR,
    browser         VARCHAR,
    os              VARCHAR,
    device          VARCHAR,
    country         VARCHAR(2)
)
";

const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id          VARCHAR PRIMARY KEY,
    username    VARCHAR NOT NULL UNIQUE,
    is_admin    BOOLEAN NOT NULL DEFAULT FALSE
)
";

const CREATE_API_KEYS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS api_keys (
    key_hash    VARCHAR PRIMARY KEY,
    user_id     VARCHAR NOT NULL,
    created_at  TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)
";

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), duckdb::Error> {
    conn.execute_batch(CREATE_WEBSITES_TABLE)?;
    conn.execute_batch(CREATE_EVENTS_TABLE)?;
    conn.execute_batch(CREATE_USERS_TABLE)?;
    conn.execute_batch(CREATE_API_KEYS_TABLE)?;
    Ok(())
}
