use crate::query::ranges::{format_timestamp, timestamp_from_micros};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use serde::Serialize;

/// A tracked website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Website {
    pub id: String,
    pub name: String,
    pub domain: String,
    /// Owning user; `None` for websites only admins can see.
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Look up a website by id.
pub fn get_website_by_id(conn: &Connection, id: &str) -> Result<Option<Website>, duckdb::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, name, domain, user_id, epoch_us(created_at) FROM websites WHERE id = ?",
    )?;
    match stmt.query_row(duckdb::params![id], |row| {
        Ok(Website {
            id: row.get(0)?,
            name: row.get(1)?,
            domain: row.get(2)?,
            user_id: row.get(3)?,
            created_at: timestamp_from_micros(row.get(4)?),
        })
    }) {
        Ok(website) => Ok(Some(website)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Insert a website row.
pub fn create_website(conn: &Connection, website: &Website) -> Result<(), duckdb::Error> {
    conn.execute(
        "INSERT INTO websites (id, name, domain, user_id, created_at)
         VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP))",
        duckdb::params![
            website.id,
            website.name,
            website.domain,
            website.user_id,
            format_timestamp(website.created_at)
        ],
    )?;
    Ok(())
}
