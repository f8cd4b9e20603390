//! DuckDB-backed implementation of the snapshot collaborators.

use crate::api::auth::{self, AuthContext};
use crate::query::ranges::DateRange;
use crate::query::stats::{self, StatsFilters, WebsiteStats};
use crate::snapshot::{StatsSource, ViewPolicy, WebsiteLookup};
use crate::storage::users::{self, User};
use crate::storage::websites::{self, Website};
use async_trait::async_trait;
use duckdb::Connection;
use parking_lot::Mutex;
use std::sync::Arc;

/// Failure reported by a store collaborator.
#[derive(Debug)]
pub enum StoreError {
    Database(duckdb::Error),
    TaskFailed(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Database(e) => write!(f, "Database error: {e}"),
            Self::TaskFailed(msg) => write!(f, "Query task failed: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<duckdb::Error> for StoreError {
    fn from(e: duckdb::Error) -> Self {
        Self::Database(e)
    }
}

/// Shared handle to the analytics database.
///
/// Every query runs on the blocking pool against its own cloned connection,
/// so concurrent reads from one request do not queue behind a single lock.
#[derive(Clone)]
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Returns the underlying connection for writes and test seeding.
    pub const fn conn(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    async fn run<T, F>(&self, query: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, duckdb::Error> + Send + 'static,
    {
        let conn = self.conn.lock().try_clone()?;
        tokio::task::spawn_blocking(move || query(&conn))
            .await
            .map_err(|e| StoreError::TaskFailed(e.to_string()))?
            .map_err(StoreError::from)
    }

    /// Cheap liveness probe for the detailed health check.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.run(|conn| conn.execute_batch("SELECT 1")).await
    }

    pub async fn find_user_by_api_key(&self, key: &str) -> Result<Option<User>, StoreError> {
        let key = key.to_string();
        self.run(move |conn| users::find_user_by_api_key(conn, &key))
            .await
    }
}

#[async_trait]
impl WebsiteLookup for DuckDbStore {
    async fn get_website_by_id(&self, id: &str) -> Result<Option<Website>, StoreError> {
        let id = id.to_string();
        self.run(move |conn| websites::get_website_by_id(conn, &id))
            .await
    }
}

#[async_trait]
impl StatsSource for DuckDbStore {
    async fn get_website_stats(
        &self,
        website_id: &str,
        range: DateRange,
        filters: &StatsFilters,
    ) -> Result<Vec<WebsiteStats>, StoreError> {
        let website_id = website_id.to_string();
        let filters = filters.clone();
        self.run(move |conn| stats::query_website_stats(conn, &website_id, &range, &filters))
            .await
    }
}

#[async_trait]
impl ViewPolicy for DuckDbStore {
    async fn can_view_website(
        &self,
        caller: &AuthContext,
        website_id: &str,
    ) -> Result<bool, StoreError> {
        auth::can_view_website(caller, website_id, self).await
    }
}
