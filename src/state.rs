use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::snapshot::SnapshotAssembler;
use crate::store::DuckDbStore;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state handed to every handler.
pub struct AppState {
    pub store: DuckDbStore,
    /// Key for signing and verifying share tokens.
    pub secret: String,
    pub timezone: Tz,
    pub query_timeout: Duration,
    pub request_timeout: Duration,
    pub dashboard_origin: Option<String>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: DuckDbStore, secret: String, config: &Config) -> Self {
        Self {
            store,
            secret,
            timezone: config.time_zone(),
            query_timeout: config.query_timeout(),
            request_timeout: config.request_timeout(),
            dashboard_origin: config.dashboard_origin.clone(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Snapshot assembler wired to the DuckDB store.
    pub fn assembler(&self) -> SnapshotAssembler<'_> {
        SnapshotAssembler::new(&self.store, &self.store, &self.store)
            .with_timezone(self.timezone)
            .with_deadline(self.query_timeout)
    }
}
