//! Website traffic snapshot: today, yesterday, this month and lifetime
//! numbers for one website, flattened into a fixed six-number array.

use crate::api::auth::AuthContext;
use crate::query::ranges::{DateRange, SnapshotRanges};
use crate::query::stats::{StatsFilters, WebsiteStats};
use crate::storage::websites::Website;
use crate::store::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::time::Duration;

#[async_trait]
pub trait WebsiteLookup: Send + Sync {
    async fn get_website_by_id(&self, id: &str) -> Result<Option<Website>, StoreError>;
}

#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn get_website_stats(
        &self,
        website_id: &str,
        range: DateRange,
        filters: &StatsFilters,
    ) -> Result<Vec<WebsiteStats>, StoreError>;
}

#[async_trait]
pub trait ViewPolicy: Send + Sync {
    async fn can_view_website(
        &self,
        caller: &AuthContext,
        website_id: &str,
    ) -> Result<bool, StoreError>;
}

/// One of the four aggregation windows of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Today,
    Yesterday,
    ThisMonth,
    SinceCreation,
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::ThisMonth => "this month",
            Self::SinceCreation => "since creation",
        })
    }
}

#[derive(Debug)]
pub enum SnapshotError {
    Unauthorized,
    NotFound(String),
    DataUnavailable(Window),
    Timeout(Duration),
    Store(StoreError),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "caller may not view this website"),
            Self::NotFound(id) => write!(f, "website {id} not found"),
            Self::DataUnavailable(window) => write!(f, "no statistics row for {window}"),
            Self::Timeout(deadline) => write!(f, "statistics queries exceeded {deadline:?}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<StoreError> for SnapshotError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// `[today.uniques, today.pageviews, yesterday.uniques, yesterday.pageviews,
/// this_month.pageviews, since_creation.pageviews]`, serialized as a bare
/// JSON array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot(pub [u64; 6]);

impl StatsSnapshot {
    pub const fn from_windows(
        today: &WebsiteStats,
        yesterday: &WebsiteStats,
        this_month: &WebsiteStats,
        since_creation: &WebsiteStats,
    ) -> Self {
        Self([
            today.uniques,
            today.pageviews,
            yesterday.uniques,
            yesterday.pageviews,
            this_month.pageviews,
            since_creation.pageviews,
        ])
    }
}

/// Builds a [`StatsSnapshot`] from its collaborators.
pub struct SnapshotAssembler<'a> {
    websites: &'a dyn WebsiteLookup,
    stats: &'a dyn StatsSource,
    policy: &'a dyn ViewPolicy,
    timezone: Tz,
    deadline: Duration,
}

impl<'a> SnapshotAssembler<'a> {
    pub fn new(
        websites: &'a dyn WebsiteLookup,
        stats: &'a dyn StatsSource,
        policy: &'a dyn ViewPolicy,
    ) -> Self {
        Self {
            websites,
            stats,
            policy,
            timezone: Tz::UTC,
            deadline: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub const fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Deadline shared by the four statistics queries.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Assemble the snapshot for `website_id` as seen at `now`.
    ///
    /// Authorization is checked before anything else is read. The four
    /// window queries run concurrently; the first failure or the deadline
    /// ends the whole request.
    pub async fn assemble(
        &self,
        website_id: &str,
        caller: &AuthContext,
        now: DateTime<Utc>,
    ) -> Result<StatsSnapshot, SnapshotError> {
        if !self.policy.can_view_website(caller, website_id).await? {
            tracing::info!(website_id, "Snapshot denied");
            return Err(SnapshotError::Unauthorized);
        }

        let website = self
            .websites
            .get_website_by_id(website_id)
            .await?
            .ok_or_else(|| SnapshotError::NotFound(website_id.to_string()))?;

        let ranges = SnapshotRanges::at(now, website.created_at, self.timezone);
        tracing::debug!(website_id, ?ranges, "Assembling snapshot");

        let filters = StatsFilters::default();
        let fan_out = async {
            tokio::try_join!(
                self.stats.get_website_stats(website_id, ranges.today, &filters),
                self.stats.get_website_stats(website_id, ranges.yesterday, &filters),
                self.stats.get_website_stats(website_id, ranges.this_month, &filters),
                self.stats.get_website_stats(website_id, ranges.since_creation, &filters),
            )
        };
        let (today, yesterday, this_month, since_creation) =
            tokio::time::timeout(self.deadline, fan_out)
                .await
                .map_err(|_| SnapshotError::Timeout(self.deadline))??;

        Ok(StatsSnapshot::from_windows(
            &first_row(today, Window::Today)?,
            &first_row(yesterday, Window::Yesterday)?,
            &first_row(this_month, Window::ThisMonth)?,
            &first_row(since_creation, Window::SinceCreation)?,
        ))
    }
}

fn first_row(rows: Vec<WebsiteStats>, window: Window) -> Result<WebsiteStats, SnapshotError> {
    rows.into_iter()
        .next()
        .ok_or(SnapshotError::DataUnavailable(window))
}
