use crate::api::auth::AuthContext;
use crate::api::errors::ApiError;
use crate::query::ranges::DateRange;
use crate::query::stats::{StatsFilters, WebsiteStats};
use crate::snapshot::{StatsSnapshot, StatsSource, ViewPolicy, WebsiteLookup};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::DateTime;
use serde::Deserialize;
use std::sync::Arc;

/// Validate that a website id is safe to log and to use in queries.
///
/// - Must be non-empty and at most 256 bytes.
/// - Must contain only alphanumeric ASCII characters or `.`, `-`, `_`, `:`.
pub fn validate_website_id(website_id: &str) -> Result<(), ApiError> {
    if website_id.is_empty() {
        return Err(ApiError::BadRequest(
            "website id must not be empty".to_string(),
        ));
    }
    if website_id.len() > 256 {
        return Err(ApiError::BadRequest(
            "website id must be at most 256 characters".to_string(),
        ));
    }
    let valid = website_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':'));
    if !valid {
        return Err(ApiError::BadRequest(
            "website id may only contain alphanumeric characters, '.', '-', '_', ':'".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/websites/{id}/snapshot: today/yesterday/month/lifetime numbers.
///
/// Responds with `[today.uniques, today.pageviews, yesterday.uniques,
/// yesterday.pageviews, this_month.pageviews, since_creation.pageviews]`.
pub async fn get_snapshot(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<String>,
    Extension(caller): Extension<AuthContext>,
) -> Result<Json<StatsSnapshot>, ApiError> {
    validate_website_id(&website_id)?;
    let now = state.clock.now();
    let snapshot = state.assembler().assemble(&website_id, &caller, now).await?;
    Ok(Json(snapshot))
}

/// Query parameters for the ad-hoc stats endpoint.
///
/// `start_at` and `end_at` are epoch milliseconds, both inclusive.
#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub start_at: i64,
    pub end_at: i64,
    pub url: Option<String>,
    pub referrer: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device: Option<String>,
    pub country: Option<String>,
}

impl StatsParams {
    pub fn date_range(&self) -> Result<DateRange, ApiError> {
        let start = DateTime::from_timestamp_millis(self.start_at)
            .ok_or_else(|| ApiError::BadRequest("start_at is out of range".to_string()))?;
        let end = DateTime::from_timestamp_millis(self.end_at)
            .ok_or_else(|| ApiError::BadRequest("end_at is out of range".to_string()))?;
        if end < start {
            return Err(ApiError::BadRequest(
                "end_at must not be before start_at".to_string(),
            ));
        }
        Ok(DateRange::new(start, end))
    }

    pub fn filters(&self) -> StatsFilters {
        StatsFilters {
            url: self.url.clone(),
            referrer: self.referrer.clone(),
            browser: self.browser.clone(),
            os: self.os.clone(),
            device: self.device.clone(),
            country: self.country.clone(),
        }
    }
}

/// GET /api/websites/{id}/stats: pageviews, uniques, bounces and total time
/// for an arbitrary window and filter set.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<String>,
    Extension(caller): Extension<AuthContext>,
    Query(params): Query<StatsParams>,
) -> Result<Json<WebsiteStats>, ApiError> {
    validate_website_id(&website_id)?;
    let range = params.date_range()?;

    if !state.store.can_view_website(&caller, &website_id).await? {
        return Err(ApiError::Unauthorized(
            "Not allowed to view this website".to_string(),
        ));
    }
    if state.store.get_website_by_id(&website_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Website {website_id} not found")));
    }

    let rows = tokio::time::timeout(
        state.query_timeout,
        state
            .store
            .get_website_stats(&website_id, range, &params.filters()),
    )
    .await
    .map_err(|_| ApiError::GatewayTimeout("Statistics query timed out".to_string()))??;

    rows.into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| ApiError::ServiceUnavailable("Statistics unavailable".to_string()))
}
