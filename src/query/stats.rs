use crate::query::ranges::DateRange;
use duckdb::Connection;
use serde::{Deserialize, Serialize};

/// Aggregate traffic for one website and one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteStats {
    pub pageviews: u64,
    /// Distinct sessions with at least one pageview in the window.
    pub uniques: u64,
    /// Sessions with exactly one pageview in the window.
    pub bounces: u64,
    /// Sum over sessions of seconds between their first and last pageview.
    pub totaltime: u64,
}

/// Optional equality filters narrowing the events that are aggregated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsFilters {
    pub url: Option<String>,
    pub referrer: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device: Option<String>,
    pub country: Option<String>,
}

impl StatsFilters {
    pub const fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.referrer.is_none()
            && self.browser.is_none()
            && self.os.is_none()
            && self.device.is_none()
            && self.country.is_none()
    }

    /// Extra `AND` clauses and their bound values, in placeholder order.
    fn where_clause(&self) -> (String, Vec<String>) {
        let columns = [
            ("url_path", &self.url),
            ("referrer_domain", &self.referrer),
            ("browser", &self.browser),
            ("os", &self.os),
            ("device", &self.device),
            ("country", &self.country),
        ];

        let mut sql = String::new();
        let mut values = Vec::new();
        for (column, value) in columns {
            if let Some(value) = value {
                sql.push_str(" AND ");
                sql.push_str(column);
                sql.push_str(" = ?");
                values.push(value.clone());
            }
        }
        (sql, values)
    }
}

/// Aggregate pageviews, uniques, bounces and total time for a website
/// within `range` (inclusive on both ends).
///
/// Always yields exactly one row; an empty window aggregates to zeros.
pub fn query_website_stats(
    conn: &Connection,
    website_id: &str,
    range: &DateRange,
    filters: &StatsFilters,
) -> Result<Vec<WebsiteStats>, duckdb::Error> {
    let (filter_sql, filter_values) = filters.where_clause();
    let sql = format!(
        "SELECT
            CAST(COALESCE(SUM(views), 0) AS BIGINT) AS pageviews,
            CAST(COUNT(*) AS BIGINT) AS uniques,
            CAST(COUNT(*) FILTER (WHERE views = 1) AS BIGINT) AS bounces,
            CAST(COALESCE(SUM(seconds), 0) AS BIGINT) AS totaltime
         FROM (
            SELECT session_id,
                   COUNT(*) AS views,
                   date_diff('second', MIN(created_at), MAX(created_at)) AS seconds
            FROM events
            WHERE website_id = ? AND event_type = 1
              AND created_at BETWEEN CAST(? AS TIMESTAMP) AND CAST(? AS TIMESTAMP){filter_sql}
            GROUP BY session_id
         ) AS sessions"
    );

    let mut values = vec![website_id.to_string(), range.start_sql(), range.end_sql()];
    values.extend(filter_values);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            duckdb::params_from_iter(values.iter().map(String::as_str)),
            |row| {
                Ok(WebsiteStats {
                    pageviews: row.get(0)?,
                    uniques: row.get(1)?,
                    bounces: row.get(2)?,
                    totaltime: row.get(3)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
