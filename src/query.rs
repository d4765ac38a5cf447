//! WQL row queries and data-source field listings.

use crate::collection::Listing;
use crate::config::Endpoints;
use crate::gateway::HttpGateway;
use crate::lister::{scan_pages, PAGE_SIZE};
use serde_json::Value;
use tracing::{debug, error};

/// Largest window the WQL data endpoint serves.
pub const MAX_ROWS: usize = 10_000;

/// Runs WQL queries against the tenant's WQL endpoint.
pub struct QueryExecutor<'a> {
    gateway: &'a HttpGateway,
    endpoints: &'a Endpoints,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(gateway: &'a HttpGateway, endpoints: &'a Endpoints) -> Self {
        Self { gateway, endpoints }
    }

    /// Runs a WQL query, fetching windows of `min(limit, 10000)` rows from
    /// `offset` until a short window arrives.
    ///
    /// Rows gathered before a failed request are kept; the failure is
    /// recorded as a diagnostic.
    pub async fn run(
        &self,
        query: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Listing<Value> {
        let query = query.trim();
        if query.is_empty() {
            error!("WQL query is empty");
            return Listing::default();
        }

        let window = limit.unwrap_or(MAX_ROWS).clamp(1, MAX_ROWS);
        let start = offset.unwrap_or(0);
        let url = format!("{}/data", self.endpoints.wql);
        debug!(window, start, "running WQL query");

        let listing = scan_pages(
            self.gateway,
            &url,
            &[("query", query.to_string())],
            start,
            window,
            true,
            |_: &Value| true,
        )
        .await;
        debug!(rows = listing.total(), "WQL query finished");
        listing
    }

    /// Fields of a data source. A `limit` in `1..=100` fetches one page at
    /// `offset`; anything else pages through every field.
    pub async fn data_source_fields(
        &self,
        data_source_id: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Listing<Value> {
        if data_source_id.is_empty() {
            error!("data source id is required");
            return Listing::default();
        }

        let url = format!("{}/dataSources/{data_source_id}/fields", self.endpoints.wql);
        match limit.filter(|limit| (1..=PAGE_SIZE).contains(limit)) {
            Some(limit) => {
                scan_pages(
                    self.gateway,
                    &url,
                    &[],
                    offset.unwrap_or(0),
                    limit,
                    false,
                    |_: &Value| true,
                )
                .await
            }
            None => {
                scan_pages(self.gateway, &url, &[], 0, PAGE_SIZE, true, |_: &Value| true).await
            }
        }
    }
}
