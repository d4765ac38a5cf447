//! Paginated lookup shared by every listable resource kind.
//!
//! A [`ResourceQuery`] is resolved in one of three ways:
//!
//! 1. `id` set: one exact `GET {path}/{id}`, no paging; every other field
//!    is ignored.
//! 2. `name` set without `search`: one request filtered server-side by the
//!    exact name with `limit=1`.
//! 3. anything else: pages of [`PAGE_SIZE`] are fetched until a short page
//!    arrives, filtering each page client-side when a `name` is given.
//!
//! A failed page ends the scan; what was gathered so far is returned along
//! with a [`Diagnostic`]. An item that does not decode is skipped with its
//! own diagnostic and the scan goes on. These operations never fail.

use crate::collection::{Listing, ResourceCollection};
use crate::config::Endpoints;
use crate::error::Diagnostic;
use crate::gateway::HttpGateway;
use crate::model::{Bucket, ChangeTask, DataSource, TableSchema};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Largest page the list endpoints serve.
pub const PAGE_SIZE: usize = 100;

/// How much of each resource the service returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DetailLevel {
    #[default]
    Summary,
    Full,
    /// Tables only; other kinds fall back to `Summary`.
    Permissions,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Summary => "summary",
            DetailLevel::Full => "full",
            DetailLevel::Permissions => "permissions",
        }
    }
}

/// What to look up for one resource kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceQuery {
    /// Exact name, or a substring when `search` is set.
    pub name: Option<String>,
    /// Exact id; takes precedence over every other field.
    pub id: Option<String>,
    /// Page size for a single-page listing without a name.
    pub limit: Option<usize>,
    /// Position of the first item requested.
    pub offset: Option<usize>,
    pub detail: DetailLevel,
    /// Treat `name` as a case-insensitive substring over name and display
    /// name.
    pub search: bool,
}

impl ResourceQuery {
    /// Every resource of the kind.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Exact name match, at most one result.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Case-insensitive substring match on name and display name.
    pub fn search(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            search: true,
            ..Self::default()
        }
    }

    pub fn detail(mut self, detail: DetailLevel) -> Self {
        self.detail = detail;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    fn effective_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRoot {
    Prism,
    Wql,
}

/// Describes one listable resource: where it lives and how it is matched.
pub trait ResourceKind {
    type Item: DeserializeOwned + Send;

    const LABEL: &'static str;
    const ROOT: ApiRoot = ApiRoot::Prism;
    const PATH: &'static str;
    /// Query parameter carrying the detail level on an id lookup.
    const ID_DETAIL_PARAM: Option<&'static str>;
    /// Query parameter carrying the detail level on a list request.
    const LIST_DETAIL_PARAM: Option<&'static str> = Some("type");
    /// Query parameter for an exact server-side name match.
    const NAME_PARAM: &'static str = "name";
    const SUPPORTS_PERMISSIONS: bool = false;

    /// Server-side form of an exact name.
    fn exact_name(name: &str) -> String {
        name.to_string()
    }

    /// The attributes a substring search looks at.
    fn searchable_names(item: &Self::Item) -> [&str; 2];

    /// `needle` must already be lowercase.
    fn matches(item: &Self::Item, needle: &str) -> bool {
        Self::searchable_names(item)
            .iter()
            .any(|candidate| candidate.to_lowercase().contains(needle))
    }
}

pub struct Tables;
pub struct Buckets;
pub struct DataChanges;
pub struct DataSources;

impl ResourceKind for Tables {
    type Item = TableSchema;

    const LABEL: &'static str = "tables";
    const PATH: &'static str = "/tables";
    const ID_DETAIL_PARAM: Option<&'static str> = Some("format");
    const SUPPORTS_PERMISSIONS: bool = true;

    fn exact_name(name: &str) -> String {
        name.replace(' ', "_")
    }

    fn searchable_names(item: &TableSchema) -> [&str; 2] {
        [item.name.as_str(), item.display_name()]
    }
}

impl ResourceKind for Buckets {
    type Item = Bucket;

    const LABEL: &'static str = "buckets";
    const PATH: &'static str = "/buckets";
    const ID_DETAIL_PARAM: Option<&'static str> = Some("format");

    fn searchable_names(item: &Bucket) -> [&str; 2] {
        [item.name.as_str(), item.display_name()]
    }
}

impl ResourceKind for DataChanges {
    type Item = ChangeTask;

    const LABEL: &'static str = "dataChanges";
    const PATH: &'static str = "/dataChanges";
    const ID_DETAIL_PARAM: Option<&'static str> = Some("type");

    fn searchable_names(item: &ChangeTask) -> [&str; 2] {
        [item.name(), item.display_name()]
    }
}

impl ResourceKind for DataSources {
    type Item = DataSource;

    const LABEL: &'static str = "dataSources";
    const ROOT: ApiRoot = ApiRoot::Wql;
    const PATH: &'static str = "/dataSources";
    const ID_DETAIL_PARAM: Option<&'static str> = None;
    const LIST_DETAIL_PARAM: Option<&'static str> = None;
    const NAME_PARAM: &'static str = "alias";

    fn searchable_names(item: &DataSource) -> [&str; 2] {
        [item.alias(), item.descriptor()]
    }
}

/// Outcome of [`ResourceLister::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    /// Exact id lookup: the resource, or `None` when it was not found.
    Single(Option<T>),
    Many(Listing<T>),
}

impl<T> Resolved<T> {
    pub fn into_listing(self) -> Listing<T> {
        match self {
            Resolved::Single(item) => {
                Listing::from(ResourceCollection::from(item.into_iter().collect::<Vec<_>>()))
            }
            Resolved::Many(listing) => listing,
        }
    }
}

/// Lookup over every [`ResourceKind`], borrowed from a
/// [`PrismClient`](crate::client::PrismClient).
pub struct ResourceLister<'a> {
    gateway: &'a HttpGateway,
    endpoints: &'a Endpoints,
}

impl<'a> ResourceLister<'a> {
    pub fn new(gateway: &'a HttpGateway, endpoints: &'a Endpoints) -> Self {
        Self { gateway, endpoints }
    }

    pub async fn resolve<K: ResourceKind>(&self, query: &ResourceQuery) -> Resolved<K::Item> {
        match query.effective_id() {
            Some(id) => Resolved::Single(self.get::<K>(id, query.detail).await),
            None => Resolved::Many(self.list::<K>(query).await),
        }
    }

    /// Exact lookup by id; `None` for anything but a 200.
    pub async fn get<K: ResourceKind>(&self, id: &str, detail: DetailLevel) -> Option<K::Item> {
        let url = format!("{}/{}", self.url::<K>(), id);
        let mut params = Vec::new();
        if let Some(param) = K::ID_DETAIL_PARAM {
            params.push((param, effective_detail::<K>(detail).as_str().to_string()));
        }
        debug!(kind = K::LABEL, id, "get by id");

        let response = self.gateway.get_with(&url, &params).await;
        if response.status == 200 {
            response.json()
        } else {
            None
        }
    }

    /// List operation; an `id` in the query degrades to a 0/1-element listing.
    pub async fn list<K: ResourceKind>(&self, query: &ResourceQuery) -> Listing<K::Item> {
        if let Some(id) = query.effective_id() {
            let item = self.get::<K>(id, query.detail).await;
            return Resolved::Single(item).into_listing();
        }

        let url = self.url::<K>();
        let mut params = Vec::new();
        if let Some(param) = K::LIST_DETAIL_PARAM {
            params.push((
                param,
                effective_detail::<K>(query.detail).as_str().to_string(),
            ));
        }

        if let (Some(name), false) = (&query.name, query.search) {
            params.push((K::NAME_PARAM, K::exact_name(name)));
            debug!(kind = K::LABEL, name = %name, "exact name lookup");
            return scan_pages(self.gateway, &url, &params, 0, 1, false, |_: &K::Item| true).await;
        }

        if let (None, false, Some(limit)) = (&query.name, query.search, query.limit) {
            let offset = query.offset.unwrap_or(0);
            debug!(kind = K::LABEL, limit, offset, "single page listing");
            return scan_pages(self.gateway, &url, &params, offset, limit, false, |_: &K::Item| true)
                .await;
        }

        let needle = query.name.as_ref().map(|name| name.to_lowercase());
        let start = query.offset.unwrap_or(0);
        debug!(kind = K::LABEL, search = ?needle, start, "scanning all pages");
        let listing = scan_pages(
            self.gateway,
            &url,
            &params,
            start,
            PAGE_SIZE,
            true,
            |item: &K::Item| match needle.as_deref() {
                Some(needle) => K::matches(item, needle),
                None => true,
            },
        )
        .await;
        debug!(kind = K::LABEL, total = listing.total(), "scan finished");
        listing
    }

    fn url<K: ResourceKind>(&self) -> String {
        let root = match K::ROOT {
            ApiRoot::Prism => &self.endpoints.prism,
            ApiRoot::Wql => &self.endpoints.wql,
        };
        format!("{root}{}", K::PATH)
    }
}

fn effective_detail<K: ResourceKind>(detail: DetailLevel) -> DetailLevel {
    if detail == DetailLevel::Permissions && !K::SUPPORTS_PERMISSIONS {
        warn!(
            kind = K::LABEL,
            "permissions detail is only available for tables, using summary"
        );
        DetailLevel::Summary
    } else {
        detail
    }
}

/// Items stay raw so one malformed entry can't sink its whole page.
#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    data: Vec<Value>,
}

/// Fetches `{url}?limit=..&offset=..` pages starting at `start_offset`.
///
/// With `follow` set, the next offset is requested only after a full page;
/// a short page is the only end-of-data signal. Items rejected by `keep`
/// or that fail to decode are dropped but still count towards the page
/// size; each undecodable item leaves a [`Diagnostic`].
pub(crate) async fn scan_pages<T, F>(
    gateway: &HttpGateway,
    url: &str,
    params: &[(&str, String)],
    start_offset: usize,
    page_size: usize,
    follow: bool,
    mut keep: F,
) -> Listing<T>
where
    T: DeserializeOwned,
    F: FnMut(&T) -> bool,
{
    let page_size = page_size.max(1);
    let mut listing = Listing::default();
    let mut offset = start_offset;

    loop {
        let mut page_params = params.to_vec();
        page_params.push(("limit", page_size.to_string()));
        page_params.push(("offset", offset.to_string()));

        let response = gateway.get_with(url, &page_params).await;
        if response.status != 200 {
            listing.diagnostics.push(Diagnostic {
                url: url.to_string(),
                status: response.status,
                message: response.text(),
            });
            break;
        }

        let page: Page = match response.json() {
            Some(page) => page,
            None => {
                listing.diagnostics.push(Diagnostic {
                    url: url.to_string(),
                    status: response.status,
                    message: "page body could not be decoded".to_string(),
                });
                break;
            }
        };

        let fetched = page.data.len();
        for (index, raw) in page.data.into_iter().enumerate() {
            match serde_json::from_value::<T>(raw) {
                Ok(item) => {
                    if keep(&item) {
                        listing.collection.push(item);
                    }
                }
                Err(e) => {
                    warn!(url, offset = offset + index, error = %e, "skipping undecodable item");
                    listing.diagnostics.push(Diagnostic {
                        url: url.to_string(),
                        status: response.status,
                        message: format!("item at offset {} could not be decoded: {e}", offset + index),
                    });
                }
            }
        }

        if !follow || fetched < page_size {
            break;
        }
        offset += page_size;
    }

    listing
}
