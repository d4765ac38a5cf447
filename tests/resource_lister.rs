mod common;

use common::*;
use prism_load::lister::{Buckets, DataChanges, DataSources, Resolved, Tables, PAGE_SIZE};
use prism_load::transport::{MockTransport, RawResponse};
use prism_load::{DetailLevel, ResourceQuery};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn tables(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({ "id": format!("t{i}"), "name": format!("table_{i}"), "displayName": format!("Table {i}") }))
        .collect()
}

/// An id lookup is one exact GET; name and search are ignored.
#[tokio::test]
async fn test_id_lookup_issues_single_request() {
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| {
            request.url == format!("{PRISM}/tables/t42")
                && request.query_value("format") == Some("full")
                && request.query_value("limit").is_none()
        })
        .times(1)
        .returning(|_| Ok(RawResponse::json(200, &json!({ "id": "t42", "name": "payroll" }))));

    let client = client(mock);
    let query = ResourceQuery {
        id: Some("t42".to_string()),
        name: Some("ignored".to_string()),
        search: true,
        detail: DetailLevel::Full,
        ..ResourceQuery::default()
    };
    let listing = client.resources().list::<Tables>(&query).await;
    assert_eq!(listing.total(), 1);
    assert_eq!(listing.data()[0].name, "payroll");
}

#[tokio::test]
async fn test_id_lookup_not_found_is_none() {
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| request.url == format!("{PRISM}/buckets/missing"))
        .times(1)
        .returning(|_| Ok(RawResponse::new(404, "{}")));

    let client = client(mock);
    let bucket = client
        .resources()
        .get::<Buckets>("missing", DetailLevel::Summary)
        .await;
    assert!(bucket.is_none());
}

/// 250 tables in pages of 100 take three requests and come back in order.
#[tokio::test]
async fn test_list_all_pages_until_short_page() {
    let items = tables(250);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| {
            request.url == format!("{PRISM}/tables")
                && request.query_value("limit") == Some("100")
                && request.query_value("type") == Some("summary")
        })
        .returning(move |request| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(page_of(&items, &request))
        });

    let client = client(mock);
    let listing = client.resources().list::<Tables>(&ResourceQuery::all()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 250usize.div_ceil(PAGE_SIZE));
    assert!(listing.is_complete());
    assert_eq!(listing.total(), 250);
    assert_eq!(listing.total(), listing.data().len());
    assert_eq!(listing.data()[0].id.as_deref(), Some("t0"));
    assert_eq!(listing.data()[249].id.as_deref(), Some("t249"));
}

/// Search matches name or display name, ignoring case, across pages.
#[tokio::test]
async fn test_search_filters_each_page() {
    let mut items = tables(150);
    items.push(json!({ "id": "p1", "name": "payroll_2024", "displayName": "Payroll" }));
    items.push(json!({ "id": "p2", "name": "misc", "displayName": "Old PAYROLL rows" }));

    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| request.url == format!("{PRISM}/tables") && request.query_value("name").is_none())
        .times(2)
        .returning(move |request| Ok(page_of(&items, &request)));

    let client = client(mock);
    let listing = client
        .resources()
        .list::<Tables>(&ResourceQuery::search("PayRoll"))
        .await;
    let ids: Vec<_> = listing
        .data()
        .iter()
        .filter_map(|table| table.id.as_deref())
        .collect();
    assert_eq!(ids, ["p1", "p2"]);
}

/// Exact name lookups ask the server for one match, spaces become underscores.
#[tokio::test]
async fn test_exact_name_lookup_is_one_request() {
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| {
            request.url == format!("{PRISM}/tables")
                && request.query_value("name") == Some("Employee_Roster")
                && request.query_value("limit") == Some("1")
                && request.query_value("offset") == Some("0")
        })
        .times(1)
        .returning(|_| {
            Ok(RawResponse::json(
                200,
                &json!({ "total": 1, "data": [{ "id": "t1", "name": "Employee_Roster" }] }),
            ))
        });

    let client = client(mock);
    let listing = client
        .resources()
        .list::<Tables>(&ResourceQuery::by_name("Employee Roster"))
        .await;
    assert_eq!(listing.total(), 1);
}

/// A failing page ends the scan but keeps what was already gathered.
#[tokio::test]
async fn test_failed_page_returns_partial_listing() {
    let items = tables(300);
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| request.url == format!("{PRISM}/buckets"))
        .times(2)
        .returning(move |request| {
            if offset_of(&request) == 0 {
                Ok(page_of(&items, &request))
            } else {
                Ok(RawResponse::new(500, "boom"))
            }
        });

    let client = client(mock);
    let listing = client.resources().list::<Buckets>(&ResourceQuery::all()).await;
    assert_eq!(listing.total(), 100);
    assert_eq!(listing.diagnostics.len(), 1);
    assert_eq!(listing.diagnostics[0].status, 500);
    assert_eq!(listing.diagnostics[0].message, "boom");
}

/// An explicit limit without a name fetches one page at the caller's offset.
#[tokio::test]
async fn test_explicit_limit_fetches_one_page() {
    let items = tables(500);
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| {
            request.url == format!("{PRISM}/tables")
                && request.query_value("limit") == Some("20")
                && request.query_value("offset") == Some("40")
        })
        .times(1)
        .returning(move |request| Ok(page_of(&items, &request)));

    let client = client(mock);
    let listing = client
        .resources()
        .list::<Tables>(&ResourceQuery::all().limit(20).offset(40))
        .await;
    assert_eq!(listing.total(), 20);
    assert_eq!(listing.data()[0].id.as_deref(), Some("t40"));
}

/// A search honours the caller's starting offset.
#[tokio::test]
async fn test_search_starts_at_caller_offset() {
    let items = tables(120);
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| request.url == format!("{PRISM}/tables") && offset_of(request) == 100)
        .times(1)
        .returning(move |request| Ok(page_of(&items, &request)));

    let client = client(mock);
    let listing = client
        .resources()
        .list::<Tables>(&ResourceQuery::search("table_11").offset(100))
        .await;
    assert_eq!(listing.total(), 10);
}

/// Permissions detail only exists for tables.
#[tokio::test]
async fn test_permissions_detail_falls_back_for_change_tasks() {
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| {
            request.url == format!("{PRISM}/dataChanges/dc1")
                && request.query_value("type") == Some("summary")
        })
        .times(1)
        .returning(|_| {
            Ok(RawResponse::json(
                200,
                &json!({ "id": "dc1", "name": "nightly", "displayName": "Nightly" }),
            ))
        });

    let client = client(mock);
    let task = client
        .resources()
        .get::<DataChanges>("dc1", DetailLevel::Permissions)
        .await
        .expect("change task found");
    assert_eq!(task.display_name(), "Nightly");
}

/// Data sources live under the WQL root and match on alias or descriptor.
#[tokio::test]
async fn test_data_source_search_uses_wql_root() {
    let sources = vec![
        json!({ "id": "ds1", "alias": "workers", "descriptor": "All Workers" }),
        json!({ "id": "ds2", "alias": "orgs", "descriptor": "Supervisory Orgs" }),
        json!({ "id": "ds3", "alias": "positions", "descriptor": "Open WORKER Positions" }),
    ];
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| {
            request.url == format!("{WQL}/dataSources") && request.query_value("type").is_none()
        })
        .times(1)
        .returning(move |request| Ok(page_of(&sources, &request)));

    let client = client(mock);
    let listing = client
        .resources()
        .list::<DataSources>(&ResourceQuery::search("worker"))
        .await;
    let ids: Vec<_> = listing.data().iter().map(|source| source.id.as_str()).collect();
    assert_eq!(ids, ["ds1", "ds3"]);
}

#[tokio::test]
async fn test_data_source_exact_alias() {
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| {
            request.url == format!("{WQL}/dataSources") && request.query_value("alias") == Some("workers")
        })
        .times(1)
        .returning(|_| {
            Ok(RawResponse::json(
                200,
                &json!({ "data": [{ "id": "ds1", "alias": "workers", "descriptor": "All Workers" }] }),
            ))
        });

    let client = client(mock);
    let listing = client
        .resources()
        .list::<DataSources>(&ResourceQuery::by_name("workers"))
        .await;
    assert_eq!(listing.total(), 1);
}

/// One malformed item is skipped with its own diagnostic; the rest of the
/// page survives.
#[tokio::test]
async fn test_undecodable_item_skipped() {
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| request.url == format!("{PRISM}/buckets"))
        .times(1)
        .returning(|_| {
            Ok(RawResponse::json(
                200,
                &json!({ "data": [
                    { "id": "b1", "name": "first" },
                    { "name": "no id" },
                    { "id": "b3", "name": "third" }
                ] }),
            ))
        });

    let client = client(mock);
    let listing = client.resources().list::<Buckets>(&ResourceQuery::all()).await;
    let ids: Vec<_> = listing.data().iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, ["b1", "b3"]);
    assert_eq!(listing.diagnostics.len(), 1);
    assert!(listing.diagnostics[0].message.contains("offset 1"));
}

/// A skipped item still counts towards the page size, so paging goes on.
#[tokio::test]
async fn test_undecodable_item_does_not_end_scan() {
    let mut items = tables(150);
    items[10] = json!({ "displayName": "lost its id and name" });
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| request.url == format!("{PRISM}/tables"))
        .times(2)
        .returning(move |request| Ok(page_of(&items, &request)));

    let client = client(mock);
    let listing = client.resources().list::<Tables>(&ResourceQuery::all()).await;
    assert_eq!(listing.total(), 149);
    assert_eq!(listing.diagnostics.len(), 1);
}

/// Null names and aliases decode as absent.
#[tokio::test]
async fn test_null_attributes_decode() {
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| request.url == format!("{PRISM}/dataChanges"))
        .times(1)
        .returning(|_| {
            Ok(RawResponse::json(
                200,
                &json!({ "data": [
                    { "id": "dc1", "name": "nightly", "displayName": null },
                    { "id": "dc2", "name": null, "displayName": "Nightly Orgs" }
                ] }),
            ))
        });
    mock.expect_send()
        .withf(|request| request.url == format!("{WQL}/dataSources"))
        .times(1)
        .returning(|_| {
            Ok(RawResponse::json(
                200,
                &json!({ "data": [{ "id": "ds1", "alias": null, "descriptor": "All Workers" }] }),
            ))
        });

    let client = client(mock);
    let tasks = client
        .resources()
        .list::<DataChanges>(&ResourceQuery::search("nightly"))
        .await;
    assert!(tasks.is_complete());
    assert_eq!(tasks.total(), 2);
    assert_eq!(tasks.data()[0].display_name(), "");
    assert_eq!(tasks.data()[1].name, None);

    let sources = client
        .resources()
        .list::<DataSources>(&ResourceQuery::search("workers"))
        .await;
    assert_eq!(sources.total(), 1);
    assert_eq!(sources.data()[0].alias(), "");
}

/// An id query resolves to the bare resource, anything else to a listing.
#[tokio::test]
async fn test_resolve_single_and_many() {
    let items = tables(3);
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| request.url == format!("{PRISM}/tables/t1"))
        .times(1)
        .returning(|_| Ok(RawResponse::json(200, &json!({ "id": "t1", "name": "table_1" }))));
    mock.expect_send()
        .withf(|request| request.url == format!("{PRISM}/tables/gone"))
        .times(1)
        .returning(|_| Ok(RawResponse::new(404, "{}")));
    mock.expect_send()
        .withf(|request| request.url == format!("{PRISM}/tables"))
        .times(1)
        .returning(move |request| Ok(page_of(&items, &request)));

    let client = client(mock);
    let lister = client.resources();

    match lister.resolve::<Tables>(&ResourceQuery::by_id("t1")).await {
        Resolved::Single(Some(table)) => assert_eq!(table.name, "table_1"),
        other => panic!("expected a single table, got {other:?}"),
    }
    assert_eq!(
        lister.resolve::<Tables>(&ResourceQuery::by_id("gone")).await,
        Resolved::Single(None)
    );
    match lister.resolve::<Tables>(&ResourceQuery::all()).await {
        Resolved::Many(listing) => assert_eq!(listing.total(), 3),
        other => panic!("expected a listing, got {other:?}"),
    }
}

/// A partial listing surfaces its first failure next to the gathered data.
#[tokio::test]
async fn test_partial_listing_into_result() {
    let items = tables(250);
    let mut mock = MockTransport::new();
    expect_token(&mut mock);
    mock.expect_send()
        .withf(|request| request.url == format!("{PRISM}/tables"))
        .times(2)
        .returning(move |request| {
            if offset_of(&request) == 0 {
                Ok(page_of(&items, &request))
            } else {
                Ok(RawResponse::new(503, "unavailable"))
            }
        });
    mock.expect_send()
        .withf(|request| request.url == format!("{PRISM}/buckets"))
        .times(1)
        .returning(|_| Ok(RawResponse::json(200, &json!({ "data": [{ "id": "b1" }] }))));

    let client = client(mock);
    let partial = client.resources().list::<Tables>(&ResourceQuery::all()).await;
    let (gathered, diagnostic) = partial.into_result().expect_err("second page failed");
    assert_eq!(gathered.total(), 100);
    assert_eq!(diagnostic.status, 503);

    let whole = client.resources().list::<Buckets>(&ResourceQuery::all()).await;
    assert_eq!(whole.into_result().map(|c| c.total()).ok(), Some(1));
}
