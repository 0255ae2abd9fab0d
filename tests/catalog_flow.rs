//! Integration tests for the catalog flow: resolve a category, fetch a page,
//! and observe the slice.
//!
//! Most tests drive the client through a scripted transport so each response
//! is explicit; the last ones go over HTTP against a wiremock server.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use url::Url;

use fakeflix::catalog::{
    ApiEndpoint, CatalogClient, CatalogStore, CatalogView, CategoryBinding, FetchError,
    HttpTransport, Item, PageCursor, RegistryError, SliceKey, SlicePhase, Transport,
};
use fakeflix::favourites::FavouritesSet;
use fakeflix::util::validate_base_url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Replies from a queue; records every URL requested.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<&'static str, &'static str>>>,
    requests: Mutex<Vec<Url>>,
}

impl ScriptedTransport {
    fn push_ok(&self, body: &'static str) {
        self.replies.lock().unwrap().push_back(Ok(body));
    }

    fn push_err(&self, message: &'static str) {
        self.replies.lock().unwrap().push_back(Err(message));
    }

    fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        self.requests.lock().unwrap().push(url.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(r#"{"results":[]}"#));
        reply
            .map(|body| body.as_bytes().to_vec())
            .map_err(|message| FetchError::Transport(message.to_string()))
    }
}

fn endpoint(base: &str) -> ApiEndpoint {
    ApiEndpoint::new(
        validate_base_url(base).unwrap(),
        SecretString::from("test-key".to_string()),
        "en-US",
        "US",
    )
}

fn scripted_view() -> (CatalogView, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::default());
    let client = CatalogClient::new(endpoint("https://api.example.com/3"), transport.clone());
    (
        CatalogView::new(client, Arc::new(CatalogStore::new())),
        transport,
    )
}

fn expected(id: u64, title: &str) -> Item {
    let mut item = Item::new(id, title);
    item.is_favourite = false;
    item
}

const ACTION: SliceKey = SliceKey::new("movies.action");

// ============================================================================
// Fetch Scenarios
// ============================================================================

#[tokio::test]
async fn test_initial_load_replaces_slice() {
    let (view, transport) = scripted_view();
    transport.push_ok(r#"{"results":[{"id":1,"title":"A"},{"id":2,"title":"B"}]}"#);

    let fetch = view.retrieve_category("movies", "action", 1).unwrap();
    assert_eq!(fetch.descriptor.title, "Action");
    fetch.handle.await.unwrap();

    let slice = view.store().snapshot(ACTION).unwrap();
    assert!(!slice.loading());
    assert_eq!(slice.error(), None);
    assert_eq!(slice.data(), &[expected(1, "A"), expected(2, "B")]);
}

#[tokio::test]
async fn test_pagination_appends_in_order() {
    let (view, transport) = scripted_view();
    transport.push_ok(r#"{"results":[{"id":1,"title":"A"},{"id":2,"title":"B"}]}"#);
    transport.push_ok(r#"{"results":[{"id":3,"title":"C"}]}"#);

    let mut binding = CategoryBinding::new(view.clone());
    binding.update("movies", "action", 1).unwrap().unwrap().handle.await.unwrap();

    let cursor = PageCursor::default();
    binding
        .update("movies", "action", cursor.page())
        .unwrap()
        .unwrap()
        .handle
        .await
        .unwrap();

    let slice = view.store().snapshot(ACTION).unwrap();
    let ids: Vec<u64> = slice.data().iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(slice.phase(), SlicePhase::Ready);

    let pages: Vec<String> = transport
        .requests()
        .iter()
        .filter_map(|u| u.query_pairs().find(|(k, _)| k == "page").map(|(_, v)| v.into_owned()))
        .collect();
    assert_eq!(pages, vec!["1", "2"]);
}

#[tokio::test]
async fn test_failure_clears_data_and_records_message() {
    let (view, transport) = scripted_view();
    transport.push_ok(r#"{"results":[{"id":1,"title":"A"}]}"#);
    transport.push_err("Network Error");

    view.retrieve_category("movies", "action", 1).unwrap().handle.await.unwrap();
    view.retrieve_category("movies", "action", 2).unwrap().handle.await.unwrap();

    let slice = view.store().snapshot(ACTION).unwrap();
    assert!(!slice.loading());
    assert_eq!(slice.error(), Some("Network Error"));
    assert!(slice.data().is_empty());
}

#[tokio::test]
async fn test_retry_after_failure_recovers() {
    let (view, transport) = scripted_view();
    transport.push_err("Network Error");
    transport.push_ok(r#"{"results":[{"id":5,"title":"E"}]}"#);

    view.retrieve_category("movies", "action", 1).unwrap().handle.await.unwrap();
    assert_eq!(view.store().snapshot(ACTION).unwrap().phase(), SlicePhase::Errored);

    view.retrieve_category("movies", "action", 1).unwrap().handle.await.unwrap();
    let slice = view.store().snapshot(ACTION).unwrap();
    assert_eq!(slice.error(), None);
    assert_eq!(slice.data(), &[expected(5, "E")]);
}

#[tokio::test]
async fn test_unknown_category_triggers_no_fetch() {
    let (view, transport) = scripted_view();

    let err = view.retrieve_category("tvseries", "telenovela", 1).unwrap_err();
    assert_eq!(err.to_string(), "No category 'telenovela' in tvseries");
    assert!(matches!(
        view.retrieve_category("cartoons", "kids", 1),
        Err(RegistryError::UnknownContext(_))
    ));

    tokio::task::yield_now().await;
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_subscriber_observes_loading_then_ready() {
    let (view, transport) = scripted_view();
    transport.push_ok(r#"{"results":[{"id":1,"title":"A"}]}"#);
    let mut rx = view.subscribe(ACTION).unwrap();

    view.retrieve_category("browse", "action", 1).unwrap().handle.await.unwrap();

    assert!(rx.has_changed().unwrap());
    let slice = rx.borrow_and_update().clone();
    assert_eq!(slice.phase(), SlicePhase::Ready);
    assert_eq!(slice.data().len(), 1);
}

#[tokio::test]
async fn test_popular_shares_movie_slices() {
    let (view, transport) = scripted_view();
    transport.push_ok(r#"{"results":[{"id":9,"title":"Upcoming"}]}"#);

    let fetch = view.retrieve_category("popular", "upcoming", 1).unwrap();
    fetch.handle.await.unwrap();

    let slice = view.store().snapshot(SliceKey::new("movies.upcoming")).unwrap();
    assert_eq!(slice.data(), &[expected(9, "Upcoming")]);
}

#[tokio::test]
async fn test_favourites_decorate_fetched_items() {
    let (view, transport) = scripted_view();
    transport.push_ok(r#"{"results":[{"id":1,"title":"A"},{"id":2,"title":"B"}]}"#);
    view.retrieve_category("movies", "action", 1).unwrap().handle.await.unwrap();

    let mut favourites = FavouritesSet::new();
    favourites.add(&Item::new(2, "B"));

    let slice = view.store().snapshot(ACTION).unwrap();
    assert!(slice.data().iter().all(|i| !i.is_favourite));
    let flags: Vec<bool> = favourites
        .decorated(slice.data())
        .iter()
        .map(|i| i.is_favourite)
        .collect();
    assert_eq!(flags, vec![false, true]);
}

// ============================================================================
// Over HTTP
// ============================================================================

fn http_view(server: &MockServer) -> CatalogView {
    let transport = HttpTransport::new(reqwest::Client::new(), 1024 * 1024);
    let client = CatalogClient::new(endpoint(&server.uri()), Arc::new(transport));
    CatalogView::new(client, Arc::new(CatalogStore::new()))
}

#[tokio::test]
async fn test_home_rows_fetch_every_category() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"results":[{"id":1,"title":"A"}]}"#),
        )
        .expect(10)
        .mount(&server)
        .await;

    let view = http_view(&server);
    let rows = view.retrieve_rows("movies").unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0].0.title, "Trending Now");
    assert!(rows[0].0.is_large);
    assert!(rows[1..].iter().all(|(r, _)| !r.is_large));

    let selectors: Vec<SliceKey> = rows.iter().map(|(r, _)| r.selector).collect();
    for (_, handle) in rows {
        handle.await.unwrap();
    }
    for key in selectors {
        let slice = view.store().snapshot(key).unwrap();
        assert_eq!(slice.phase(), SlicePhase::Ready, "slice {}", key);
    }
}

#[tokio::test]
async fn test_http_error_status_lands_on_slice() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/discover/tv"))
        .and(query_param("with_genres", "10762"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let view = http_view(&server);
    view.retrieve_category("series", "kids", 1).unwrap().handle.await.unwrap();

    let slice = view.store().snapshot(SliceKey::new("series.kids")).unwrap();
    assert_eq!(slice.error(), Some("Request failed with status code 401"));
    assert!(slice.data().is_empty());
}
