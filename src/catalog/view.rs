//! Binds presentation requests to fetches and slices.
//!
//! A caller names a category (context, genre key, page); the view resolves it
//! against the registry, starts the fetch in the background and hands back
//! the descriptor so the caller can subscribe to its slice. Nothing here
//! awaits a fetch: each row observes its own slice.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::dispatcher::{CatalogClient, FetchMode};
use super::registry::{self, CategoryContext, CategoryDescriptor, RegistryError, SliceKey};
use super::store::{CatalogStore, Slice};

/// A started category fetch.
#[derive(Debug)]
pub struct CategoryFetch {
    pub descriptor: &'static CategoryDescriptor,
    pub page: u32,
    /// Completes once the outcome is in the store. Dropping it does not
    /// cancel the fetch.
    pub handle: JoinHandle<()>,
}

/// Row metadata for the home page, one per descriptor in a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowInfo {
    pub id: u32,
    pub title: &'static str,
    pub genre: &'static str,
    pub selector: SliceKey,
    pub is_large: bool,
}

impl From<&CategoryDescriptor> for RowInfo {
    fn from(d: &CategoryDescriptor) -> Self {
        Self {
            id: d.id,
            title: d.title,
            genre: d.genre_key,
            selector: d.selector,
            is_large: d.is_large,
        }
    }
}

/// Shared handle over the catalog client and its store.
#[derive(Clone)]
pub struct CatalogView {
    client: CatalogClient,
    store: Arc<CatalogStore>,
}

impl CatalogView {
    pub fn new(client: CatalogClient, store: Arc<CatalogStore>) -> Self {
        Self { client, store }
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    pub fn client(&self) -> &CatalogClient {
        &self.client
    }

    pub fn subscribe(&self, key: SliceKey) -> Option<watch::Receiver<Slice>> {
        self.store.subscribe(key)
    }

    /// Resolves a category and starts fetching `page` of it.
    ///
    /// Page 1 replaces the slice, later pages append. An unknown context or
    /// genre, or page 0, fails without touching the slice. Must be called
    /// from within a Tokio runtime.
    pub fn retrieve_category(
        &self,
        context: &str,
        genre: &str,
        page: u32,
    ) -> Result<CategoryFetch, RegistryError> {
        let descriptor = registry::resolve_named(context, genre)?;
        if page == 0 {
            return Err(RegistryError::InvalidPage(page));
        }
        Ok(self.spawn_fetch(descriptor, page, FetchMode::for_page(page)))
    }

    /// Starts page 1 of every category in `context` and returns their rows
    /// in display order without waiting for any of them.
    pub fn retrieve_rows(&self, context: &str) -> Result<Vec<(RowInfo, JoinHandle<()>)>, RegistryError> {
        let context: CategoryContext = context.parse()?;
        let rows = registry::descriptors(context)
            .iter()
            .map(|d| {
                let fetch = self.spawn_fetch(d, 1, FetchMode::Replace);
                (RowInfo::from(d), fetch.handle)
            })
            .collect::<Vec<_>>();
        tracing::info!(context = %context, rows = rows.len(), "Fetching home rows");
        Ok(rows)
    }

    fn spawn_fetch(
        &self,
        descriptor: &'static CategoryDescriptor,
        page: u32,
        mode: FetchMode,
    ) -> CategoryFetch {
        let client = self.client.clone();
        let mut writer = self.store.writer(descriptor.selector);
        let handle = tokio::spawn(async move {
            client
                .dispatch(&descriptor.query, page, mode, |outcome| writer.emit(outcome))
                .await;
        });
        CategoryFetch {
            descriptor,
            page,
            handle,
        }
    }
}

/// Keeps one category view in sync with its parameters.
///
/// A fetch starts whenever `(context, genre, page)` differs from the last
/// call; repeating the same parameters is a no-op.
pub struct CategoryBinding {
    view: CatalogView,
    current: Option<(String, String, u32)>,
    descriptor: Option<&'static CategoryDescriptor>,
}

impl CategoryBinding {
    pub fn new(view: CatalogView) -> Self {
        Self {
            view,
            current: None,
            descriptor: None,
        }
    }

    /// Descriptor of the last successfully bound category.
    pub fn descriptor(&self) -> Option<&'static CategoryDescriptor> {
        self.descriptor
    }

    /// Returns the started fetch, or `None` if the parameters are unchanged.
    ///
    /// On `NotFound` the binding is cleared so the caller renders nothing.
    /// Page 0 is refused and leaves the binding as it was.
    pub fn update(
        &mut self,
        context: &str,
        genre: &str,
        page: u32,
    ) -> Result<Option<CategoryFetch>, RegistryError> {
        if page == 0 {
            return Err(RegistryError::InvalidPage(page));
        }
        let same = matches!(
            &self.current,
            Some((c, g, p)) if c == context && g == genre && *p == page
        );
        if same {
            return Ok(None);
        }

        self.current = Some((context.to_string(), genre.to_string(), page));
        match self.view.retrieve_category(context, genre, page) {
            Ok(fetch) => {
                self.descriptor = Some(fetch.descriptor);
                Ok(Some(fetch))
            }
            Err(e) => {
                self.descriptor = None;
                Err(e)
            }
        }
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<Slice>> {
        self.descriptor.and_then(|d| self.view.subscribe(d.selector))
    }
}

/// Next page to request in a category view.
///
/// Starts at 2: the row view has already loaded page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor(u32);

impl Default for PageCursor {
    fn default() -> Self {
        Self(2)
    }
}

impl PageCursor {
    pub fn page(self) -> u32 {
        self.0
    }

    /// Moves to the following page and returns it.
    pub fn load_more(&mut self) -> u32 {
        self.0 = self.0.saturating_add(1);
        self.0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::dispatcher::{FetchError, Transport};
    use crate::catalog::query::ApiEndpoint;
    use crate::util::validate_base_url;
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::sync::Mutex;
    use url::Url;

    /// Answers every request with an empty page and records the URL.
    #[derive(Default)]
    struct Recorder {
        urls: Mutex<Vec<Url>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
            self.urls.lock().unwrap().push(url.clone());
            Ok(br#"{"results":[]}"#.to_vec())
        }
    }

    fn view() -> (CatalogView, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let endpoint = ApiEndpoint::new(
            validate_base_url("https://api.example.com/3").unwrap(),
            SecretString::from("k".to_string()),
            "en-US",
            "US",
        );
        let client = CatalogClient::new(endpoint, recorder.clone());
        (CatalogView::new(client, Arc::new(CatalogStore::new())), recorder)
    }

    #[tokio::test]
    async fn test_unknown_genre_starts_no_fetch() {
        let (view, recorder) = view();
        let err = view.retrieve_category("movies", "western", 1).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
        tokio::task::yield_now().await;
        assert!(recorder.urls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rows_cover_context_in_order() {
        let (view, recorder) = view();
        let rows = view.retrieve_rows("tvseries").unwrap();
        let ids: Vec<u32> = rows.iter().map(|(r, _)| r.id).collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
        assert!(rows[0].0.is_large);
        assert_eq!(rows[1].0.genre, "netflix");

        for (_, handle) in rows {
            handle.await.unwrap();
        }
        let urls = recorder.urls.lock().unwrap();
        assert_eq!(urls.len(), 10);
        assert!(urls.iter().all(|u| u.as_str().contains("page=1")));
    }

    #[tokio::test]
    async fn test_binding_refetches_only_on_change() {
        let (view, recorder) = view();
        let mut binding = CategoryBinding::new(view);

        let first = binding.update("movies", "horror", 2).unwrap().unwrap();
        first.handle.await.unwrap();
        assert!(binding.update("movies", "horror", 2).unwrap().is_none());

        let next = binding.update("movies", "horror", 3).unwrap().unwrap();
        next.handle.await.unwrap();
        assert_eq!(recorder.urls.lock().unwrap().len(), 2);
        assert_eq!(binding.descriptor().unwrap().genre_key, "horror");
        assert!(binding.subscribe().is_some());
    }

    #[tokio::test]
    async fn test_binding_clears_on_not_found() {
        let (view, _) = view();
        let mut binding = CategoryBinding::new(view);
        binding.update("movies", "action", 1).unwrap();
        assert!(binding.update("movies", "musicals", 1).is_err());
        assert!(binding.descriptor().is_none());
        assert!(binding.subscribe().is_none());
    }

    #[tokio::test]
    async fn test_page_zero_leaves_slice_untouched() {
        let (view, recorder) = view();
        let key = SliceKey::new("movies.action");
        view.store().update(key, |slice| {
            let ticket = slice.begin(FetchMode::Replace);
            slice.succeed(ticket, FetchMode::Replace, vec![crate::catalog::Item::new(1, "A")])
        });
        let mut rx = view.subscribe(key).unwrap();
        rx.borrow_and_update();

        let err = view.retrieve_category("movies", "action", 0).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPage(0)));
        tokio::task::yield_now().await;

        assert!(!rx.has_changed().unwrap());
        let slice = view.store().snapshot(key).unwrap();
        assert_eq!(slice.data().len(), 1);
        assert_eq!(slice.error(), None);
        assert!(recorder.urls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_binding_refuses_page_zero() {
        let (view, recorder) = view();
        let mut binding = CategoryBinding::new(view);
        binding.update("movies", "war", 1).unwrap().unwrap().handle.await.unwrap();

        assert!(matches!(
            binding.update("movies", "war", 0),
            Err(RegistryError::InvalidPage(0))
        ));
        assert_eq!(binding.descriptor().unwrap().genre_key, "war");
        assert!(binding.update("movies", "war", 1).unwrap().is_none());
        assert_eq!(recorder.urls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_page_cursor() {
        let mut cursor = PageCursor::default();
        assert_eq!(cursor.page(), 2);
        assert_eq!(cursor.load_more(), 3);
        assert_eq!(cursor.load_more(), 4);
        cursor.reset();
        assert_eq!(cursor.page(), 2);
    }
}
