use async_trait::async_trait;
use chrono::Local;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use super::item::{null_as_default, Item, MediaType, ResultsPage};
use super::query::{ApiEndpoint, QueryTemplate, SEARCH_MULTI};
use crate::util::{read_limited_bytes, BodyError, UrlValidationError};

/// Errors from one catalog read.
///
/// The store never inspects the kind: a failed fetch is recorded on the slice
/// as the error's display text.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Failure reported by a transport that has no more specific kind.
    #[error("{0}")]
    Transport(String),
    /// HTTP response with non-2xx status code
    #[error("Request failed with status code {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body was not the expected JSON shape
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),
    /// Pages are numbered from 1.
    #[error("Invalid page number: {0}")]
    InvalidPage(u32),
    #[error("{0} has no detail endpoint")]
    NoDetail(String),
}

impl From<BodyError> for FetchError {
    fn from(e: BodyError) -> Self {
        match e {
            BodyError::Network(e) => FetchError::Network(e),
            BodyError::TooLarge(limit) => FetchError::ResponseTooLarge(limit),
            BodyError::Incomplete { expected, received } => {
                FetchError::IncompleteResponse { expected, received }
            }
        }
    }
}

/// One outbound read. Implemented over reqwest for real use; tests swap in
/// scripted transports.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// [`Transport`] over a shared `reqwest::Client`.
///
/// One request per call: no retry, no backoff and no local timeout. Failure
/// timing is left to the HTTP stack.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        Ok(read_limited_bytes(response, self.max_bytes).await?)
    }
}

/// Whether a successful page overwrites a slice or extends it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    #[default]
    Replace,
    Append,
}

impl FetchMode {
    /// Page 1 starts a listing; every later page continues it.
    pub fn for_page(page: u32) -> Self {
        if page <= 1 {
            FetchMode::Replace
        } else {
            FetchMode::Append
        }
    }
}

/// What a dispatch reports: `Requested` first, then exactly one of
/// `Succeeded` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Requested(FetchMode),
    Succeeded { mode: FetchMode, items: Vec<Item> },
    Failed(String),
}

impl FetchOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FetchOutcome::Requested(_))
    }
}

/// Reads catalog pages through a [`Transport`].
#[derive(Clone)]
pub struct CatalogClient {
    endpoint: Arc<ApiEndpoint>,
    transport: Arc<dyn Transport>,
}

impl CatalogClient {
    pub fn new(endpoint: ApiEndpoint, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
            transport,
        }
    }

    pub fn endpoint(&self) -> &ApiEndpoint {
        &self.endpoint
    }

    /// Fetches one page of a category.
    ///
    /// Every returned item has `is_favourite == false`: the catalog knows
    /// nothing about favourites, so readers decorate items against the
    /// favourites set themselves.
    pub async fn fetch_page(&self, query: &QueryTemplate, page: u32) -> Result<Vec<Item>, FetchError> {
        if page == 0 {
            return Err(FetchError::InvalidPage(page));
        }
        let url = self
            .endpoint
            .url_for(query, Some(page), &[], Local::now().date_naive())?;
        let mut items = self.fetch_results(&url).await?;
        for item in &mut items {
            item.is_favourite = false;
        }
        Ok(items)
    }

    /// Runs one fetch and reports it through `emit`.
    ///
    /// `emit` sees `Requested(mode)` before the read starts and exactly one
    /// terminal outcome after it completes. Failures carry the error's
    /// message text. Concurrent calls are independent: nothing here
    /// deduplicates or orders them.
    pub async fn dispatch<F>(&self, query: &QueryTemplate, page: u32, mode: FetchMode, mut emit: F)
    where
        F: FnMut(FetchOutcome) + Send,
    {
        emit(FetchOutcome::Requested(mode));
        tracing::debug!(path = query.path, page = page, mode = ?mode, "Catalog fetch requested");

        match self.fetch_page(query, page).await {
            Ok(items) => {
                tracing::debug!(
                    path = query.path,
                    page = page,
                    count = items.len(),
                    "Catalog fetch succeeded"
                );
                emit(FetchOutcome::Succeeded { mode, items });
            }
            Err(e) => {
                tracing::warn!(path = query.path, page = page, error = %e, "Catalog fetch failed");
                emit(FetchOutcome::Failed(e.to_string()));
            }
        }
    }

    /// Multi-search across movies, series and people; people are dropped.
    pub async fn search(&self, text: &str) -> Result<Vec<Item>, FetchError> {
        let url = self.endpoint.url_for(
            &SEARCH_MULTI,
            None,
            &[("query", text)],
            Local::now().date_naive(),
        )?;
        let items = self.fetch_results(&url).await?;
        let before = items.len();
        let items: Vec<Item> = items.into_iter().filter(|i| !i.is_person()).collect();
        if items.len() < before {
            tracing::debug!(dropped = before - items.len(), "Filtered person results from search");
        }
        Ok(items)
    }

    /// Fetches a single movie or show by id.
    pub async fn fetch_detail(&self, media: MediaType, id: u64) -> Result<Item, FetchError> {
        let segment = media
            .detail_segment()
            .ok_or_else(|| FetchError::NoDetail(format!("{:?}", media)))?;
        let url = self.endpoint.detail_url(segment, id)?;
        let body = self.transport.get(&url).await?;
        let detail: DetailPayload = serde_json::from_slice(&body)?;
        let mut item = detail.item;
        if item.genre_ids.is_empty() {
            item.genre_ids = detail.genres.into_iter().map(|g| g.id).collect();
        }
        item.media_type = Some(media);
        item.is_favourite = false;
        Ok(item)
    }

    async fn fetch_results(&self, url: &Url) -> Result<Vec<Item>, FetchError> {
        let body = self.transport.get(url).await?;
        let page: ResultsPage = serde_json::from_slice(&body)?;
        Ok(page.results)
    }
}

/// Detail endpoints list genres as objects instead of `genre_ids`.
#[derive(serde::Deserialize)]
struct DetailPayload {
    #[serde(flatten)]
    item: Item,
    #[serde(default, deserialize_with = "null_as_default")]
    genres: Vec<GenreRef>,
}

#[derive(serde::Deserialize)]
struct GenreRef {
    id: u32,
}
