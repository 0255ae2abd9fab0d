//! Multi-search state.

use crate::catalog::{CatalogClient, Item};
use crate::util::{strip_control_chars, MAX_SEARCH_QUERY_LENGTH};

/// What the search box shows: the current input, the last results and the
/// fetch status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    input: String,
    results: Vec<Item>,
    error: Option<String>,
    loading: bool,
}

impl SearchState {
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn results(&self) -> &[Item] {
        &self.results
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn input_changed(&mut self, text: &str) {
        self.input = text.to_string();
    }

    /// Empties the input and drops any results.
    pub fn input_cleared(&mut self) {
        *self = Self::default();
    }

    pub fn request(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn succeed(&mut self, results: Vec<Item>) {
        self.loading = false;
        self.error = None;
        self.results = results;
    }

    pub fn fail(&mut self, reason: String) {
        self.loading = false;
        self.error = Some(reason);
        self.results.clear();
    }
}

/// Normalizes raw search input: control characters are dropped, surrounding
/// whitespace trimmed and the result capped at [`MAX_SEARCH_QUERY_LENGTH`]
/// characters. Returns `None` when nothing searchable is left.
pub fn normalize_query(raw: &str) -> Option<String> {
    let cleaned = strip_control_chars(raw);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_SEARCH_QUERY_LENGTH).collect())
}

/// Runs one search and records it in `state`.
///
/// Blank input clears the state without a request. Results never include
/// people and always arrive with `is_favourite == false`.
pub async fn search(client: &CatalogClient, state: &mut SearchState, raw: &str) {
    state.input_changed(raw);
    let Some(query) = normalize_query(raw) else {
        state.input_cleared();
        return;
    };

    state.request();
    match client.search(&query).await {
        Ok(mut items) => {
            for item in &mut items {
                item.is_favourite = false;
            }
            tracing::debug!(query = %query, count = items.len(), "Search complete");
            state.succeed(items);
        }
        Err(e) => {
            tracing::warn!(query = %query, error = %e, "Search failed");
            state.fail(e.to_string());
        }
    }
}
