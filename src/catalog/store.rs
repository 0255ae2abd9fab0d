use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use super::dispatcher::{FetchMode, FetchOutcome};
use super::item::Item;
use super::registry::{self, SliceKey};

/// Lifecycle position of a [`Slice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlicePhase {
    Idle,
    Loading,
    Ready,
    Errored,
}

/// Proof that a request was recorded on a slice.
///
/// Every replace-mode request starts a new listing generation; terminal
/// outcomes whose ticket predates the slice's current generation are stale
/// and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Fetch state for one category: `{loading, error, data}`.
///
/// Data is kept while a request is pending, so a re-fetch shows the previous
/// items alongside the loading flag until the outcome lands.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    phase: SlicePhase,
    error: Option<String>,
    data: Vec<Item>,
    generation: u64,
}

impl Default for Slice {
    fn default() -> Self {
        Self {
            phase: SlicePhase::Idle,
            error: None,
            data: Vec::new(),
            generation: 0,
        }
    }
}

impl Slice {
    pub fn phase(&self) -> SlicePhase {
        self.phase
    }

    pub fn loading(&self) -> bool {
        self.phase == SlicePhase::Loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn data(&self) -> &[Item] {
        &self.data
    }

    /// Records a request. Clears any error; `data` is left untouched.
    pub fn begin(&mut self, mode: FetchMode) -> Ticket {
        if mode == FetchMode::Replace {
            self.generation += 1;
        }
        self.phase = SlicePhase::Loading;
        self.error = None;
        Ticket(self.generation)
    }

    /// Applies a successful page. Returns `false` if the ticket is stale.
    pub fn succeed(&mut self, ticket: Ticket, mode: FetchMode, items: Vec<Item>) -> bool {
        if self.is_stale(ticket) {
            return false;
        }
        match mode {
            FetchMode::Replace => self.data = items,
            // Duplicates across pages are kept as delivered.
            FetchMode::Append => self.data.extend(items),
        }
        self.phase = SlicePhase::Ready;
        self.error = None;
        true
    }

    /// Applies a failure: prior data is discarded. Returns `false` if the
    /// ticket is stale.
    pub fn fail(&mut self, ticket: Ticket, reason: String) -> bool {
        if self.is_stale(ticket) {
            return false;
        }
        self.phase = SlicePhase::Errored;
        self.error = Some(reason);
        self.data.clear();
        true
    }

    /// Feeds one dispatcher outcome through the slice.
    ///
    /// `ticket` carries the request between the `Requested` outcome and its
    /// terminal outcome. Returns whether the slice changed.
    pub fn apply(&mut self, ticket: &mut Option<Ticket>, outcome: FetchOutcome) -> bool {
        match outcome {
            FetchOutcome::Requested(mode) => {
                *ticket = Some(self.begin(mode));
                true
            }
            FetchOutcome::Succeeded { mode, items } => {
                let t = ticket.take().unwrap_or(Ticket(self.generation));
                self.succeed(t, mode, items)
            }
            FetchOutcome::Failed(reason) => {
                let t = ticket.take().unwrap_or(Ticket(self.generation));
                self.fail(t, reason)
            }
        }
    }

    fn is_stale(&self, ticket: Ticket) -> bool {
        ticket.0 < self.generation
    }
}

/// One observable [`Slice`] per [`SliceKey`] in the registry.
///
/// Slices are created once and live as long as the store. Subscribers get a
/// `watch::Receiver`; dropping it is the unsubscribe.
pub struct CatalogStore {
    slices: HashMap<SliceKey, watch::Sender<Slice>>,
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::with_keys(registry::slice_keys())
    }

    pub fn with_keys(keys: impl IntoIterator<Item = SliceKey>) -> Self {
        let slices = keys
            .into_iter()
            .map(|key| (key, watch::Sender::new(Slice::default())))
            .collect();
        Self { slices }
    }

    pub fn keys(&self) -> impl Iterator<Item = SliceKey> + '_ {
        self.slices.keys().copied()
    }

    /// Current value of a slice.
    pub fn snapshot(&self, key: SliceKey) -> Option<Slice> {
        self.slices.get(&key).map(|tx| tx.borrow().clone())
    }

    pub fn subscribe(&self, key: SliceKey) -> Option<watch::Receiver<Slice>> {
        self.slices.get(&key).map(|tx| tx.subscribe())
    }

    /// Runs `f` against a slice and notifies subscribers if it returns `true`.
    /// Returns `None` for unknown keys.
    pub fn update(&self, key: SliceKey, f: impl FnOnce(&mut Slice) -> bool) -> Option<bool> {
        let tx = self.slices.get(&key)?;
        Some(tx.send_if_modified(f))
    }

    /// Writer that routes dispatcher outcomes into one slice.
    pub fn writer(self: &Arc<Self>, key: SliceKey) -> SliceWriter {
        SliceWriter {
            store: Arc::clone(self),
            key,
            ticket: None,
        }
    }
}

/// Routes one request's outcomes into its slice.
pub struct SliceWriter {
    store: Arc<CatalogStore>,
    key: SliceKey,
    ticket: Option<Ticket>,
}

impl SliceWriter {
    pub fn emit(&mut self, outcome: FetchOutcome) {
        let terminal = outcome.is_terminal();
        let ticket = &mut self.ticket;
        match self.store.update(self.key, |slice| slice.apply(ticket, outcome)) {
            Some(false) if terminal => {
                tracing::debug!(slice = %self.key, "Discarded stale fetch outcome");
            }
            None => {
                tracing::warn!(slice = %self.key, "Fetch outcome for unknown slice");
            }
            _ => {}
        }
    }
}
