//! The favourites overlay.
//!
//! Favourite status lives only here. Items in category slices and search
//! results are fetched with `is_favourite == false`; readers call
//! [`FavouritesSet::decorate`] to see the real status, so toggling in one
//! place is reflected everywhere on the next read.

use anyhow::Result;

use crate::catalog::Item;
use crate::storage::Database;

/// Favourited items keyed by id, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FavouritesSet {
    entries: Vec<Item>,
}

impl FavouritesSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from stored snapshots. Later duplicates of an id are
    /// ignored.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let mut set = Self::new();
        for item in items {
            set.add(&item);
        }
        set
    }

    /// Adds a snapshot of `item`. Returns `false` if its id is already
    /// present, in which case the set is unchanged.
    pub fn add(&mut self, item: &Item) -> bool {
        if self.is_favourite(item.id) {
            return false;
        }
        let mut snapshot = item.clone();
        snapshot.is_favourite = true;
        self.entries.push(snapshot);
        true
    }

    /// Removes the entry for `item_id`, returning it.
    pub fn remove(&mut self, item_id: u64) -> Option<Item> {
        let index = self.entries.iter().position(|i| i.id == item_id)?;
        Some(self.entries.remove(index))
    }

    pub fn is_favourite(&self, item_id: u64) -> bool {
        self.entries.iter().any(|i| i.id == item_id)
    }

    /// Adds `item` if absent, removes it otherwise. Returns the new status.
    pub fn toggle(&mut self, item: &Item) -> bool {
        if self.remove(item.id).is_some() {
            false
        } else {
            self.add(item)
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sets `is_favourite` on each item from this set.
    pub fn decorate(&self, items: &mut [Item]) {
        for item in items {
            item.is_favourite = self.is_favourite(item.id);
        }
    }

    pub fn decorated(&self, items: &[Item]) -> Vec<Item> {
        let mut items = items.to_vec();
        self.decorate(&mut items);
        items
    }
}

/// A user's favourites, written through to the database.
///
/// Each change is persisted before the in-memory set is touched, so a failed
/// write leaves both sides unchanged.
pub struct Favourites {
    db: Database,
    user_id: String,
    set: FavouritesSet,
}

impl Favourites {
    pub async fn load(db: Database, user_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        let set = FavouritesSet::from_items(db.get_favourites(&user_id).await?);
        tracing::debug!(user_id = %user_id, count = set.len(), "Loaded favourites");
        Ok(Self { db, user_id, set })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn set(&self) -> &FavouritesSet {
        &self.set
    }

    pub async fn add(&mut self, item: &Item) -> Result<bool> {
        if self.set.is_favourite(item.id) {
            return Ok(false);
        }
        let mut snapshot = item.clone();
        snapshot.is_favourite = true;
        self.db.add_favourite(&self.user_id, &snapshot).await?;
        tracing::info!(item_id = item.id, title = %item.fallback_title(), "Added favourite");
        Ok(self.set.add(&snapshot))
    }

    pub async fn remove(&mut self, item_id: u64) -> Result<bool> {
        if !self.set.is_favourite(item_id) {
            return Ok(false);
        }
        self.db.remove_favourite(&self.user_id, item_id).await?;
        tracing::info!(item_id = item_id, "Removed favourite");
        Ok(self.set.remove(item_id).is_some())
    }

    /// Flips the status of `item` from the set's own view, ignoring whatever
    /// `is_favourite` the caller's copy carries. Returns the new status.
    pub async fn toggle(&mut self, item: &Item) -> Result<bool> {
        if self.set.is_favourite(item.id) {
            self.remove(item.id).await?;
            Ok(false)
        } else {
            self.add(item).await?;
            Ok(true)
        }
    }
}
