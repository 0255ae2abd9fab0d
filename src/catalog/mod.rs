//! Catalog fetching and per-category state.
//!
//! - [`registry`]: static table of categories per browsing context
//! - [`dispatcher`]: one read per call, reported as request then outcome
//! - [`store`]: one observable slice per category
//! - [`view`]: resolves presentation requests and starts fetches

pub mod dispatcher;
pub mod item;
pub mod query;
pub mod registry;
pub mod store;
pub mod view;

pub use dispatcher::{CatalogClient, FetchError, FetchMode, FetchOutcome, HttpTransport, Transport};
pub use item::{genre_name, Item, MediaType};
pub use query::ApiEndpoint;
pub use registry::{resolve, CategoryContext, CategoryDescriptor, RegistryError, SliceKey};
pub use store::{CatalogStore, Slice, SlicePhase};
pub use view::{CatalogView, CategoryBinding, CategoryFetch, PageCursor, RowInfo};
