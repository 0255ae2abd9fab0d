//! Catalog browsing core for a streaming-style movie and TV front end.
//!
//! Categories are declared once in a static registry. Fetching a page of a
//! category goes through [`catalog::CatalogClient::dispatch`], which reports a
//! request followed by exactly one outcome; the outcomes drive one observable
//! slice per category in [`catalog::CatalogStore`]. Favourites and the signed-in
//! user sit beside the catalog and decorate what it returns.

pub mod app;
pub mod catalog;
pub mod config;
pub mod favourites;
pub mod search;
pub mod session;
pub mod storage;
pub mod util;
