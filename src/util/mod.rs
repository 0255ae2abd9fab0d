//! Utility functions shared by the catalog client and the command-line output.
//!
//! - **URL validation**: base URLs for the catalog and identity services
//! - **HTTP bodies**: size-capped response reads
//! - **Text processing**: width-aware truncation and small display helpers
//!
//! # Examples
//!
//! ```
//! use fakeflix::util::{truncate_to_width, validate_base_url, year_only};
//!
//! let base = validate_base_url("https://api.themoviedb.org/3").unwrap();
//! assert_eq!(base.host_str(), Some("api.themoviedb.org"));
//!
//! assert_eq!(year_only("1999-03-31"), Some("1999"));
//! assert_eq!(truncate_to_width("The Matrix Reloaded", 10), "The Mat...");
//! ```

mod http;
mod text;
mod url_validator;

pub use http::{read_limited_bytes, BodyError};
pub use text::{capitalize_first, display_width, strip_control_chars, truncate_to_width, year_only};
pub use url_validator::{join_path, validate_base_url, UrlValidationError};

/// Maximum accepted search query length, in characters.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
