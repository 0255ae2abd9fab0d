mod favourites;
mod schema;
mod session;
mod types;

pub use schema::Database;
pub use types::{DatabaseError, StoredSession};
