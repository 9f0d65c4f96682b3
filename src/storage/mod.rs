mod schema;
mod seen;
mod types;

pub use schema::Database;
pub use seen::{MemorySeenStore, SeenLedger, SeenStore};
pub use types::{Claim, SeenRecord, StorageError};
