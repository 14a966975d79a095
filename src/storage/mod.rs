pub mod cached;
pub mod sqlite;
pub mod trait_def;

#[cfg(test)]
pub(crate) mod test_support;

pub use cached::CachedStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{Storage, StorageError, StorageResult};
