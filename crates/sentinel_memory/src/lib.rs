pub mod memory;
pub mod records;
pub mod retention;
pub mod sqlite;
pub mod store;

pub use memory::MemoryStore;
pub use records::{keys, Records};
pub use retention::{apply_retention, RetentionReport};
pub use sqlite::SqliteStore;
pub use store::KvStore;

#[cfg(test)]
mod tests;
