use anyhow::Result;
use async_trait::async_trait;

/// String-keyed persistence. Writes are last-writer-wins; `purge` clears
/// every key at once from the caller's point of view.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn purge(&self) -> Result<()>;
}
