pub mod dynamodb;
pub mod memo;
pub mod memory;

use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};

pub use dynamodb::DynamoMemoStore;
pub use memo::{MemoFields, MemoItem, MemoKey, MemoStore, StoreError};
pub use memory::InMemoryMemoStore;

/// 設定に従ってストアを生成する
pub async fn connect(config: &StoreConfig) -> anyhow::Result<Arc<dyn MemoStore>> {
    let store: Arc<dyn MemoStore> = match config.backend {
        StoreBackend::Memory => Arc::new(InMemoryMemoStore::new()),
        StoreBackend::DynamoDb => Arc::new(DynamoMemoStore::connect(config).await?),
    };
    Ok(store)
}
