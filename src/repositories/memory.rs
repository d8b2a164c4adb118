use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::memo::{
    MemoFields, MemoItem, MemoKey, MemoListing, MemoStore, StoreError, StoreResult,
};

/// プロセス内のストア（ローカル実行・テスト用）
///
/// パーティションごとに挿入順を保持する。
#[derive(Default)]
pub struct InMemoryMemoStore {
    partitions: RwLock<HashMap<String, Vec<MemoItem>>>,
}

impl InMemoryMemoStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.partitions.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl MemoStore for InMemoryMemoStore {
    async fn put_item(&self, item: &MemoItem) -> StoreResult<()> {
        let mut partitions = self.partitions.write().await;
        let rows = partitions.entry(item.user_id.clone()).or_default();
        match rows.iter_mut().find(|row| row.memo_id == item.memo_id) {
            Some(row) => *row = item.clone(),
            None => rows.push(item.clone()),
        }
        Ok(())
    }

    async fn get_item(&self, key: &MemoKey) -> StoreResult<Option<MemoItem>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(&key.user_id)
            .and_then(|rows| rows.iter().find(|row| row.memo_id == key.memo_id))
            .cloned())
    }

    async fn update_item(&self, key: &MemoKey, fields: &MemoFields) -> StoreResult<()> {
        let mut partitions = self.partitions.write().await;
        let row = partitions
            .get_mut(&key.user_id)
            .and_then(|rows| rows.iter_mut().find(|row| row.memo_id == key.memo_id))
            .ok_or(StoreError::Missing)?;
        row.title = fields.title.clone();
        row.content = fields.content.clone();
        row.updated_at = Some(fields.updated_at);
        Ok(())
    }

    async fn delete_item(&self, key: &MemoKey) -> StoreResult<()> {
        let mut partitions = self.partitions.write().await;
        if let Some(rows) = partitions.get_mut(&key.user_id) {
            rows.retain(|row| row.memo_id != key.memo_id);
            if rows.is_empty() {
                partitions.remove(&key.user_id);
            }
        }
        Ok(())
    }

    async fn query(&self, user_id: &str) -> StoreResult<Vec<MemoListing>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(user_id)
            .map(|rows| {
                rows.iter()
                    .map(|row| MemoListing {
                        memo_id: row.memo_id.clone(),
                        title: row.title.clone(),
                        created_at: row.created_at,
                        updated_at: row.updated_at,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(user_id: &str, memo_id: &str, title: &str) -> MemoItem {
        MemoItem {
            user_id: user_id.into(),
            memo_id: memo_id.into(),
            title: title.into(),
            content: String::new(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn partitions_are_isolated_by_user() {
        let store = InMemoryMemoStore::new();
        store.put_item(&item("u1", "m1", "a")).await.unwrap();
        store.put_item(&item("u2", "m2", "b")).await.unwrap();

        assert!(store.get_item(&MemoKey::new("u2", "m1")).await.unwrap().is_none());
        assert_eq!(store.query("u1").await.unwrap().len(), 1);
        assert!(store.query("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn query_keeps_insertion_order() {
        let store = InMemoryMemoStore::new();
        for id in ["c", "a", "b"] {
            store.put_item(&item("u1", id, id)).await.unwrap();
        }
        let ids: Vec<_> = store
            .query("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.memo_id)
            .collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn update_sets_fields_and_keeps_created_at() {
        let store = InMemoryMemoStore::new();
        let original = item("u1", "m1", "old");
        store.put_item(&original).await.unwrap();

        let updated_at = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let fields = MemoFields {
            title: "new".into(),
            content: "body".into(),
            updated_at,
        };
        store.update_item(&MemoKey::new("u1", "m1"), &fields).await.unwrap();

        let row = store.get_item(&MemoKey::new("u1", "m1")).await.unwrap().unwrap();
        assert_eq!(row.title, "new");
        assert_eq!(row.content, "body");
        assert_eq!(row.created_at, original.created_at);
        assert_eq!(row.updated_at, Some(updated_at));

        let err = store
            .update_item(&MemoKey::new("u1", "missing"), &fields)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Missing));
        assert!(store.get_item(&MemoKey::new("u1", "missing")).await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn delete_removes_only_the_key() {
        let store = InMemoryMemoStore::new();
        store.put_item(&item("u1", "m1", "a")).await.unwrap();
        store.put_item(&item("u1", "m2", "b")).await.unwrap();

        store.delete_item(&MemoKey::new("u1", "m1")).await.unwrap();
        assert!(store.get_item(&MemoKey::new("u1", "m1")).await.unwrap().is_none());
        assert!(store.get_item(&MemoKey::new("u1", "m2")).await.unwrap().is_some());
    }
}
