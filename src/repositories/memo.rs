use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memo_models::{Memo, MemoSummary, millis};

/// テーブルのキー（パーティションキー: user_id, ソートキー: memo_id）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoKey {
    pub user_id: String,
    pub memo_id: String,
}

impl MemoKey {
    pub fn new(user_id: impl Into<String>, memo_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            memo_id: memo_id.into(),
        }
    }
}

/// ストアに保存されるメモの形式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoItem {
    pub user_id: String,
    pub memo_id: String,
    pub title: String,
    pub content: String,
    #[serde(with = "millis")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "millis::option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<MemoItem> for Memo {
    fn from(item: MemoItem) -> Self {
        Memo {
            user_id: item.user_id,
            memo_id: item.memo_id,
            title: item.title,
            content: item.content,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

impl From<&Memo> for MemoItem {
    fn from(memo: &Memo) -> Self {
        MemoItem {
            user_id: memo.user_id.clone(),
            memo_id: memo.memo_id.clone(),
            title: memo.title.clone(),
            content: memo.content.clone(),
            created_at: memo.created_at,
            updated_at: memo.updated_at,
        }
    }
}

/// 一覧クエリの射影（memo_id, title, created_at, updated_at）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoListing {
    pub memo_id: String,
    pub title: String,
    #[serde(with = "millis")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "millis::option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<MemoListing> for MemoSummary {
    fn from(listing: MemoListing) -> Self {
        MemoSummary {
            memo_id: listing.memo_id,
            title: listing.title,
            last_updated_at: listing.updated_at.unwrap_or(listing.created_at),
        }
    }
}

/// 更新で書き換えるフィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoFields {
    pub title: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// タイムアウト・スロットリング・接続断など
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// ストアから読んだアイテムを解釈できない
    #[error("malformed item: {0}")]
    Malformed(String),
    /// 更新対象のアイテムが存在しない（更新は新規作成にならない）
    #[error("item does not exist")]
    Missing,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// キーバリューストアの最小限の操作
///
/// テーブル名は実装の生成時に束縛される。リトライは行わない。
#[async_trait]
pub trait MemoStore: Send + Sync {
    async fn put_item(&self, item: &MemoItem) -> StoreResult<()>;
    async fn get_item(&self, key: &MemoKey) -> StoreResult<Option<MemoItem>>;
    /// キーが存在しなければ [`StoreError::Missing`] を返し、何も書き込まない
    async fn update_item(&self, key: &MemoKey, fields: &MemoFields) -> StoreResult<()>;
    async fn delete_item(&self, key: &MemoKey) -> StoreResult<()>;
    /// パーティション内の全件をストアの返す順序で返す
    async fn query(&self, user_id: &str) -> StoreResult<Vec<MemoListing>>;
}
