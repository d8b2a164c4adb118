use crate::{
    error::{AppError, Result},
    memo_models::{Memo, MemoPayload, MemoSummary},
    repositories::{MemoFields, MemoItem, MemoKey, MemoStore, StoreError},
    validator,
};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::Arc;
use tracing::{Span, error, info, instrument};
use uuid::Uuid;

/// ユーザー単位でパーティションされたメモの操作
///
/// 呼び出し元で認証済みの user_id を受け取る。他ユーザーのメモは存在しないものとして扱う。
/// 同一キーへの同時更新は調停しない（ストアの原子性に従う）。
pub struct MemoService {
    store: Arc<dyn MemoStore>,
    span: Span,
}

impl MemoService {
    /// `span` は各操作のスパンの親になる
    pub fn new(store: Arc<dyn MemoStore>, span: Span) -> Self {
        Self { store, span }
    }

    #[instrument(name = "memo.create", parent = &self.span, skip_all, fields(user_id = %user_id))]
    pub async fn create(&self, user_id: &str, payload: &MemoPayload) -> Result<Memo> {
        // バリデーション
        let input = validator::validate(payload.title.as_ref(), payload.content.as_ref())?;

        let memo = Memo {
            user_id: user_id.to_string(),
            memo_id: Uuid::new_v4().to_string(),
            title: input.title,
            content: input.content,
            created_at: now(),
            updated_at: None,
        };

        // IDは新規生成なので存在確認はしない
        self.store
            .put_item(&MemoItem::from(&memo))
            .await
            .map_err(|e| store_failure("create", user_id, Some(&memo.memo_id), e))?;

        info!(memo_id = %memo.memo_id, "Memo created");
        Ok(memo)
    }

    #[instrument(name = "memo.get", parent = &self.span, skip_all, fields(user_id = %user_id, memo_id = %memo_id))]
    pub async fn get(&self, user_id: &str, memo_id: &str) -> Result<Memo> {
        let key = MemoKey::new(user_id, memo_id);
        let memo = self.find("get", &key).await?;
        info!("Memo retrieved");
        Ok(memo)
    }

    #[instrument(name = "memo.list", parent = &self.span, skip_all, fields(user_id = %user_id))]
    pub async fn list(&self, user_id: &str) -> Result<Vec<MemoSummary>> {
        let listings = self
            .store
            .query(user_id)
            .await
            .map_err(|e| store_failure("list", user_id, None, e))?;

        let mut summaries: Vec<MemoSummary> =
            listings.into_iter().map(MemoSummary::from).collect();
        // 最終操作日時の降順。同時刻はストアの返した順序を保つ（安定ソート）
        summaries.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));

        info!(count = summaries.len(), "Memo list retrieved");
        Ok(summaries)
    }

    #[instrument(name = "memo.update", parent = &self.span, skip_all, fields(user_id = %user_id, memo_id = %memo_id))]
    pub async fn update(&self, user_id: &str, memo_id: &str, payload: &MemoPayload) -> Result<Memo> {
        // ストアへのアクセス前に検証する
        let input = validator::validate(payload.title.as_ref(), payload.content.as_ref())?;

        let key = MemoKey::new(user_id, memo_id);
        let current = self.find("update", &key).await?;

        let fields = MemoFields {
            title: input.title,
            content: input.content,
            updated_at: timestamp_after(current.created_at),
        };
        // 確認後に削除された場合も 404
        self.store.update_item(&key, &fields).await.map_err(|e| match e {
            StoreError::Missing => {
                info!("Memo vanished before update");
                AppError::NotFound(format!("Memo {memo_id} not found"))
            }
            e => store_failure("update", user_id, Some(memo_id), e),
        })?;

        info!("Memo updated");
        Ok(Memo {
            title: fields.title,
            content: fields.content,
            updated_at: Some(fields.updated_at),
            ..current
        })
    }

    #[instrument(name = "memo.delete", parent = &self.span, skip_all, fields(user_id = %user_id, memo_id = %memo_id))]
    pub async fn delete(&self, user_id: &str, memo_id: &str) -> Result<()> {
        // 存在確認（404と204を区別するため）
        let key = MemoKey::new(user_id, memo_id);
        self.find("delete", &key).await?;

        self.store
            .delete_item(&key)
            .await
            .map_err(|e| store_failure("delete", user_id, Some(memo_id), e))?;

        info!("Memo deleted");
        Ok(())
    }

    async fn find(&self, operation: &'static str, key: &MemoKey) -> Result<Memo> {
        match self.store.get_item(key).await {
            Ok(Some(item)) => Ok(item.into()),
            Ok(None) => {
                info!("Memo not found");
                Err(AppError::NotFound(format!("Memo {} not found", key.memo_id)))
            }
            Err(e) => Err(store_failure(operation, &key.user_id, Some(&key.memo_id), e)),
        }
    }
}

fn store_failure(
    operation: &'static str,
    user_id: &str,
    memo_id: Option<&str>,
    err: StoreError,
) -> AppError {
    error!(
        operation,
        user_id,
        memo_id = memo_id.unwrap_or("-"),
        error = %err,
        "Store request failed"
    );
    AppError::Backend(err.to_string())
}

/// 現在時刻（ミリ秒精度）
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// `created_at` より厳密に後の現在時刻
fn timestamp_after(created_at: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > created_at {
        now
    } else {
        created_at + Duration::milliseconds(1)
    }
}
