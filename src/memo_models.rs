use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// メモ本体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memo {
    pub user_id: String,
    pub memo_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Memo {
    /// 最終操作日時（更新されていなければ作成日時）
    pub fn last_updated_at(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// 一覧用の要約（content は含めない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoSummary {
    pub memo_id: String,
    pub title: String,
    #[serde(with = "millis")]
    pub last_updated_at: DateTime<Utc>,
}

/// 日時はミリ秒固定の ISO 8601 (UTC, `Z`) で読み書きする
///
/// 文字列の大小比較が時刻順と一致するよう、端数 0 でも `.000` を出力する。
pub mod millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn format(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn parse<E: Error>(s: &str) -> Result<DateTime<Utc>, E> {
        DateTime::parse_from_rfc3339(s)
            .map(|at| at.with_timezone(&Utc))
            .map_err(E::custom)
    }

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            at: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match at {
                Some(at) => serializer.serialize_some(&format(at)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| parse(&s))
                .transpose()
        }
    }
}

/// 作成・更新リクエストのボディ
///
/// 型の判定はバリデータで行うため、値は `Value` のまま受け取る
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoPayload {
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub content: Option<Value>,
}

impl MemoPayload {
    /// リクエストボディをパースする。空ボディは `{}` とみなす
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| AppError::MalformedRequest(e.to_string()))
    }
}

// レスポンス

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoCreated {
    pub memo_id: String,
    pub title: String,
    #[serde(with = "millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "millis")]
    pub last_updated_at: DateTime<Utc>,
}

impl From<&Memo> for MemoCreated {
    fn from(memo: &Memo) -> Self {
        Self {
            memo_id: memo.memo_id.clone(),
            title: memo.title.clone(),
            created_at: memo.created_at,
            last_updated_at: memo.last_updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoView {
    pub memo_id: String,
    pub title: String,
    pub content: String,
    #[serde(with = "millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "millis::option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(with = "millis")]
    pub last_updated_at: DateTime<Utc>,
}

impl From<&Memo> for MemoView {
    fn from(memo: &Memo) -> Self {
        Self {
            memo_id: memo.memo_id.clone(),
            title: memo.title.clone(),
            content: memo.content.clone(),
            created_at: memo.created_at,
            updated_at: memo.updated_at,
            last_updated_at: memo.last_updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MemoList {
    pub items: Vec<MemoSummary>,
}
