//! 処理結果をレスポンスエンベロープ（ステータス・ヘッダー・ボディ）に変換する

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    error::{AppError, Result},
    memo_models::{Memo, MemoCreated, MemoList, MemoSummary, MemoView},
};

/// 統一レスポンス。ボディが無い場合は空文字列を返す
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    body: Option<Value>,
}

impl ApiResponse {
    fn json<T: Serialize>(status: StatusCode, payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(body) => Self {
                status,
                body: Some(body),
            },
            Err(e) => AppError::Backend(format!("failed to encode response: {e}")).into(),
        }
    }

    fn message(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: Some(json!({ "message": message })),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
        }
    }
}

#[cfg(test)]
impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

impl From<AppError> for ApiResponse {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(e) => {
                tracing::info!(field = e.field(), "Validation failed");
                Self::message(StatusCode::BAD_REQUEST, &e.to_string())
            }
            AppError::MalformedRequest(detail) => {
                tracing::info!(%detail, "Rejected request body");
                Self::message(StatusCode::BAD_REQUEST, "Request body is invalid")
            }
            AppError::Unauthorized(_) => Self::message(StatusCode::UNAUTHORIZED, "Not authenticated"),
            AppError::NotFound(_) => Self::message(StatusCode::NOT_FOUND, "Memo not found"),
            // 内部のエラー内容はクライアントに返さない
            AppError::Backend(detail) => {
                tracing::debug!(%detail, "Responding with internal server error");
                Self::message(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let body = self.body.map(|v| v.to_string()).unwrap_or_default();
        let mut response = (self.status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}

fn map<T>(result: Result<T>, on_success: impl FnOnce(T) -> ApiResponse) -> ApiResponse {
    match result {
        Ok(value) => on_success(value),
        Err(err) => err.into(),
    }
}

/// 作成: 201
pub fn created(result: Result<Memo>) -> ApiResponse {
    map(result, |memo| {
        ApiResponse::json(StatusCode::CREATED, &MemoCreated::from(&memo))
    })
}

/// 取得・更新: 200
pub fn memo(result: Result<Memo>) -> ApiResponse {
    map(result, |memo| ApiResponse::json(StatusCode::OK, &MemoView::from(&memo)))
}

/// 一覧: 200
pub fn listed(result: Result<Vec<MemoSummary>>) -> ApiResponse {
    map(result, |items| ApiResponse::json(StatusCode::OK, &MemoList { items }))
}

/// 削除: 204
pub fn deleted(result: Result<()>) -> ApiResponse {
    map(result, |()| ApiResponse::no_content())
}
