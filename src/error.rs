use axum::response::{IntoResponse, Response};

use crate::response::ApiResponse;
use crate::validator::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// ストア通信の失敗。内容はログにのみ出力する
    #[error("Backend error: {0}")]
    Backend(String),
}

// 抽出器のリジェクションも同じエンベロープで返す
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiResponse::from(self).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
