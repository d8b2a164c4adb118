use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{HeaderMap, header, request::Parts};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{AppError, Result};

// JWTヘッダー
static JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// アクセストークンを格納するCookie名
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

// JWTペイロード(クレーム)
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaim {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aud: Option<String>,
    #[serde(default)]
    sub: Option<String>, // User ID
    iat: usize,
    jti: String,
    exp: usize,
}

/// トークンを検証してユーザーIDを取り出す
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(JWT_ALGORITHM);
        // aud / iss は設定されている場合のみ検証する
        match &config.audience {
            Some(aud) => {
                validation.set_audience(&[aud]);
                validation.required_spec_claims.insert("aud".to_string());
            }
            None => validation.validate_aud = false,
        }
        if let Some(iss) = &config.issuer {
            validation.set_issuer(&[iss]);
            validation.required_spec_claims.insert("iss".to_string());
        }
        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// トークンからユーザーID（subクレーム）を抽出
    pub fn user_id_from_token(&self, token: &str) -> Result<String> {
        let token_data = decode::<JwtClaim>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Rejected access token");
            AppError::Unauthorized("Not authenticated".to_string())
        })?;
        match token_data.claims.sub {
            Some(sub) if !sub.is_empty() => Ok(sub),
            _ => Err(AppError::Unauthorized("Not authenticated".to_string())),
        }
    }
}

/// リクエストからユーザーIDを解決する
///
/// Authorizationヘッダー（Bearer）を優先し、無ければ `access_token` Cookie を使う。
/// いずれも無い、または検証に失敗した場合は `Unauthorized`。
pub fn resolve_user_id(headers: &HeaderMap, verifier: &TokenVerifier) -> Result<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    let token = match bearer {
        Some(token) if !token.is_empty() => token,
        _ => CookieJar::from_headers(headers)
            .get(ACCESS_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?,
    };

    verifier.user_id_from_token(&token)
}

/// 認証済みユーザー。全てのメモ操作でストアアクセスより前に抽出される
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let verifier = Arc::<TokenVerifier>::from_ref(state);
        let user_id = resolve_user_id(&parts.headers, &verifier).inspect_err(|_| {
            tracing::info!(method = %parts.method, path = %parts.uri.path(), "Authentication failed");
        })?;
        Ok(Self { user_id })
    }
}

/// アクセストークンの発行（ローカル検証・テスト用）
pub fn issue_access_token(user_id: &str, config: &JwtConfig, ttl: Duration) -> Result<String> {
    let now = Utc::now();
    let claims = JwtClaim {
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
        sub: Some(user_id.to_string()),
        iat: now.timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        exp: (now + ttl).timestamp() as usize,
    };

    let key = EncodingKey::from_secret(config.secret.as_bytes());
    encode(&Header::new(JWT_ALGORITHM), &claims, &key)
        .map_err(|e| AppError::Backend(format!("failed to sign token: {e}")))
}
