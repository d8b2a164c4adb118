use axum::{Router, extract::FromRef, http::Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::auth::TokenVerifier;
use crate::config::{Config, JwtConfig};
use crate::repositories::MemoStore;
use crate::routes::create_api_routes;
use crate::services::MemoService;

/// アプリケーション全体で共有される状態（リクエスト間で可変状態は持たない）
#[derive(Clone)]
pub struct AppState {
    pub token_verifier: Arc<TokenVerifier>,
    /// サービス層
    pub memo_service: Arc<MemoService>,
}

impl AppState {
    pub fn new(jwt: &JwtConfig, store: Arc<dyn MemoStore>) -> Self {
        let span = tracing::info_span!("memo_service");
        Self {
            token_verifier: Arc::new(TokenVerifier::new(jwt)),
            memo_service: Arc::new(MemoService::new(store, span)),
        }
    }
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.token_verifier.clone()
    }
}

pub fn build_router(state: AppState) -> Router {
    create_api_routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server(addr: SocketAddr, config: &Config, state: AppState) -> anyhow::Result<()> {
    info!("Configuring CORS...");
    let allowed_origins = config.server.get_allowed_origins(&addr)?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let app = build_router(state).layer(cors);

    let listener = TcpListener::bind(addr).await?;
    info!("Server is running on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
