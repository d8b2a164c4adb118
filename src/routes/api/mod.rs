use axum::Router;

use crate::server::AppState;

mod memo;

pub fn create_api_routes() -> Router<AppState> {
    Router::new().merge(memo::create_memo_routes())
}
