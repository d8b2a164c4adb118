use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    routing::get,
};

use crate::{
    auth::AuthenticatedUser,
    memo_models::MemoPayload,
    response::{self, ApiResponse},
    server::AppState,
};

pub fn create_memo_routes() -> Router<AppState> {
    Router::new()
        .route("/memo", get(list_memos).post(create_memo))
        .route(
            "/memo/{memo_id}",
            get(get_memo).put(update_memo).delete(delete_memo),
        )
}

async fn list_memos(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResponse {
    response::listed(state.memo_service.list(&user.user_id).await)
}

async fn create_memo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    body: Bytes,
) -> ApiResponse {
    let result = match MemoPayload::from_body(&body) {
        Ok(payload) => state.memo_service.create(&user.user_id, &payload).await,
        Err(e) => Err(e),
    };
    response::created(result)
}

async fn get_memo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(memo_id): Path<String>,
) -> ApiResponse {
    response::memo(state.memo_service.get(&user.user_id, &memo_id).await)
}

async fn update_memo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(memo_id): Path<String>,
    body: Bytes,
) -> ApiResponse {
    let result = match MemoPayload::from_body(&body) {
        Ok(payload) => {
            state
                .memo_service
                .update(&user.user_id, &memo_id, &payload)
                .await
        }
        Err(e) => Err(e),
    };
    response::memo(result)
}

async fn delete_memo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(memo_id): Path<String>,
) -> ApiResponse {
    response::deleted(state.memo_service.delete(&user.user_id, &memo_id).await)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::{
        auth::issue_access_token,
        config::JwtConfig,
        repositories::{InMemoryMemoStore, MemoStore},
        server::{AppState, build_router},
    };

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: "router-test-secret".into(),
            audience: None,
            issuer: None,
        }
    }

    struct TestApp {
        router: axum::Router,
        store: Arc<InMemoryMemoStore>,
    }

    impl TestApp {
        fn new() -> Self {
            let store = Arc::new(InMemoryMemoStore::new());
            let state = AppState::new(&jwt_config(), store.clone() as Arc<dyn MemoStore>);
            Self {
                router: build_router(state),
                store,
            }
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            user: Option<&str>,
            body: Option<&str>,
        ) -> (StatusCode, Option<Value>) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(user) = user {
                let token =
                    issue_access_token(user, &jwt_config(), chrono::Duration::minutes(5)).unwrap();
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.unwrap_or_default().to_string()))
                .unwrap();

            let response = self.router.clone().oneshot(request).await.unwrap();
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "application/json"
            );
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body = if bytes.is_empty() {
                None
            } else {
                Some(serde_json::from_slice(&bytes).unwrap())
            };
            (status, body)
        }
    }

    #[tokio::test]
    async fn shopping_list_lifecycle() {
        let app = TestApp::new();
        let body = json!({"title": "Shopping List", "content": "- milk\n- eggs"}).to_string();

        let (status, created) = app.send(Method::POST, "/memo", Some("u1"), Some(&body)).await;
        assert_eq!(status, StatusCode::CREATED);
        let created = created.unwrap();
        assert_eq!(created["title"], "Shopping List");
        let memo_id = created["memoId"].as_str().unwrap().to_string();
        assert!(!memo_id.is_empty());

        let uri = format!("/memo/{memo_id}");
        let (status, fetched) = app.send(Method::GET, &uri, Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched.unwrap()["content"], "- milk\n- eggs");

        let (status, body) = app.send(Method::DELETE, &uri, Some("u1"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_none());

        let (status, body) = app.send(Method::GET, &uri, Some("u1"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.unwrap()["message"], "Memo not found");
    }

    #[tokio::test]
    async fn empty_title_is_rejected_without_write() {
        let app = TestApp::new();
        let body = json!({"title": "", "content": "x"}).to_string();

        let (status, body) = app.send(Method::POST, "/memo", Some("u1"), Some(&body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.unwrap()["message"].as_str().unwrap().contains("title"));
        assert_eq!(app.store.len().await, 0);
    }

    #[tokio::test]
    async fn missing_identity_is_401_before_body_parsing() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/memo", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.unwrap()["message"], "Not authenticated");

        let (status, _) = app
            .send(Method::POST, "/memo", None, Some("{not json"))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(app.store.len().await, 0);
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let app = TestApp::new();
        let (status, body) = app
            .send(Method::POST, "/memo", Some("u1"), Some("{not json"))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.unwrap()["message"], "Request body is invalid");

        let (status, _) = app
            .send(
                Method::POST,
                "/memo",
                Some("u1"),
                Some(r#"{"title":"t","content":"c","owner":"u2"}"#),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_is_empty_then_ordered_by_last_activity() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/memo", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.unwrap()["items"], json!([]));

        let create = |title: &str| json!({"title": title, "content": ""}).to_string();
        let (_, a) = app.send(Method::POST, "/memo", Some("u1"), Some(&create("A"))).await;
        let (_, b) = app.send(Method::POST, "/memo", Some("u1"), Some(&create("B"))).await;
        let a_id = a.unwrap()["memoId"].as_str().unwrap().to_string();
        let b_id = b.unwrap()["memoId"].as_str().unwrap().to_string();

        // A を更新すると先頭に来る
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let (status, updated) = app
            .send(
                Method::PUT,
                &format!("/memo/{a_id}"),
                Some("u1"),
                Some(&json!({"title": "A2", "content": "new"}).to_string()),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let updated = updated.unwrap();
        assert_eq!(updated["title"], "A2");
        assert!(updated["updatedAt"].is_string());

        let (_, body) = app.send(Method::GET, "/memo", Some("u1"), None).await;
        let items = body.unwrap()["items"].as_array().unwrap().clone();
        let ids: Vec<_> = items.iter().map(|i| i["memoId"].as_str().unwrap()).collect();
        assert_eq!(ids, [a_id.as_str(), b_id.as_str()]);
        assert!(items[0].get("content").is_none());
        assert!(items[0]["lastUpdatedAt"].is_string());
    }

    #[tokio::test]
    async fn other_users_memo_is_404_not_403() {
        let app = TestApp::new();
        let body = json!({"title": "mine", "content": "c"}).to_string();
        let (_, created) = app.send(Method::POST, "/memo", Some("owner"), Some(&body)).await;
        let uri = format!("/memo/{}", created.unwrap()["memoId"].as_str().unwrap());

        for method in [Method::GET, Method::DELETE] {
            let (status, _) = app.send(method, &uri, Some("intruder"), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let (status, _) = app.send(Method::PUT, &uri, Some("intruder"), Some(&body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.send(Method::GET, &uri, Some("owner"), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
