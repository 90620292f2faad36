use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;
use crate::{auth, inventory, purchases};

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(inventory::router())
                .merge(purchases::router()),
        )
        .route("/health", get(health))
        .fallback(|| async { AppError::NotFound("Route") })
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "Sweet Shop API is running" }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{repo_types::Role, services as auth_services};
    use reqwest::{Client, StatusCode};
    use uuid::Uuid;

    struct TestApp {
        base: String,
        client: Client,
        state: AppState,
    }

    impl TestApp {
        async fn start() -> Self {
            let state = AppState::fake();
            let app = build_app(state.clone());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            Self {
                base: format!("http://{addr}"),
                client: Client::new(),
                state,
            }
        }

        fn url(&self, path: &str) -> String {
            format!("{}{}", self.base, path)
        }

        fn token(&self, role: Role) -> String {
            self.state.jwt.sign_access(Uuid::new_v4(), role).unwrap()
        }

        async fn create_sweet(&self, admin: &str, body: Value) -> Value {
            let resp = self
                .client
                .post(self.url("/api/sweets"))
                .bearer_auth(admin)
                .json(&body)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CREATED);
            resp.json().await.unwrap()
        }
    }

    #[tokio::test]
    async fn health_and_unknown_route() {
        let app = TestApp::start().await;
        let resp = app.client.get(app.url("/health")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        let resp = app.client.get(app.url("/api/nope")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Route not found");
    }

    #[tokio::test]
    async fn catalog_requires_a_token() {
        let app = TestApp::start().await;
        let resp = app.client.get(app.url("/api/sweets")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .client
            .get(app.url("/api/sweets"))
            .bearer_auth("garbage")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let app = TestApp::start().await;
        let refresh = app.state.jwt.sign_refresh(Uuid::new_v4(), Role::Admin).unwrap();
        let resp = app
            .client
            .get(app.url("/api/sweets"))
            .bearer_auth(refresh)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_refuse_plain_users() {
        let app = TestApp::start().await;
        let user = app.token(Role::User);
        let resp = app
            .client
            .post(app.url("/api/sweets"))
            .bearer_auth(&user)
            .json(&json!({"name": "Mint", "category": "Candy", "price": 2, "quantity": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let admin = app.token(Role::Admin);
        let sweet = app
            .create_sweet(&admin, json!({"name": "Mint", "category": "Candy", "price": 2, "quantity": 1}))
            .await;
        let id = sweet["id"].as_str().unwrap();

        for resp in [
            app.client
                .post(app.url(&format!("/api/sweets/{id}/restock")))
                .bearer_auth(&user)
                .json(&json!({"quantity": 5}))
                .send()
                .await
                .unwrap(),
            app.client
                .delete(app.url(&format!("/api/sweets/{id}")))
                .bearer_auth(&user)
                .send()
                .await
                .unwrap(),
        ] {
            assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        }
    }

    #[tokio::test]
    async fn create_validates_body() {
        let app = TestApp::start().await;
        let admin = app.token(Role::Admin);
        for body in [
            json!({"name": "", "category": "Candy", "price": 2, "quantity": 1}),
            json!({"name": "Mint", "category": "Candy", "price": -1, "quantity": 1}),
            json!({"name": "Mint", "category": "Candy", "price": 2, "quantity": -4}),
            json!({"name": "Mint", "category": "Candy", "price": 2, "quantity": 1.5}),
            json!({"name": "Mint"}),
        ] {
            let resp = app
                .client
                .post(app.url("/api/sweets"))
                .bearer_auth(&admin)
                .json(&body)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
            let err: Value = resp.json().await.unwrap();
            assert!(err["error"].is_string());
        }
    }

    #[tokio::test]
    async fn search_update_delete_flow() {
        let app = TestApp::start().await;
        let admin = app.token(Role::Admin);
        let choco = app
            .create_sweet(&admin, json!({"name": "Choco Bar", "category": "Chocolate", "price": 5, "quantity": 10}))
            .await;
        app.create_sweet(&admin, json!({"name": "Mint", "category": "Candy", "price": 2, "quantity": 10}))
            .await;

        let hits: Vec<Value> = app
            .client
            .get(app.url("/api/sweets/search?category=chocolate&minPrice=1&maxPrice="))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["name"], "Choco Bar");

        let resp = app
            .client
            .get(app.url("/api/sweets/search?minPrice=abc"))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let id = choco["id"].as_str().unwrap();
        let updated: Value = app
            .client
            .put(app.url(&format!("/api/sweets/{id}")))
            .bearer_auth(&admin)
            .json(&json!({"price": 9.99}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!((updated["price"].as_f64().unwrap() - 9.99).abs() < 1e-9);
        assert_eq!(updated["name"], "Choco Bar");
        assert_eq!(updated["quantity"], 10);

        let resp = app
            .client
            .delete(app.url(&format!("/api/sweets/{id}")))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = app
            .client
            .delete(app.url(&format!("/api/sweets/{id}")))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .client
            .get(app.url("/api/sweets/not-a-uuid"))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn register_purchase_and_history() {
        let app = TestApp::start().await;
        let admin = app.token(Role::Admin);
        let sweet = app
            .create_sweet(&admin, json!({"name": "Fudge", "category": "Toffee", "price": 2.5, "quantity": 5}))
            .await;
        let id = sweet["id"].as_str().unwrap();

        let resp = app
            .client
            .post(app.url("/api/auth/register"))
            .json(&json!({"email": "Buyer@Shop.test", "password": "secret1"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let auth: Value = resp.json().await.unwrap();
        assert_eq!(auth["user"]["email"], "buyer@shop.test");
        assert_eq!(auth["user"]["role"], "user");
        let token = auth["token"].as_str().unwrap().to_string();

        let resp = app
            .client
            .post(app.url("/api/auth/register"))
            .json(&json!({"email": "buyer@shop.test", "password": "secret1"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = app
            .client
            .post(app.url(&format!("/api/sweets/{id}/purchase")))
            .bearer_auth(&token)
            .json(&json!({"quantity": 10}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["error"], "Insufficient stock");

        let resp = app
            .client
            .post(app.url(&format!("/api/sweets/{id}/purchase")))
            .bearer_auth(&token)
            .json(&json!({"quantity": 0}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let bought: Value = app
            .client
            .post(app.url(&format!("/api/sweets/{id}/purchase")))
            .bearer_auth(&token)
            .json(&json!({"quantity": 2}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(bought["quantity"], 3);

        let history: Vec<Value> = app
            .client
            .get(app.url("/api/purchases/history"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["quantity"], 2);
        assert_eq!(history[0]["total_price"], 5.0);
        assert_eq!(history[0]["sweet"]["name"], "Fudge");

        let others: Vec<Value> = app
            .client
            .get(app.url("/api/purchases/history"))
            .bearer_auth(app.token(Role::User))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(others.is_empty());
    }

    #[tokio::test]
    async fn login_refresh_and_me() {
        let app = TestApp::start().await;
        auth_services::register(app.state.users.as_ref(), "boss@shop.test", "admin-pass", Role::Admin)
            .await
            .unwrap();

        let resp = app
            .client
            .post(app.url("/api/auth/login"))
            .json(&json!({"email": "boss@shop.test", "password": "wrong-pass"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let auth: Value = app
            .client
            .post(app.url("/api/auth/login"))
            .json(&json!({"email": "boss@shop.test", "password": "admin-pass"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(auth["user"]["role"], "admin");

        let refreshed: Value = app
            .client
            .post(app.url("/api/auth/refresh"))
            .json(&json!({"refresh_token": auth["refresh_token"]}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let token = refreshed["token"].as_str().unwrap();

        let me: Value = app
            .client
            .get(app.url("/api/auth/me"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(me["email"], "boss@shop.test");
        assert!(me.get("password_hash").is_none());
    }
}
