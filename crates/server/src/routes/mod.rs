//! HTTP route handlers for the reference cart API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health              - Health check
//!
//! # Auth
//! POST   /auth/token          - Issue a session token ({userId} -> {token})
//!
//! # Cart (bearer token required)
//! GET    /cart?id={userId}    - Fetch cart
//! POST   /cart                - Add units ({userId, variantId, quantity}) or merge ({cart})
//! PATCH  /cart                - Set quantity ({userId, variantId, quantity})
//! DELETE /cart                - Remove line ({userId, variantId}) or clear ({userId})
//! ```

pub mod auth;
pub mod cart;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create all routes for the cart API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/auth/token", post(auth::issue_token))
        .route(
            "/cart",
            get(cart::show)
                .post(cart::add)
                .patch(cart::update)
                .delete(cart::remove),
        )
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use cartsync_core::{Cart, Price, ProductId, VariantId};
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::catalog::{Catalog, CatalogEntry};
    use crate::config::ServerConfig;
    use crate::state::AppState;

    fn socks() -> CatalogEntry {
        CatalogEntry {
            variant_id: VariantId::new(42),
            product_id: ProductId::new(4),
            name: "Wool Socks".to_string(),
            slug: "wool-socks".to_string(),
            image_url: None,
            unit_price: Price::from_cents(1250),
            sale_unit_price: None,
            color: None,
            size: None,
        }
    }

    fn app_with(config: ServerConfig, catalog: Catalog) -> (AppState, axum::Router) {
        let state = AppState::new(config, catalog);
        (state.clone(), crate::app(state))
    }

    fn app() -> (AppState, axum::Router) {
        app_with(ServerConfig::default(), Catalog::open())
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_cart(user: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(format!("/cart?id={user}"));
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(app: &axum::Router, user: &str) -> String {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/auth/token", None, &json!({ "userId": user })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, body_json(response).await)
    }

    #[tokio::test]
    async fn test_health() {
        let (_, app) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cart_requires_token() {
        let (_, app) = app();
        let (status, body) = send(&app, get_cart("alice", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["message"].is_string());

        let (status, _) = send(&app, get_cart("alice", Some("forged"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_other_users_cart_is_forbidden() {
        let (_, app) = app();
        let token = login(&app, "alice").await;

        let (status, _) = send(&app, get_cart("bob", Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_add_twice_merges_line() {
        let (_, app) = app();
        let token = login(&app, "alice").await;
        let add = json!({ "userId": "alice", "variantId": 42, "quantity": 2 });

        send(&app, json_request("POST", "/cart", Some(&token), &add)).await;
        let (status, _) = send(&app, json_request("POST", "/cart", Some(&token), &add)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get_cart("alice", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{ "variantId": 42, "quantity": 4 }]));
    }

    #[tokio::test]
    async fn test_zero_quantity_add_is_rejected() {
        let (_, app) = app();
        let token = login(&app, "alice").await;
        let add = json!({ "userId": "alice", "variantId": 42, "quantity": 0 });

        let (status, body) = send(&app, json_request("POST", "/cart", Some(&token), &add)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Quantity must be at least 1");
    }

    #[tokio::test]
    async fn test_strict_catalog_rejects_and_hydrates() {
        let (_, app) = app_with(ServerConfig::default(), Catalog::strict([socks()]));
        let token = login(&app, "alice").await;

        let bad = json!({ "userId": "alice", "variantId": 999, "quantity": 1 });
        let (status, body) = send(&app, json_request("POST", "/cart", Some(&token), &bad)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Invalid variant");

        let good = json!({ "userId": "alice", "variantId": 42, "quantity": 1 });
        send(&app, json_request("POST", "/cart", Some(&token), &good)).await;
        let (_, body) = send(&app, get_cart("alice", Some(&token))).await;
        let cart: Cart = serde_json::from_value(body).unwrap();
        assert!(cart.lines()[0].is_hydrated());
        assert_eq!(cart.subtotal(), Some(Price::from_cents(1250)));
    }

    #[tokio::test]
    async fn test_bulk_merge_adds_to_token_users_cart() {
        let (state, app) = app();
        let token = login(&app, "alice").await;
        let add = json!({ "userId": "alice", "variantId": 42, "quantity": 1 });
        send(&app, json_request("POST", "/cart", Some(&token), &add)).await;

        let merge = json!({ "cart": [
            { "variantId": 42, "quantity": 2 },
            { "variantId": 7, "quantity": 1 }
        ]});
        let (status, _) = send(&app, json_request("POST", "/cart", Some(&token), &merge)).await;
        assert_eq!(status, StatusCode::OK);

        let cart = state.cart(&cartsync_core::UserId::new("alice")).await;
        assert_eq!(cart.quantity_of(VariantId::new(42)), 3);
        assert_eq!(cart.quantity_of(VariantId::new(7)), 1);
    }

    #[tokio::test]
    async fn test_bulk_merge_is_all_or_nothing() {
        let (state, app) = app_with(ServerConfig::default(), Catalog::strict([socks()]));
        let token = login(&app, "alice").await;

        let merge = json!({ "cart": [
            { "variantId": 42, "quantity": 2 },
            { "variantId": 999, "quantity": 1 }
        ]});
        let (status, _) = send(&app, json_request("POST", "/cart", Some(&token), &merge)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(state.cart(&cartsync_core::UserId::new("alice")).await.is_empty());
    }

    #[tokio::test]
    async fn test_patch_sets_and_removes() {
        let (_, app) = app();
        let token = login(&app, "alice").await;

        let set = json!({ "userId": "alice", "variantId": 42, "quantity": 5 });
        let (status, body) = send(&app, json_request("PATCH", "/cart", Some(&token), &set)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{ "variantId": 42, "quantity": 5 }]));

        let zero = json!({ "userId": "alice", "variantId": 42, "quantity": 0 });
        let (_, body) = send(&app, json_request("PATCH", "/cart", Some(&token), &zero)).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_delete_line_and_clear() {
        let (_, app) = app();
        let token = login(&app, "alice").await;
        for variant in [1, 2, 3] {
            let add = json!({ "userId": "alice", "variantId": variant, "quantity": 1 });
            send(&app, json_request("POST", "/cart", Some(&token), &add)).await;
        }

        let remove = json!({ "userId": "alice", "variantId": 2 });
        let (_, body) = send(&app, json_request("DELETE", "/cart", Some(&token), &remove)).await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        let absent = json!({ "userId": "alice", "variantId": 99 });
        let (status, _) = send(&app, json_request("DELETE", "/cart", Some(&token), &absent)).await;
        assert_eq!(status, StatusCode::OK);

        let clear = json!({ "userId": "alice" });
        let (_, body) = send(&app, json_request("DELETE", "/cart", Some(&token), &clear)).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_csrf_token_is_enforced_on_mutations() {
        let config = ServerConfig {
            csrf_token: Some(SecretString::from("csrf-1")),
            ..ServerConfig::default()
        };
        let (_, app) = app_with(config, Catalog::open());
        let token = login_with_csrf(&app, "alice").await;
        let add = json!({ "userId": "alice", "variantId": 1, "quantity": 1 });

        let (status, _) = send(&app, json_request("POST", "/cart", Some(&token), &add)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let mut request = json_request("POST", "/cart", Some(&token), &add);
        request
            .headers_mut()
            .insert("x-csrf-token", "csrf-1".parse().unwrap());
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, get_cart("alice", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
    }

    async fn login_with_csrf(app: &axum::Router, user: &str) -> String {
        let mut request = json_request("POST", "/auth/token", None, &json!({ "userId": user }));
        request
            .headers_mut()
            .insert("x-csrf-token", "csrf-1".parse().unwrap());
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}
