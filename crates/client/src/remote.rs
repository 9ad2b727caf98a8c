//! Server-side cart API gateway.
//!
//! # Wire contract
//!
//! - `GET /cart?id={userId}` returns the cart as a JSON array of line items
//! - `POST /cart {userId, variantId, quantity}` adds units (server increments)
//! - `POST /cart {cart: [...]}` bulk-merges an anonymous cart (migration only)
//! - `PATCH /cart {userId, variantId, quantity}` sets an absolute quantity
//! - `DELETE /cart {userId, variantId}` removes a line, `{userId}` clears
//!
//! Every request carries `Authorization: Bearer <token>`; mutating requests
//! also carry the anti-forgery header when one is configured. Failures come
//! back as `4xx`/`5xx` with a `{message}` body.

use async_trait::async_trait;
use cartsync_core::{Cart, Quantity, UserId, VariantId};
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::CartApiConfig;
use crate::identity::AuthenticatedUser;

/// Header carrying the anti-forgery token.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Errors that can occur when talking to the cart API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No session token could be obtained; no request was sent.
    #[error("auth token missing")]
    AuthTokenMissing,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Operations the reconciler needs from the server-side cart.
///
/// Every method requires a session token from the user's token provider.
/// Mutations return nothing: callers re-fetch to observe the server's view.
#[async_trait]
pub trait RemoteCartGateway: Send + Sync {
    /// Fetch the user's cart.
    async fn fetch(&self, user: &AuthenticatedUser) -> Result<Cart, RemoteError>;

    /// Add units of a variant; the server increments an existing line.
    async fn add_item(
        &self,
        user: &AuthenticatedUser,
        variant_id: VariantId,
        quantity: Quantity,
    ) -> Result<(), RemoteError>;

    /// Set the absolute quantity of a variant.
    async fn set_quantity(
        &self,
        user: &AuthenticatedUser,
        variant_id: VariantId,
        quantity: Quantity,
    ) -> Result<(), RemoteError>;

    /// Remove a variant's line.
    async fn remove_item(
        &self,
        user: &AuthenticatedUser,
        variant_id: VariantId,
    ) -> Result<(), RemoteError>;

    /// Remove every line.
    async fn clear(&self, user: &AuthenticatedUser) -> Result<(), RemoteError>;

    /// Add each item's quantity to whatever the server already holds.
    async fn bulk_merge(&self, user: &AuthenticatedUser, items: &Cart) -> Result<(), RemoteError>;
}

// =============================================================================
// Request / Response Bodies
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LineRequest<'a> {
    user_id: &'a UserId,
    variant_id: VariantId,
    quantity: Quantity,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveRequest<'a> {
    user_id: &'a UserId,
    variant_id: VariantId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearRequest<'a> {
    user_id: &'a UserId,
}

#[derive(Debug, Serialize)]
struct BulkMergeRequest<'a> {
    cart: &'a Cart,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    user_id: &'a UserId,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// CartApiClient
// =============================================================================

/// HTTP implementation of [`RemoteCartGateway`].
#[derive(Clone)]
pub struct CartApiClient {
    client: reqwest::Client,
    cart_url: Url,
    auth_url: Url,
    csrf_token: Option<SecretString>,
}

impl CartApiClient {
    /// Create a new cart API client.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL is invalid or the HTTP client fails
    /// to build.
    pub fn new(config: &CartApiConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            cart_url: config.base_url.join("cart")?,
            auth_url: config.base_url.join("auth/token")?,
            csrf_token: config.csrf_token.clone(),
        })
    }

    /// Obtain a session token from the development login endpoint.
    ///
    /// Only the reference server offers `POST auth/token`; production
    /// deployments hand tokens to the client through their own sign-in flow.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the request fails or the body has no token.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn issue_token(&self, user_id: &UserId) -> Result<SecretString, RemoteError> {
        let response = self
            .client
            .post(self.auth_url.clone())
            .json(&TokenRequest { user_id })
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        Ok(SecretString::from(body.token))
    }

    /// Build an authorized request. Fails before any I/O without a token.
    async fn request(
        &self,
        method: Method,
        url: Url,
        user: &AuthenticatedUser,
    ) -> Result<RequestBuilder, RemoteError> {
        let token = user
            .tokens
            .access_token()
            .await
            .ok_or(RemoteError::AuthTokenMissing)?;

        let mutating = method != Method::GET;
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret());

        if mutating && let Some(csrf) = &self.csrf_token {
            request = request.header(CSRF_HEADER, csrf.expose_secret());
        }

        Ok(request)
    }

    /// Send a mutation and check its status.
    async fn send_mutation<B: Serialize + Sync>(
        &self,
        method: Method,
        user: &AuthenticatedUser,
        body: &B,
    ) -> Result<(), RemoteError> {
        let response = self
            .request(method, self.cart_url.clone(), user)
            .await?
            .json(body)
            .send()
            .await?;

        check_status(response).await.map(|_| ())
    }
}

/// Turn a non-success response into `RemoteError::Api`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body).map_or_else(
        |_| body.chars().take(200).collect::<String>(),
        |parsed| parsed.message,
    );

    debug!(status = %status, message = %message, "Cart API returned non-success status");
    Err(RemoteError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RemoteCartGateway for CartApiClient {
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    async fn fetch(&self, user: &AuthenticatedUser) -> Result<Cart, RemoteError> {
        let mut url = self.cart_url.clone();
        url.query_pairs_mut()
            .append_pair("id", user.user_id.as_str());

        let response = self.request(Method::GET, url, user).await?.send().await?;
        let response = check_status(response).await?;
        let body = response.text().await?;

        serde_json::from_str::<Cart>(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse cart API response"
            );
            RemoteError::Parse(e.to_string())
        })
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    async fn add_item(
        &self,
        user: &AuthenticatedUser,
        variant_id: VariantId,
        quantity: Quantity,
    ) -> Result<(), RemoteError> {
        let body = LineRequest {
            user_id: &user.user_id,
            variant_id,
            quantity,
        };
        self.send_mutation(Method::POST, user, &body).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    async fn set_quantity(
        &self,
        user: &AuthenticatedUser,
        variant_id: VariantId,
        quantity: Quantity,
    ) -> Result<(), RemoteError> {
        let body = LineRequest {
            user_id: &user.user_id,
            variant_id,
            quantity,
        };
        self.send_mutation(Method::PATCH, user, &body).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    async fn remove_item(
        &self,
        user: &AuthenticatedUser,
        variant_id: VariantId,
    ) -> Result<(), RemoteError> {
        let body = RemoveRequest {
            user_id: &user.user_id,
            variant_id,
        };
        self.send_mutation(Method::DELETE, user, &body).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    async fn clear(&self, user: &AuthenticatedUser) -> Result<(), RemoteError> {
        let body = ClearRequest {
            user_id: &user.user_id,
        };
        self.send_mutation(Method::DELETE, user, &body).await
    }

    #[instrument(skip(self, user, items), fields(user_id = %user.user_id, lines = items.len()))]
    async fn bulk_merge(&self, user: &AuthenticatedUser, items: &Cart) -> Result<(), RemoteError> {
        self.send_mutation(Method::POST, user, &BulkMergeRequest { cart: items })
            .await
    }
}

impl std::fmt::Debug for CartApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartApiClient")
            .field("cart_url", &self.cart_url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path, query_param},
    };

    use super::*;
    use crate::identity::StaticTokenProvider;

    const ACCESS_TOKEN: &str = "access-token-1";

    fn user() -> AuthenticatedUser {
        AuthenticatedUser::new("user-1", Arc::new(StaticTokenProvider::new(ACCESS_TOKEN)))
    }

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    fn client_for(server: &MockServer, csrf: Option<&str>) -> CartApiClient {
        let mut config = CartApiConfig::new(Url::parse(&server.uri()).unwrap());
        config.csrf_token = csrf.map(SecretString::from);
        CartApiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_parses_cart() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cart"))
            .and(query_param("id", "user-1"))
            .and(header("authorization", format!("Bearer {ACCESS_TOKEN}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "variantId": 42,
                    "quantity": 2,
                    "productId": 4,
                    "name": "Wool Socks",
                    "slug": "wool-socks",
                    "unitPrice": 12.5
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let cart = client_for(&server, None).fetch(&user()).await.unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity_of(VariantId::new(42)), 2);
        assert!(cart.lines()[0].is_hydrated());
    }

    #[tokio::test]
    async fn test_add_item_sends_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cart"))
            .and(header("authorization", format!("Bearer {ACCESS_TOKEN}")))
            .and(header("x-csrf-token", "csrf-1"))
            .and(body_json(serde_json::json!({
                "userId": "user-1",
                "variantId": 42,
                "quantity": 2
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server, Some("csrf-1"))
            .add_item(&user(), VariantId::new(42), qty(2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_quantity_uses_patch() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/cart"))
            .and(body_json(serde_json::json!({
                "userId": "user-1",
                "variantId": 42,
                "quantity": 5
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server, None)
            .set_quantity(&user(), VariantId::new(42), qty(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_and_clear_use_delete_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/cart"))
            .and(body_json(serde_json::json!({ "userId": "user-1", "variantId": 42 })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/cart"))
            .and(body_json(serde_json::json!({ "userId": "user-1" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        client.remove_item(&user(), VariantId::new(42)).await.unwrap();
        client.clear(&user()).await.unwrap();
    }

    #[tokio::test]
    async fn test_bulk_merge_sends_cart_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cart"))
            .and(body_json(serde_json::json!({
                "cart": [{ "variantId": 42, "quantity": 2 }]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut cart = Cart::new();
        cart.add(VariantId::new(42), qty(2)).unwrap();

        client_for(&server, None)
            .bulk_merge(&user(), &cart)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_api_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cart"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(serde_json::json!({ "message": "Invalid variant" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .add_item(&user(), VariantId::new(999), qty(1))
            .await
            .unwrap_err();

        assert!(
            matches!(err, RemoteError::Api { status: 422, ref message } if message == "Invalid variant")
        );
    }

    #[tokio::test]
    async fn test_unparsable_cart_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cart"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server, None).fetch(&user()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Parse(_)));
    }

    #[tokio::test]
    async fn test_missing_token_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let expired = AuthenticatedUser::new("user-1", Arc::new(StaticTokenProvider::expired()));
        let err = client_for(&server, None).fetch(&expired).await.unwrap_err();

        assert!(matches!(err, RemoteError::AuthTokenMissing));
    }

    #[tokio::test]
    async fn test_issue_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .and(body_json(serde_json::json!({ "userId": "user-1" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "t-1" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server, None)
            .issue_token(&UserId::new("user-1"))
            .await
            .unwrap();
        assert_eq!(token.expose_secret(), "t-1");
    }

    #[tokio::test]
    async fn test_base_path_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let config = CartApiConfig::new(Url::parse(&format!("{}/api", server.uri())).unwrap());
        let cart = CartApiClient::new(&config)
            .unwrap()
            .fetch(&user())
            .await
            .unwrap();
        assert!(cart.is_empty());
    }
}
