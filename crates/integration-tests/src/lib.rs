//! Integration tests for cartsync.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartsync-integration-tests
//! ```
//!
//! Each test starts its own reference server on an ephemeral port, so tests
//! run in parallel without shared state.

use std::net::SocketAddr;
use std::sync::Arc;

use cartsync::{
    CartApiClient, CartApiConfig, CartReconciler, CartService, Identity, KeyValueStorage,
    LocalCartStore, MigrationPolicy, NotificationSink, StaticTokenProvider,
};
use cartsync_core::UserId;
use cartsync_server::{AppState, Catalog, ServerConfig};
use url::Url;

/// A running reference server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub api: CartApiClient,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a server with an open catalog.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        Self::start_with(ServerConfig::default(), Catalog::open()).await
    }

    /// Start a server with the given configuration and catalog.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    #[allow(clippy::unwrap_used)]
    pub async fn start_with(mut config: ServerConfig, catalog: Catalog) -> Self {
        config.port = 0;
        let listener = tokio::net::TcpListener::bind(config.socket_addr())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState::new(config, catalog);

        let handle = tokio::spawn({
            let state = state.clone();
            async move {
                let _ = cartsync_server::serve(listener, state, std::future::pending::<()>()).await;
            }
        });

        let api = CartApiClient::new(&Self::api_config_for(addr)).unwrap();
        Self {
            addr,
            state,
            api,
            handle,
        }
    }

    /// Client configuration pointing at this server.
    #[must_use]
    pub fn api_config(&self) -> CartApiConfig {
        Self::api_config_for(self.addr)
    }

    #[allow(clippy::unwrap_used)]
    fn api_config_for(addr: SocketAddr) -> CartApiConfig {
        CartApiConfig::new(Url::parse(&format!("http://{addr}/")).unwrap())
    }

    /// Log `user` in and return a signed-in identity.
    ///
    /// # Panics
    ///
    /// Panics if the server refuses to issue a token.
    #[allow(clippy::unwrap_used)]
    pub async fn sign_in(&self, user: &str) -> Identity {
        let user_id = UserId::new(user);
        let token = self.api.issue_token(&user_id).await.unwrap();
        Identity::authenticated(user_id, Arc::new(StaticTokenProvider::from_secret(token)))
    }

    /// Server-side cart for `user`.
    pub async fn cart_of(&self, user: &str) -> cartsync_core::Cart {
        self.state.cart(&UserId::new(user)).await
    }

    /// Spawn a cart service for one shopper session.
    #[must_use]
    pub fn session(
        &self,
        storage: Arc<dyn KeyValueStorage>,
        notifier: Arc<dyn NotificationSink>,
    ) -> CartService {
        let local = LocalCartStore::with_default_key(storage);
        let reconciler = CartReconciler::new(
            local,
            Arc::new(self.api.clone()),
            MigrationPolicy::default(),
        );
        CartService::spawn(reconciler, notifier)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
