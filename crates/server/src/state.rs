//! Application state shared across handlers.

use std::collections::HashMap;
use std::sync::Arc;

use cartsync_core::{Cart, UserId};
use tokio::sync::RwLock;

use crate::catalog::Catalog;
use crate::config::ServerConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Carts and session tokens live
/// in memory and are lost on restart.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    catalog: Catalog,
    carts: RwLock<HashMap<UserId, Cart>>,
    sessions: RwLock<HashMap<String, UserId>>,
}

impl AppState {
    /// Create a new application state with no carts and no sessions.
    #[must_use]
    pub fn new(config: ServerConfig, catalog: Catalog) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                carts: RwLock::new(HashMap::new()),
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the product catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Issue a new session token for `user_id`.
    pub async fn issue_token(&self, user_id: UserId) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.inner
            .sessions
            .write()
            .await
            .insert(token.clone(), user_id);
        token
    }

    /// User a session token was issued to.
    pub async fn user_for_token(&self, token: &str) -> Option<UserId> {
        self.inner.sessions.read().await.get(token).cloned()
    }

    /// Snapshot of a user's cart, empty if they have none.
    pub async fn cart(&self, user_id: &UserId) -> Cart {
        self.inner
            .carts
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Apply `f` to a copy of the user's cart and store it only if `f`
    /// succeeds, so a failed update leaves the cart untouched.
    pub async fn update_cart<E>(
        &self,
        user_id: &UserId,
        f: impl FnOnce(&mut Cart) -> Result<(), E>,
    ) -> Result<Cart, E> {
        let mut carts = self.inner.carts.write().await;
        let mut cart = carts.get(user_id).cloned().unwrap_or_default();
        f(&mut cart)?;
        carts.insert(user_id.clone(), cart.clone());
        Ok(cart)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartsync_core::{Quantity, VariantId};

    use super::*;

    fn state() -> AppState {
        AppState::new(ServerConfig::default(), Catalog::open())
    }

    #[tokio::test]
    async fn test_tokens_map_to_users() {
        let state = state();
        let token = state.issue_token(UserId::new("alice")).await;

        assert_eq!(state.user_for_token(&token).await, Some(UserId::new("alice")));
        assert_eq!(state.user_for_token("forged").await, None);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_cart_untouched() {
        let state = state();
        let alice = UserId::new("alice");
        state
            .update_cart(&alice, |cart| cart.add(VariantId::new(1), Quantity::ONE))
            .await
            .unwrap();

        let result = state
            .update_cart(&alice, |cart| {
                cart.add(VariantId::new(2), Quantity::ONE)?;
                cart.add(VariantId::new(1), Quantity::MAX)
            })
            .await;

        assert!(result.is_err());
        let cart = state.cart(&alice).await;
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity_of(VariantId::new(1)), 1);
    }
}
