//! In-memory cart API used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use cartsync_core::{Cart, Quantity, UserId, VariantId};
use tokio::sync::Notify;

use crate::identity::AuthenticatedUser;
use crate::remote::{RemoteCartGateway, RemoteError};

/// Server-side carts held in memory, with knobs for failure injection.
#[derive(Debug, Default)]
pub struct FakeRemote {
    carts: Mutex<HashMap<UserId, Cart>>,
    calls: AtomicUsize,
    pub bulk_merges: AtomicUsize,
    pub fail_bulk_merge: AtomicBool,
    pub fail_all: AtomicBool,
    /// When set, `fetch` waits for a permit before answering.
    pub fetch_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeRemote {
    /// Number of requests that reached the fake (token checks passed).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cart_of(&self, user: &str) -> Cart {
        self.carts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&UserId::new(user))
            .cloned()
            .unwrap_or_default()
    }

    async fn begin(&self, user: &AuthenticatedUser) -> Result<(), RemoteError> {
        user.tokens
            .access_token()
            .await
            .ok_or(RemoteError::AuthTokenMissing)?;
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(RemoteError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn with_cart<T>(&self, user: &AuthenticatedUser, f: impl FnOnce(&mut Cart) -> T) -> T {
        let mut carts = self.carts.lock().unwrap_or_else(PoisonError::into_inner);
        f(carts.entry(user.user_id.clone()).or_default())
    }
}

fn overflow(_: cartsync_core::QuantityError) -> RemoteError {
    RemoteError::Api {
        status: 422,
        message: "quantity overflow".to_string(),
    }
}

#[async_trait]
impl RemoteCartGateway for FakeRemote {
    async fn fetch(&self, user: &AuthenticatedUser) -> Result<Cart, RemoteError> {
        let gate = self
            .fetch_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.begin(user).await?;
        Ok(self.with_cart(user, |cart| cart.clone()))
    }

    async fn add_item(
        &self,
        user: &AuthenticatedUser,
        variant_id: VariantId,
        quantity: Quantity,
    ) -> Result<(), RemoteError> {
        self.begin(user).await?;
        self.with_cart(user, |cart| cart.add(variant_id, quantity))
            .map_err(overflow)
    }

    async fn set_quantity(
        &self,
        user: &AuthenticatedUser,
        variant_id: VariantId,
        quantity: Quantity,
    ) -> Result<(), RemoteError> {
        self.begin(user).await?;
        self.with_cart(user, |cart| cart.set_quantity(variant_id, quantity));
        Ok(())
    }

    async fn remove_item(
        &self,
        user: &AuthenticatedUser,
        variant_id: VariantId,
    ) -> Result<(), RemoteError> {
        self.begin(user).await?;
        self.with_cart(user, |cart| cart.remove(variant_id));
        Ok(())
    }

    async fn clear(&self, user: &AuthenticatedUser) -> Result<(), RemoteError> {
        self.begin(user).await?;
        self.with_cart(user, Cart::clear);
        Ok(())
    }

    async fn bulk_merge(&self, user: &AuthenticatedUser, items: &Cart) -> Result<(), RemoteError> {
        self.begin(user).await?;
        self.bulk_merges.fetch_add(1, Ordering::SeqCst);

        if self.fail_bulk_merge.load(Ordering::SeqCst) {
            return Err(RemoteError::Api {
                status: 500,
                message: "merge failed".to_string(),
            });
        }

        self.with_cart(user, |cart| {
            items
                .lines()
                .iter()
                .try_for_each(|line| cart.add(line.variant_id(), line.quantity()))
        })
        .map_err(overflow)
    }
}
