//! Public cart service.
//!
//! `CartService` is the surface the rest of the application uses. It owns
//! the in-memory copy of the current cart and serializes every operation
//! through a single worker task, so two rapid mutations can never read the
//! same pre-mutation cart and overwrite each other.
//!
//! Each operation follows the same pattern: apply through the reconciler,
//! re-read the authoritative store, publish a new versioned snapshot, notify.
//! On failure the published snapshot is left untouched.
//!
//! Identity changes go through the same queue, so a refresh always runs
//! against the identity that was current when it was dequeued and can never
//! publish a cart that belongs to a previous shopper.
//!
//! # Example
//!
//! ```rust,ignore
//! let service = CartService::spawn(reconciler, Arc::new(TracingNotifier));
//!
//! service.add_item(VariantId::new(42), 2).await?;
//! service.set_identity(Identity::authenticated("user-1", tokens)).await?;
//! let snapshot = service.current_cart();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cartsync_core::{Cart, VariantId};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, instrument, warn};

use crate::error::{CartError, Result};
use crate::identity::Identity;
use crate::notify::{CartEvent, CartOperation, NotificationSink};
use crate::reconciler::{CartReconciler, CartSource, IdentityChange, Mutation};

/// Commands queued ahead of the worker before callers start waiting.
const COMMAND_BUFFER: usize = 32;

/// A published view of the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    /// Increases by one on every publish.
    pub version: u64,
    /// Increases by one on every identity change.
    pub identity_epoch: u64,
    /// Store the cart was read from.
    pub source: CartSource,
    pub cart: Cart,
    pub refreshed_at: DateTime<Utc>,
}

type Reply = oneshot::Sender<Result<CartSnapshot>>;

enum Command {
    Mutate { mutation: Mutation, reply: Reply },
    Refresh { reply: Reply },
    SetIdentity { identity: Identity, reply: Reply },
}

/// Handle to the cart worker. Cheap to clone; the worker stops when the
/// last handle is dropped.
#[derive(Clone)]
pub struct CartService {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<CartSnapshot>,
    pending: Arc<AtomicUsize>,
}

impl CartService {
    /// Start the worker task that owns `reconciler`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(reconciler: CartReconciler, notifier: Arc<dyn NotificationSink>) -> Self {
        let cart = match reconciler.source() {
            CartSource::Local => reconciler.local().read(),
            CartSource::Remote => Cart::new(),
        };
        let initial = CartSnapshot {
            version: 0,
            identity_epoch: 0,
            source: reconciler.source(),
            cart,
            refreshed_at: Utc::now(),
        };

        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);

        let worker = CartWorker {
            reconciler,
            notifier,
            snapshot: snapshot_tx,
            epoch: 0,
        };
        tokio::spawn(worker.run(commands_rx));

        Self {
            commands: commands_tx,
            snapshot: snapshot_rx,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add units of a variant.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the quantity is 0 or the store rejects the write.
    pub async fn add_item(&self, variant_id: VariantId, quantity: u32) -> Result<CartSnapshot> {
        self.mutate(Mutation::Add {
            variant_id,
            quantity,
        })
        .await
    }

    /// Set the absolute quantity of a variant; 0 removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the store rejects the write.
    pub async fn set_quantity(&self, variant_id: VariantId, quantity: u32) -> Result<CartSnapshot> {
        self.mutate(Mutation::SetQuantity {
            variant_id,
            quantity,
        })
        .await
    }

    /// Remove a variant. Removing an absent variant succeeds.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the store rejects the write.
    pub async fn remove_item(&self, variant_id: VariantId) -> Result<CartSnapshot> {
        self.mutate(Mutation::Remove { variant_id }).await
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the store rejects the write.
    pub async fn clear(&self) -> Result<CartSnapshot> {
        self.mutate(Mutation::Clear).await
    }

    /// Re-read the authoritative store.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the cart API cannot be read.
    pub async fn refresh(&self) -> Result<CartSnapshot> {
        self.call(|reply| Command::Refresh { reply }).await
    }

    /// Report a sign-in, sign-out or token refresh.
    ///
    /// Signing in migrates the anonymous cart (once per session) before the
    /// new cart is loaded.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the cart for the new identity cannot be loaded.
    pub async fn set_identity(&self, identity: Identity) -> Result<CartSnapshot> {
        self.call(|reply| Command::SetIdentity { identity, reply })
            .await
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn current_cart(&self) -> CartSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch for new snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.snapshot.clone()
    }

    /// Whether any call on any handle is still outstanding.
    ///
    /// Calls are queued, so this is only a hint for disabling UI controls.
    #[must_use]
    pub fn operation_in_flight(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    async fn mutate(&self, mutation: Mutation) -> Result<CartSnapshot> {
        self.call(|reply| Command::Mutate { mutation, reply }).await
    }

    async fn call(&self, command: impl FnOnce(Reply) -> Command) -> Result<CartSnapshot> {
        let _in_flight = InFlight::enter(&self.pending);
        let (reply, response) = oneshot::channel();

        self.commands
            .send(command(reply))
            .await
            .map_err(|_| CartError::ServiceStopped)?;
        response.await.map_err(|_| CartError::ServiceStopped)?
    }
}

impl std::fmt::Debug for CartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService")
            .field("version", &self.snapshot.borrow().version)
            .field("in_flight", &self.operation_in_flight())
            .finish_non_exhaustive()
    }
}

/// Counts an outstanding call until dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Worker
// =============================================================================

struct CartWorker {
    reconciler: CartReconciler,
    notifier: Arc<dyn NotificationSink>,
    snapshot: watch::Sender<CartSnapshot>,
    epoch: u64,
}

const fn operation_for(mutation: Mutation) -> CartOperation {
    match mutation {
        Mutation::Add { .. } => CartOperation::AddItem,
        Mutation::SetQuantity { quantity: 0, .. } | Mutation::Remove { .. } => {
            CartOperation::RemoveItem
        }
        Mutation::SetQuantity { .. } => CartOperation::SetQuantity,
        Mutation::Clear => CartOperation::Clear,
    }
}

impl CartWorker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            // A caller that went away still gets its operation completed.
            match command {
                Command::Mutate { mutation, reply } => {
                    let _ = reply.send(self.mutate(mutation).await);
                }
                Command::Refresh { reply } => {
                    let result = self.refresh().await;
                    self.report(CartOperation::Refresh, &result);
                    let _ = reply.send(result);
                }
                Command::SetIdentity { identity, reply } => {
                    let _ = reply.send(self.change_identity(identity).await);
                }
            }
        }
        debug!("Cart service stopped");
    }

    #[instrument(skip(self), fields(epoch = self.epoch))]
    async fn mutate(&mut self, mutation: Mutation) -> Result<CartSnapshot> {
        let result = match self.reconciler.apply(mutation).await {
            Ok(()) => self.refresh().await,
            Err(e) => Err(e),
        };
        self.report(operation_for(mutation), &result);
        result
    }

    #[instrument(skip_all, fields(authenticated = identity.is_authenticated()))]
    async fn change_identity(&mut self, identity: Identity) -> Result<CartSnapshot> {
        let operation = match self.reconciler.set_identity(identity).await {
            IdentityChange::Unchanged => return Ok(self.snapshot.borrow().clone()),
            IdentityChange::SignedOut => CartOperation::SignOut,
            IdentityChange::SignedIn { migration } => {
                debug!(?migration, "Sign-in migration finished");
                CartOperation::SignIn
            }
        };

        // The cached cart belonged to the previous identity.
        self.epoch += 1;
        self.publish(self.reconciler.source(), Cart::new());

        let result = self.refresh().await;
        self.report(operation, &result);
        result
    }

    async fn refresh(&mut self) -> Result<CartSnapshot> {
        let (cart, source) = self.reconciler.load().await?;
        Ok(self.publish(source, cart))
    }

    fn publish(&mut self, source: CartSource, cart: Cart) -> CartSnapshot {
        let snapshot = CartSnapshot {
            version: self.snapshot.borrow().version + 1,
            identity_epoch: self.epoch,
            source,
            cart,
            refreshed_at: Utc::now(),
        };
        self.snapshot.send_replace(snapshot.clone());
        snapshot
    }

    fn report(&self, operation: CartOperation, result: &Result<CartSnapshot>) {
        match result {
            Ok(_) => self.notifier.notify(CartEvent::success(operation)),
            Err(e) => {
                if e.is_server_error() {
                    error!(%operation, error = %e, "Cart operation failed");
                } else {
                    warn!(%operation, error = %e, "Cart operation rejected");
                }
                self.notifier
                    .notify(CartEvent::failure(operation, e.user_message()));
            }
        }
    }
}
