//! Cart reconciliation state machine.
//!
//! Decides, for every mutation, whether the device-local store or the cart
//! API is authoritative, and moves an anonymous cart to the server exactly
//! once per session when the shopper signs in.
//!
//! ```text
//!   Anonymous --sign-in--> AuthenticatedUnsynced --migration attempted--> AuthenticatedSynced
//!       ^                                                                        |
//!       +------------------------------- sign-out ------------------------------+
//! ```
//!
//! Migration is attempted at most once per session, whatever its outcome.
//! The server does not deduplicate merges, so retrying a merge that may have
//! partially applied risks doubling quantities.

use std::str::FromStr;
use std::sync::Arc;

use cartsync_core::{Cart, Quantity, VariantId};
use tracing::{debug, error, info, instrument, warn};

use crate::error::CartError;
use crate::identity::{AuthenticatedUser, Identity};
use crate::local::LocalCartStore;
use crate::remote::RemoteCartGateway;

/// Where the reconciler is in the sign-in lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Signed out; the local store is authoritative.
    Anonymous,
    /// Signed in, migration not yet attempted.
    AuthenticatedUnsynced,
    /// Signed in, migration attempted (or not needed).
    AuthenticatedSynced,
}

/// Which store a cart was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartSource {
    Local,
    Remote,
}

/// What happens to the local cart when the bulk merge fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationPolicy {
    /// Clear local storage after any attempt. Items are lost on failure but
    /// can never be merged twice.
    #[default]
    ClearAlways,
    /// Keep local items when the merge fails so a later session can retry.
    /// A merge that failed after partially applying may then double up.
    RetainOnFailure,
}

impl FromStr for MigrationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear-always" => Ok(Self::ClearAlways),
            "retain-on-failure" => Ok(Self::RetainOnFailure),
            other => Err(format!(
                "unknown migration policy '{other}' (expected clear-always or retain-on-failure)"
            )),
        }
    }
}

/// Result of the one-time local to remote migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Migration already ran this session.
    Skipped,
    /// Local cart was empty; nothing was sent.
    Empty,
    /// The local cart was merged into the server cart.
    Merged { lines: usize },
    /// The merge request failed.
    Failed { reason: String },
}

/// Result of an identity notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityChange {
    /// Same shopper as before; nothing to do.
    Unchanged,
    /// Now anonymous.
    SignedOut,
    /// Now signed in, with the migration result.
    SignedIn { migration: MigrationOutcome },
}

/// A cart mutation requested by the shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Add units, increasing an existing line.
    Add { variant_id: VariantId, quantity: u32 },
    /// Set an absolute quantity; 0 removes the line.
    SetQuantity { variant_id: VariantId, quantity: u32 },
    /// Remove a line; absent variants are a no-op.
    Remove { variant_id: VariantId },
    /// Remove every line.
    Clear,
}

/// Routes cart operations to the authoritative store.
pub struct CartReconciler {
    local: LocalCartStore,
    remote: Arc<dyn RemoteCartGateway>,
    identity: Identity,
    state: SyncState,
    /// Session-scoped: set before the merge request is sent, never reset.
    migrated: bool,
    policy: MigrationPolicy,
}

impl CartReconciler {
    /// Create a reconciler for an anonymous shopper.
    #[must_use]
    pub fn new(
        local: LocalCartStore,
        remote: Arc<dyn RemoteCartGateway>,
        policy: MigrationPolicy,
    ) -> Self {
        Self {
            local,
            remote,
            identity: Identity::Anonymous,
            state: SyncState::Anonymous,
            migrated: false,
            policy,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SyncState {
        self.state
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Whether the one-time migration has been attempted this session.
    #[must_use]
    pub const fn has_migrated(&self) -> bool {
        self.migrated
    }

    #[must_use]
    pub const fn local(&self) -> &LocalCartStore {
        &self.local
    }

    /// Store that is authoritative in the current state.
    #[must_use]
    pub const fn source(&self) -> CartSource {
        match self.state {
            SyncState::Anonymous => CartSource::Local,
            SyncState::AuthenticatedUnsynced | SyncState::AuthenticatedSynced => CartSource::Remote,
        }
    }

    /// Apply an identity notification.
    ///
    /// Signing in runs the migration (when it has not run this session)
    /// before returning, so no mutation can observe the unsynced state.
    #[instrument(skip(self, identity), fields(user_id = ?identity.user_id()))]
    pub async fn set_identity(&mut self, identity: Identity) -> IdentityChange {
        if self.identity.same_shopper(&identity) {
            // Keep the newest token provider for the same shopper.
            self.identity = identity;
            return IdentityChange::Unchanged;
        }

        self.identity = identity;
        if self.identity.is_authenticated() {
            info!("Shopper signed in");
            self.state = SyncState::AuthenticatedUnsynced;
            let migration = self.migrate().await;
            IdentityChange::SignedIn { migration }
        } else {
            info!("Shopper signed out");
            self.state = SyncState::Anonymous;
            IdentityChange::SignedOut
        }
    }

    /// Run the one-time local to remote migration if it is due.
    ///
    /// Always leaves the reconciler in `AuthenticatedSynced` when signed in.
    pub async fn migrate(&mut self) -> MigrationOutcome {
        let Identity::Authenticated(user) = &self.identity else {
            return MigrationOutcome::Skipped;
        };
        if self.state == SyncState::AuthenticatedSynced {
            return MigrationOutcome::Skipped;
        }
        if self.migrated {
            self.state = SyncState::AuthenticatedSynced;
            return MigrationOutcome::Skipped;
        }

        // Claim the migration before any await point.
        self.migrated = true;
        let user = user.clone();
        let items = self.local.read();

        let outcome = if items.is_empty() {
            debug!("Local cart empty, nothing to migrate");
            MigrationOutcome::Empty
        } else {
            match self.remote.bulk_merge(&user, &items).await {
                Ok(()) => {
                    info!(lines = items.len(), "Migrated local cart to account");
                    MigrationOutcome::Merged { lines: items.len() }
                }
                Err(e) => {
                    error!(error = %e, lines = items.len(), "Local cart migration failed");
                    MigrationOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        };

        let keep_local = self.policy == MigrationPolicy::RetainOnFailure
            && matches!(outcome, MigrationOutcome::Failed { .. });
        if keep_local {
            warn!("Keeping local cart after failed migration");
        } else if !items.is_empty()
            && let Err(e) = self.local.clear()
        {
            warn!(error = %e, "Failed to clear local cart after migration");
        }

        self.state = SyncState::AuthenticatedSynced;
        outcome
    }

    /// Apply a mutation to the authoritative store.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the quantity is invalid, the local write fails,
    /// or the cart API rejects or cannot receive the request.
    #[instrument(skip(self))]
    pub async fn apply(&mut self, mutation: Mutation) -> Result<(), CartError> {
        if self.state == SyncState::AuthenticatedUnsynced {
            self.migrate().await;
        }

        match self.authenticated_user() {
            None => self.apply_local(mutation),
            Some(user) => self.apply_remote(&user, mutation).await,
        }
    }

    /// Read the cart from the authoritative store.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the cart API cannot be read.
    pub async fn load(&self) -> Result<(Cart, CartSource), CartError> {
        match self.authenticated_user() {
            None => Ok((self.local.read(), CartSource::Local)),
            Some(user) => Ok((self.remote.fetch(&user).await?, CartSource::Remote)),
        }
    }

    fn authenticated_user(&self) -> Option<AuthenticatedUser> {
        match &self.identity {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user.clone()),
        }
    }

    /// Read-modify-write against local storage.
    fn apply_local(&self, mutation: Mutation) -> Result<(), CartError> {
        let mut cart = self.local.read();
        match mutation {
            Mutation::Add {
                variant_id,
                quantity,
            } => cart.add(variant_id, Quantity::new(quantity)?)?,
            Mutation::SetQuantity {
                variant_id,
                quantity: 0,
            }
            | Mutation::Remove { variant_id } => {
                if !cart.remove(variant_id) {
                    debug!(%variant_id, "Variant not in local cart, nothing to remove");
                    return Ok(());
                }
            }
            Mutation::SetQuantity {
                variant_id,
                quantity,
            } => cart.set_quantity(variant_id, Quantity::new(quantity)?),
            Mutation::Clear => cart.clear(),
        }
        self.local.write(&cart)?;
        Ok(())
    }

    /// Send the delta or target to the server; never compute locally.
    async fn apply_remote(
        &self,
        user: &AuthenticatedUser,
        mutation: Mutation,
    ) -> Result<(), CartError> {
        match mutation {
            Mutation::Add {
                variant_id,
                quantity,
            } => {
                self.remote
                    .add_item(user, variant_id, Quantity::new(quantity)?)
                    .await?;
            }
            Mutation::SetQuantity {
                variant_id,
                quantity: 0,
            }
            | Mutation::Remove { variant_id } => self.remote.remove_item(user, variant_id).await?,
            Mutation::SetQuantity {
                variant_id,
                quantity,
            } => {
                self.remote
                    .set_quantity(user, variant_id, Quantity::new(quantity)?)
                    .await?;
            }
            Mutation::Clear => self.remote.clear(user).await?,
        }
        Ok(())
    }
}

impl std::fmt::Debug for CartReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartReconciler")
            .field("state", &self.state)
            .field("migrated", &self.migrated)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
