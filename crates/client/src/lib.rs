//! Cartsync client library.
//!
//! Keeps a shopper's cart consistent between device-local storage and the
//! remote cart API across sign-in and sign-out. Anonymous shoppers edit a
//! local cart; signed-in shoppers edit their server cart, and the anonymous
//! cart is merged into it once per session.
//!
//! The entry point is [`CartService`], which serializes every operation
//! through one worker task and publishes versioned [`CartSnapshot`]s.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod identity;
pub mod local;
pub mod notify;
pub mod reconciler;
pub mod remote;
pub mod service;
pub mod storage;

#[cfg(test)]
mod testing;

pub use cartsync_core::{Cart, CartLineItem, Quantity, UserId, VariantId};
pub use config::{CartApiConfig, CartClientConfig, ConfigError};
pub use error::{CartError, Result};
pub use identity::{AuthenticatedUser, Identity, StaticTokenProvider, TokenProvider};
pub use local::LocalCartStore;
pub use notify::{
    CartEvent, CartOperation, ChannelNotifier, NoopNotifier, NotificationSink, TracingNotifier,
};
pub use reconciler::{
    CartReconciler, CartSource, IdentityChange, MigrationOutcome, MigrationPolicy, Mutation,
    SyncState,
};
pub use remote::{CartApiClient, RemoteCartGateway, RemoteError};
pub use service::{CartService, CartSnapshot};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
