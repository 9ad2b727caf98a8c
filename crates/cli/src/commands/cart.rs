//! Cart commands.
//!
//! Each invocation is one shopper session: the anonymous cart lives in
//! `CART_STORAGE_DIR`, and passing `--user-id` signs in, which merges that
//! cart into the account cart before the command runs.
//!
//! # Usage
//!
//! ```bash
//! cartsync add 42 --quantity 2
//! cartsync --user-id alice show
//! cartsync --user-id alice --token <token> set 42 5
//! ```
//!
//! # Environment Variables
//!
//! - `CART_API_URL` - Base URL of the cart API (required)

use std::sync::Arc;

use cartsync::{
    CartApiClient, CartClientConfig, CartError, CartReconciler, CartService, CartSnapshot,
    CartSource, ConfigError, FileStorage, Identity, LocalCartStore, RemoteError,
    StaticTokenProvider, TracingNotifier,
};
use cartsync_core::{CurrencyCode, UserId, VariantId};
use secrecy::SecretString;
use thiserror::Error;

use crate::telemetry;

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CartCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cart API error: {0}")]
    Remote(#[from] RemoteError),

    #[error("{}", .0.user_message())]
    Cart(#[from] CartError),
}

/// A cart operation requested on the command line.
#[derive(Debug, Clone, Copy)]
pub enum CartAction {
    Show,
    Add { variant_id: VariantId, quantity: u32 },
    Set { variant_id: VariantId, quantity: u32 },
    Remove { variant_id: VariantId },
    Clear,
}

/// Who the command runs as.
#[derive(Debug, Default)]
pub struct SignIn {
    pub user_id: Option<String>,
    pub token: Option<String>,
}

/// Run one cart action and print the resulting cart.
pub async fn run(sign_in: SignIn, action: CartAction) -> Result<(), CartCommandError> {
    let config = CartClientConfig::from_env()?;
    let _sentry_guard = telemetry::init(
        config.sentry_dsn.as_deref(),
        config.sentry_environment.clone(),
    );

    let api = CartApiClient::new(&config.api)?;
    let local = LocalCartStore::new(
        Arc::new(FileStorage::new(config.storage_dir.clone())),
        config.storage_key.clone(),
    );
    let identity = identity(&api, sign_in).await?;

    let reconciler = CartReconciler::new(local, Arc::new(api), config.migration_policy);
    let service = CartService::spawn(reconciler, Arc::new(TracingNotifier));

    if identity.is_authenticated() {
        service.set_identity(identity).await?;
    }

    let snapshot = match action {
        CartAction::Show => service.refresh().await?,
        CartAction::Add {
            variant_id,
            quantity,
        } => service.add_item(variant_id, quantity).await?,
        CartAction::Set {
            variant_id,
            quantity,
        } => service.set_quantity(variant_id, quantity).await?,
        CartAction::Remove { variant_id } => service.remove_item(variant_id).await?,
        CartAction::Clear => service.clear().await?,
    };

    print_cart(&snapshot);
    Ok(())
}

/// Resolve `--user-id`/`--token` into an identity, logging in when no
/// token was given.
async fn identity(api: &CartApiClient, sign_in: SignIn) -> Result<Identity, CartCommandError> {
    let Some(user_id) = sign_in.user_id.map(UserId::new) else {
        return Ok(Identity::Anonymous);
    };

    let token = match sign_in.token {
        Some(token) => SecretString::from(token),
        None => {
            tracing::info!(user_id = %user_id, "Requesting session token");
            api.issue_token(&user_id).await?
        }
    };

    Ok(Identity::authenticated(
        user_id,
        Arc::new(StaticTokenProvider::from_secret(token)),
    ))
}

#[allow(clippy::print_stdout)]
fn print_cart(snapshot: &CartSnapshot) {
    let source = match snapshot.source {
        CartSource::Local => "this device",
        CartSource::Remote => "your account",
    };

    if snapshot.cart.is_empty() {
        println!("Cart ({source}) is empty");
        return;
    }

    println!(
        "Cart ({source}), {} item(s):",
        snapshot.cart.total_quantity()
    );
    for line in &snapshot.cart {
        let name = line.name().unwrap_or("(not yet priced)");
        let total = line
            .line_total()
            .map(|price| price.display(CurrencyCode::default()))
            .unwrap_or_default();
        println!(
            "  {:>8}  x{:<4} {name:<32} {total}",
            line.variant_id().as_i32(),
            line.quantity().get()
        );
    }

    if let Some(subtotal) = snapshot.cart.subtotal() {
        println!("  Subtotal: {}", subtotal.display(CurrencyCode::default()));
    }
}
