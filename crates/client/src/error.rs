//! Unified error handling for cart operations.
//!
//! Every failure a cart operation can hit is funnelled into `CartError` at
//! the service boundary. Callers get the typed error back, and the user is
//! told through the notification sink using `CartError::user_message`, which
//! never exposes internal details.

use cartsync_core::QuantityError;
use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Error type returned by `CartService` operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// A remote operation was needed but no session token could be obtained.
    #[error("Auth token missing")]
    AuthTokenMissing,

    /// The cart API failed or could not be reached.
    #[error("Remote failure: {0}")]
    Remote(RemoteError),

    /// Writing device-local storage failed.
    #[error("Local storage error: {0}")]
    LocalStorage(#[from] StorageError),

    /// The requested quantity is out of range.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// The cart worker is no longer running.
    #[error("Cart service stopped")]
    ServiceStopped,
}

impl From<RemoteError> for CartError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::AuthTokenMissing => Self::AuthTokenMissing,
            other => Self::Remote(other),
        }
    }
}

impl CartError {
    /// Text suitable for a user-facing notification.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthTokenMissing => "Please sign in again to update your cart".to_string(),
            Self::Remote(RemoteError::Api { status, message }) if *status < 500 => {
                message.clone()
            }
            Self::Remote(_) | Self::ServiceStopped => {
                "Could not reach the cart service, please try again".to_string()
            }
            Self::LocalStorage(_) => "Could not save your cart on this device".to_string(),
            Self::InvalidQuantity(err) => match err {
                QuantityError::Zero => "Quantity must be at least 1".to_string(),
                QuantityError::Overflow => "Quantity is too large".to_string(),
            },
        }
    }

    /// Whether the failure should be reported to error tracking.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        match self {
            Self::Remote(RemoteError::Api { status, .. }) => *status >= 500,
            Self::Remote(_) | Self::LocalStorage(_) | Self::ServiceStopped => true,
            Self::AuthTokenMissing | Self::InvalidQuantity(_) => false,
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
