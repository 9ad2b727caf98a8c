//! Shopper identity as seen by the cart.
//!
//! The identity provider itself is external. Cartsync only needs to know
//! whether the shopper is signed in, under which user ID, and how to get a
//! bearer token when talking to the cart API.

use std::sync::Arc;

use async_trait::async_trait;
use cartsync_core::UserId;
use secrecy::SecretString;

/// Source of session tokens for the signed-in shopper.
#[async_trait]
pub trait TokenProvider: std::fmt::Debug + Send + Sync {
    /// Returns the access token, if one can be obtained.
    async fn access_token(&self) -> Option<SecretString>;
}

/// Token provider that always hands out the same token.
pub struct StaticTokenProvider {
    token: Option<SecretString>,
}

impl StaticTokenProvider {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(SecretString::from(token.into())),
        }
    }

    /// Wrap a token that is already held as a secret.
    #[must_use]
    pub const fn from_secret(token: SecretString) -> Self {
        Self { token: Some(token) }
    }

    /// A provider whose session has lapsed.
    #[must_use]
    pub const fn expired() -> Self {
        Self { token: None }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Option<SecretString> {
        self.token.clone()
    }
}

/// A signed-in shopper.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub tokens: Arc<dyn TokenProvider>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            user_id: user_id.into(),
            tokens,
        }
    }
}

/// Who the cart belongs to right now.
#[derive(Debug, Clone, Default)]
pub enum Identity {
    /// No session; the device-local store is authoritative.
    #[default]
    Anonymous,
    /// Signed in; the cart API is authoritative.
    Authenticated(AuthenticatedUser),
}

impl Identity {
    /// Shorthand for a signed-in identity.
    #[must_use]
    pub fn authenticated(user_id: impl Into<UserId>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::Authenticated(AuthenticatedUser::new(user_id, tokens))
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(&user.user_id),
        }
    }

    /// Whether both identities name the same shopper.
    ///
    /// Token providers are not compared: a refreshed token for the same user
    /// is not an identity change.
    #[must_use]
    pub fn same_shopper(&self, other: &Self) -> bool {
        self.user_id() == other.user_id()
    }
}
