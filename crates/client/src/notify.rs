//! Success and failure notifications for cart operations.
//!
//! Presentation (toasts, banners) belongs to the UI layer; the cart service
//! only emits `CartEvent`s into a `NotificationSink`.

use tokio::sync::mpsc;

/// The operation an event reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartOperation {
    AddItem,
    SetQuantity,
    RemoveItem,
    Clear,
    Refresh,
    SignIn,
    SignOut,
}

impl CartOperation {
    /// Short machine-friendly name, used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AddItem => "add_item",
            Self::SetQuantity => "set_quantity",
            Self::RemoveItem => "remove_item",
            Self::Clear => "clear",
            Self::Refresh => "refresh",
            Self::SignIn => "sign_in",
            Self::SignOut => "sign_out",
        }
    }

    const fn success_message(self) -> &'static str {
        match self {
            Self::AddItem => "Added to cart",
            Self::SetQuantity => "Cart updated",
            Self::RemoveItem => "Removed from cart",
            Self::Clear => "Cart cleared",
            Self::Refresh => "Cart refreshed",
            Self::SignIn => "Your cart is synced to your account",
            Self::SignOut => "Signed out",
        }
    }
}

impl std::fmt::Display for CartOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Success,
    /// `message` is safe to show to the shopper.
    Failure { message: String },
}

/// A notification emitted after a cart operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEvent {
    pub operation: CartOperation,
    pub outcome: EventOutcome,
}

impl CartEvent {
    #[must_use]
    pub const fn success(operation: CartOperation) -> Self {
        Self {
            operation,
            outcome: EventOutcome::Success,
        }
    }

    #[must_use]
    pub fn failure(operation: CartOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            outcome: EventOutcome::Failure {
                message: message.into(),
            },
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, EventOutcome::Success)
    }

    /// Text to show the shopper.
    #[must_use]
    pub fn message(&self) -> &str {
        match &self.outcome {
            EventOutcome::Success => self.operation.success_message(),
            EventOutcome::Failure { message } => message,
        }
    }
}

/// Receiver of cart notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: CartEvent);
}

/// Logs every event and leaves a Sentry breadcrumb trail.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, event: CartEvent) {
        let level = if event.is_success() {
            tracing::info!(operation = %event.operation, text = event.message(), "Cart notification");
            sentry::Level::Info
        } else {
            tracing::warn!(operation = %event.operation, text = event.message(), "Cart notification");
            sentry::Level::Warning
        };

        sentry::add_breadcrumb(sentry::Breadcrumb {
            category: Some("cart".to_string()),
            message: Some(format!("{}: {}", event.operation, event.message())),
            level,
            ..Default::default()
        });
    }
}

/// Forwards events to a UI task over a channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<CartEvent>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver the UI should drain.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CartEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, event: CartEvent) {
        // The UI may have gone away; events are then simply dropped.
        let _ = self.tx.send(event);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    fn notify(&self, _event: CartEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_message() {
        let event = CartEvent::success(CartOperation::AddItem);
        assert!(event.is_success());
        assert_eq!(event.message(), "Added to cart");
    }

    #[test]
    fn test_failure_message() {
        let event = CartEvent::failure(CartOperation::RemoveItem, "Could not reach the cart service");
        assert!(!event.is_success());
        assert_eq!(event.message(), "Could not reach the cart service");
    }

    #[tokio::test]
    async fn test_channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(CartEvent::success(CartOperation::Clear));

        let event = rx.recv().await;
        assert_eq!(event, Some(CartEvent::success(CartOperation::Clear)));
    }

    #[test]
    fn test_channel_notifier_survives_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(CartEvent::success(CartOperation::Clear));
    }

    #[test]
    fn test_tracing_notifier_without_sentry_client() {
        TracingNotifier.notify(CartEvent::failure(CartOperation::SignIn, "failed"));
    }
}
