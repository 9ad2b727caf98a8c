//! Core types for cartsync.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod id;
pub mod line_item;
pub mod price;
pub mod quantity;

pub use cart::Cart;
pub use id::*;
pub use line_item::{CartLineItem, HydratedLine, PendingLine};
pub use price::{CurrencyCode, Price};
pub use quantity::{Quantity, QuantityError};
