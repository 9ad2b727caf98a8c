//! cartsync core - shared cart data model.
//!
//! This crate provides the types used across all cartsync components:
//! - `cartsync` - Client-side cart reconciliation (local + remote stores)
//! - `cartsync-server` - In-memory reference cart API
//! - `cartsync-cli` - Command-line driver
//!
//! # Architecture
//!
//! The core crate contains only types and pure operations - no I/O, no
//! storage access, no HTTP clients. Everything that touches the outside
//! world lives in the client or server crates.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, quantities, money, line items and carts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
