//! Cart Sync Core - Shared cart types.
//!
//! This crate provides the types shared by every cart sync component:
//! - `cart-sync` - Reducer, persistence adapter, and reconciliation engine
//! - `cart-sync-cli` - Command-line tools for migrations and stored carts
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no async runtime. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, cart lines, remote cart documents, and identities

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
