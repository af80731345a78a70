//! Core types for the cart sync engine.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod identity;

pub use cart::{CartDocument, CartLine};
pub use id::*;
pub use identity::Identity;
