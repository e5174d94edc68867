//! DaniThur Core - Shared types library.
//!
//! This crate provides common types used across all DaniThur components:
//! - `storefront` - Checkout backend-for-frontend serving the storefront SPA
//! - `cli` - Command-line tools for lookups and payment checks
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, addresses, cart snapshots,
//!   and the payment/checkout state enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
