//! Core types for DaniThur.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod cart;
pub mod id;
pub mod price;
pub mod status;

pub use address::{AddressError, DeliveryAddress, PostalCode, Region};
pub use cart::{CartItem, CartSnapshot, VehicleSummary};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use status::*;
