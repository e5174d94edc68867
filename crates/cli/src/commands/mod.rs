//! CLI command implementations.

pub mod mask;
pub mod pix;
pub mod postal;
