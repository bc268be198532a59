//! Canonical type definitions shared by all converters and clients.

pub mod entities;
pub mod enums;

pub use entities::*;
pub use enums::*;
