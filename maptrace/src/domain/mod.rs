//! Domain model for maptrace
//!
//! Core types shared by the map registry and the backtrace formatter,
//! plus the structured errors a registry build can produce.

pub mod errors;
pub mod types;

pub use errors::MapsError;
pub use types::MapFlags;
