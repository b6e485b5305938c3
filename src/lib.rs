//! Workspace placeholder crate.
//!
//! This crate exists so host applications can depend on a single package and
//! pull in the playback service façade (`core-service`) through the default
//! `service` feature, without wiring each workspace crate individually.

#[cfg(feature = "service")]
pub use core_service::*;
