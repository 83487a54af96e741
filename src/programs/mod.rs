//! Type-safe roodmus argument modules.
//!
//! Each struct maps Rust fields to the exact CLI flags expected by the
//! corresponding roodmus subcommand.

pub mod conformations;
pub mod parakeet;
