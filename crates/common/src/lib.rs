//! Common types shared across the broadcast relay crates.

#![warn(clippy::pedantic)]

/// Module for identifier and credential newtypes
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;
