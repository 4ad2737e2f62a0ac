//! Integration test utilities for typing presence
//!
//! This crate provides helpers for running several presence clients
//! against one shared broadcast bus.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
