//! Common types and utilities shared across modules.

pub mod error;
pub mod types;
