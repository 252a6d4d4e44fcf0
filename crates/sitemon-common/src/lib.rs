//! Shared domain types for the sitemon monitoring engine.

pub mod id;
pub mod normalize;
pub mod types;
