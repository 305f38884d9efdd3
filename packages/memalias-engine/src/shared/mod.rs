//! Shared module - Common types used by every feature
//!
//! Ids, addresses, values and the declared-type vocabulary.

pub mod models;

pub use models::*;
