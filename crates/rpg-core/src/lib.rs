//! Core types for the Repository Planning Graph (RPG).
//!
//! Provides the dual-view node/edge model ([`model::Node`], [`model::Edge`]),
//! the error taxonomy ([`error::RpgError`]), configuration types, the canonical
//! JSON schema, and trie-based LCA computation for artifact grounding.

pub mod config;
pub mod error;
pub mod lca;
pub mod model;
pub mod schema;

pub use error::{Result, RpgError};
