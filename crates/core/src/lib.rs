//! Core domain types and shared logic for Templar.
//!
//! This crate defines the model used across all other crates:
//! - Application configuration
//! - BLAKE3 content hashing for artifacts
//! - Canonical object key derivation

pub mod config;
pub mod error;
pub mod hash;
pub mod key;

pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher};
pub use key::object_key;
