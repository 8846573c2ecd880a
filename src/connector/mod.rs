//! # Connector Layer
//!
//! External integrations implementing application interfaces:
//! - Versioned storage (libgit2, in-memory)
//! - Code intelligence (HTTP, mock)
//! - Repository discovery (GitHub, static)
//! - The query engine and command surface

pub mod adapter;
pub mod api;

pub use adapter::*;
pub use api::*;
