//! # Domain Layer
//!
//! Core models of the repository graph and the error taxonomy.
//! This layer is independent of storage backends and the query front end.

mod error;
pub mod models;

pub use error::*;
pub use models::*;
