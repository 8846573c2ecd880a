//! # Application Layer
//!
//! Storage and capability boundaries, and the resolvers built on them.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
