//! Linkshelf Core Library
//!
//! Domain rules and storage ports for the bookmark service.

// Re-export pure types from linkshelf-types
pub use linkshelf_types::*;

pub mod achievements;
pub mod embed;
pub mod error;
pub mod ports;
pub mod validation;

pub use error::{Result, ShelfError};
pub use validation::Validate;
