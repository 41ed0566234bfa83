pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod handlers;
pub mod query;
pub mod resolver;
pub mod server;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use error::{DdplsError, Result};
pub use server::Backend;


