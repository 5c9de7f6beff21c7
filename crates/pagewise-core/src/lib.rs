//! Pagewise Core - Domain types shared by the enrichment pipeline.

mod error;
mod types;

pub use error::{Error, Result};
pub use types::*;
