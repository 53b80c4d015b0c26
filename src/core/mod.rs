//! Core block abstractions and types
//!
//! This module defines the block capability contract, the parameter list that
//! flows between steps, and the registry the engine looks blocks up in.

pub mod block;
pub mod params;
pub mod registry;

/// Opaque value passed between blocks.
pub use serde_json::Value;

pub use block::{Block, BlockError, BlockMetadata, FnBlock};
pub use params::{arg, normalize, IntoParams, Params};
pub use registry::BlockRegistry;
