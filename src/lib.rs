//! Block Flow - routing execution engine for chained blocks
//!
//! An [`Engine`] repeatedly runs a named [`Block`], turns its result into the
//! positional arguments of the next step, and picks the next block from a
//! [`RouteTable`] whose entries are fixed ids or resolvers over the step's
//! output. Progress is reported on a synchronous event bus.
//!
//! ```
//! use block_flow::{arg, events, BlockMetadata, BlockRegistry, Engine, FnBlock, RouteTable};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let sum = FnBlock::new(BlockMetadata::new("sum", "Sum Block", "0.1.0"), |args| {
//!     let a: i64 = arg(args, 0)?;
//!     let b: i64 = arg(args, 1)?;
//!     Ok(json!(a + b))
//! });
//! let engine = Engine::new(BlockRegistry::new().with_block(Arc::new(sum)), RouteTable::new());
//! engine.on(events::END, |event| println!("{:?}", event));
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! assert_eq!(runtime.block_on(engine.start("sum", [json!(1), json!(2)])), vec![json!(3)]);
//! ```

pub mod core;
pub mod logging;
pub mod runtime;
mod tests;

// Re-export commonly used types
pub use crate::core::{arg, normalize, Block, BlockError, BlockMetadata, BlockRegistry, FnBlock, IntoParams, Params, Value};
pub use runtime::{events, Engine, EngineConfig, EngineEvent, RouteResolver, RouteTable, RouteTarget, StepError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
