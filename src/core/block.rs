//! Block trait and related types
//!
//! This module defines the Block trait that every unit of work implements,
//! along with its metadata, its error type, and a closure adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Core block trait that all blocks must implement
///
/// A block receives the positional arguments produced by the previous step
/// and returns a single value. Returning `Value::Array` hands several
/// positional arguments to the next step, `Value::Null` hands none.
#[async_trait]
pub trait Block: Send + Sync {
    /// Get block metadata
    fn metadata(&self) -> &BlockMetadata;

    /// Get the block's identifier
    fn id(&self) -> &str {
        &self.metadata().id
    }

    /// Run the block with the current positional arguments
    async fn run(&self, args: &[Value]) -> Result<Value, BlockError>;
}

/// Block metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Block identifier, unique within a registry
    pub id: String,
    /// Human-readable block name
    pub name: String,
    /// Block version
    pub version: String,
    /// Brief description of the block
    #[serde(default)]
    pub description: String,
}

impl BlockMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Block errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlockError {
    /// Execution failed
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Fewer positional arguments than the block reads
    #[error("Missing argument at position {index} (got {arity} arguments)")]
    MissingArgument { index: usize, arity: usize },

    /// Positional argument has the wrong shape
    #[error("Invalid argument at position {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },
}

impl From<anyhow::Error> for BlockError {
    fn from(error: anyhow::Error) -> Self {
        BlockError::Execution(format!("{:#}", error))
    }
}

type BlockFn = dyn Fn(&[Value]) -> Result<Value, BlockError> + Send + Sync;

/// Block backed by a synchronous closure.
///
/// ```
/// use block_flow::core::{BlockMetadata, FnBlock};
/// use serde_json::json;
///
/// let echo = FnBlock::new(BlockMetadata::new("echo", "Echo Block", "0.1.0"), |args| {
///     Ok(json!(args))
/// });
/// ```
pub struct FnBlock {
    metadata: BlockMetadata,
    run: Box<BlockFn>,
}

impl FnBlock {
    pub fn new<F>(metadata: BlockMetadata, run: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, BlockError> + Send + Sync + 'static,
    {
        Self {
            metadata,
            run: Box::new(run),
        }
    }
}

impl fmt::Debug for FnBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBlock")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Block for FnBlock {
    fn metadata(&self) -> &BlockMetadata {
        &self.metadata
    }

    async fn run(&self, args: &[Value]) -> Result<Value, BlockError> {
        (self.run)(args)
    }
}
