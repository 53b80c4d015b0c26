//! Block Registry - lookup table from block id to block
//!
//! The registry is assembled once and then moved into an [`Engine`], which
//! only ever reads from it. Registering a block under an id that is already
//! taken replaces the previous block.
//!
//! [`Engine`]: crate::runtime::Engine

use crate::core::Block;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Block registry keyed by block id
#[derive(Clone, Default)]
pub struct BlockRegistry {
    blocks: HashMap<String, Arc<dyn Block>>,
}

impl BlockRegistry {
    /// Create a new empty block registry
    ///
    /// # Example
    /// ```
    /// use block_flow::core::registry::BlockRegistry;
    ///
    /// let registry = BlockRegistry::new();
    /// assert!(registry.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block under its own id
    ///
    /// # Returns
    /// The block previously registered under that id, if any
    pub fn register(&mut self, block: Arc<dyn Block>) -> Option<Arc<dyn Block>> {
        let id = block.id().to_string();
        self.register_as(id, block)
    }

    /// Register a block under an explicit id
    ///
    /// The key does not have to match `block.id()`; the engine routes by key.
    pub fn register_as(
        &mut self,
        id: impl Into<String>,
        block: Arc<dyn Block>,
    ) -> Option<Arc<dyn Block>> {
        let id = id.into();
        debug!(block_id = %id, block_name = %block.metadata().name, "registering block");

        let previous = self.blocks.insert(id, block);
        if let Some(previous) = &previous {
            warn!(
                block_id = %previous.id(),
                block_name = %previous.metadata().name,
                "block id registered twice, replacing previous block"
            );
        }
        previous
    }

    /// Builder-style variant of [`register`](Self::register)
    pub fn with_block(mut self, block: Arc<dyn Block>) -> Self {
        self.register(block);
        self
    }

    /// Get a block by its id
    pub fn get(&self, id: &str) -> Option<Arc<dyn Block>> {
        self.blocks.get(id).cloned()
    }

    /// Check if a block with the given id exists
    pub fn contains(&self, id: &str) -> bool {
        self.blocks.contains_key(id)
    }

    /// Registered ids, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    /// Get the number of registered blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl FromIterator<Arc<dyn Block>> for BlockRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Block>>>(iter: I) -> Self {
        let mut registry = BlockRegistry::new();
        for block in iter {
            registry.register(block);
        }
        registry
    }
}

impl fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.ids().collect();
        ids.sort_unstable();
        f.debug_struct("BlockRegistry").field("blocks", &ids).finish()
    }
}
