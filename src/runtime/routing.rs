//! Route table
//!
//! Maps the id of the block that just ran to the id of the block that runs
//! next. An entry is either a fixed id or a resolver computed from the
//! step's normalized output. A missing entry ends the run.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::BlockError;

/// Route resolution errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    /// Resolver failed
    #[error("Route resolution failed: {0}")]
    Failed(String),

    /// Resolver could not interpret the parameters it was given
    #[error("Invalid route parameters: {0}")]
    InvalidParams(String),
}

impl From<anyhow::Error> for RouteError {
    fn from(error: anyhow::Error) -> Self {
        RouteError::Failed(format!("{:#}", error))
    }
}

impl From<BlockError> for RouteError {
    fn from(error: BlockError) -> Self {
        RouteError::InvalidParams(error.to_string())
    }
}

/// Computes the next block id from a step's output
///
/// `Ok(None)` ends the run.
#[async_trait]
pub trait RouteResolver: Send + Sync {
    async fn resolve(&self, params: &[Value]) -> Result<Option<String>, RouteError>;
}

type ResolverFn = dyn Fn(&[Value]) -> Result<Option<String>, RouteError> + Send + Sync;

/// Resolver backed by a synchronous closure
pub struct FnResolver {
    resolve: Box<ResolverFn>,
}

impl FnResolver {
    pub fn new<F>(resolve: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Option<String>, RouteError> + Send + Sync + 'static,
    {
        Self {
            resolve: Box::new(resolve),
        }
    }
}

#[async_trait]
impl RouteResolver for FnResolver {
    async fn resolve(&self, params: &[Value]) -> Result<Option<String>, RouteError> {
        (self.resolve)(params)
    }
}

/// Where a block's output goes next
#[derive(Clone)]
pub enum RouteTarget {
    /// Always continue with this block id
    Static(String),
    /// Ask a resolver for the next block id
    Dynamic(Arc<dyn RouteResolver>),
}

impl fmt::Debug for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTarget::Static(id) => f.debug_tuple("Static").field(id).finish(),
            RouteTarget::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for RouteTarget {
    fn from(id: &str) -> Self {
        RouteTarget::Static(id.to_string())
    }
}

impl From<String> for RouteTarget {
    fn from(id: String) -> Self {
        RouteTarget::Static(id)
    }
}

/// Routing table keyed by the id of the block that just finished
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, RouteTarget>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the route for `from`, returning the route it replaces
    pub fn insert(&mut self, from: impl Into<String>, target: impl Into<RouteTarget>) -> Option<RouteTarget> {
        self.routes.insert(from.into(), target.into())
    }

    /// Always continue from `from` to `to`.
    pub fn route(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.insert(from, RouteTarget::Static(to.into()));
        self
    }

    /// Decide the block after `from` with a closure over the step's output.
    ///
    /// ```
    /// use block_flow::core::arg;
    /// use block_flow::runtime::RouteTable;
    ///
    /// let routes = RouteTable::new()
    ///     .route("generator", "isPrime")
    ///     .route_with("isPrime", |params| {
    ///         let n: u64 = arg(params, 0)?;
    ///         let i: u64 = arg(params, 1)?;
    ///         Ok((i <= n).then(|| "generator".to_string()))
    ///     });
    /// assert_eq!(routes.len(), 2);
    /// ```
    pub fn route_with<F>(self, from: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Option<String>, RouteError> + Send + Sync + 'static,
    {
        self.route_dynamic(from, Arc::new(FnResolver::new(resolve)))
    }

    /// Decide the block after `from` with a resolver.
    pub fn route_dynamic(mut self, from: impl Into<String>, resolver: Arc<dyn RouteResolver>) -> Self {
        self.insert(from, RouteTarget::Dynamic(resolver));
        self
    }

    pub fn get(&self, from: &str) -> Option<&RouteTarget> {
        self.routes.get(from)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolve the block that follows `from`.
    ///
    /// Static ids are returned without checking the registry; an unknown id
    /// ends the run at the next lookup.
    pub async fn resolve(&self, from: &str, params: &[Value]) -> Result<Option<String>, RouteError> {
        match self.routes.get(from) {
            None => Ok(None),
            Some(RouteTarget::Static(next)) => Ok(Some(next.clone())),
            Some(RouteTarget::Dynamic(resolver)) => resolver.resolve(params).await,
        }
    }
}
