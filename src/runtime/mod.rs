//! Block runtime execution engine
//!
//! This module provides the routing engine that chains blocks together, the
//! route table it consults between steps, and the event bus it reports on.

pub mod config;
pub mod engine;
pub mod events;
pub mod routing;
pub mod timer;

pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, StepError};
pub use events::{
    BlockResultEvent, EndEvent, EngineEvent, ErrorEvent, EventBus, ListenerId, StartEvent,
};
pub use routing::{FnResolver, RouteError, RouteResolver, RouteTable, RouteTarget};
pub use timer::Timer;
