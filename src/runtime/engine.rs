//! Execution engine
//!
//! Runs one block at a time: look the current id up in the registry, run the
//! block, normalize its result into the next step's arguments, report the
//! step on the event bus, and resolve the next id from the route table. The
//! run ends when there is no next id or the id has no registered block.
//!
//! A failing step is reported through an `error` event and retried with the
//! same id. A block that fails deterministically therefore keeps the engine
//! looping until something outside the engine changes its outcome.

use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::core::{normalize, Block, BlockError, BlockRegistry, IntoParams, Params};

use super::config::EngineConfig;
use super::events::{
    self, BlockResultEvent, EndEvent, EngineEvent, ErrorEvent, EventBus, ListenerId, StartEvent,
};
use super::routing::{RouteError, RouteTable};
use super::timer::Timer;

/// Failure of a single step. The engine reports it and retries the step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("block '{id}' failed: {source}")]
    Block {
        id: String,
        #[source]
        source: BlockError,
    },

    #[error("routing after block '{id}' failed: {source}")]
    Route {
        id: String,
        #[source]
        source: RouteError,
    },
}

impl StepError {
    /// Id of the block whose step failed.
    pub fn block_id(&self) -> &str {
        match self {
            StepError::Block { id, .. } | StepError::Route { id, .. } => id,
        }
    }
}

/// State of one run, owned by a single `start` call.
struct ExecutionState {
    run_id: Uuid,
    current_id: Option<String>,
    params: Params,
    timer: Timer,
}

/// The execution engine
///
/// The registry and route table are fixed at construction. Each call to
/// [`start`](Engine::start) owns its own execution state; calls running
/// concurrently on one engine share its listeners and their events
/// interleave (tell them apart by `run_id`).
#[derive(Debug)]
pub struct Engine {
    registry: BlockRegistry,
    routes: RouteTable,
    events: EventBus,
    config: EngineConfig,
}

impl Engine {
    pub fn new(registry: BlockRegistry, routes: RouteTable) -> Self {
        Self::with_config(registry, routes, EngineConfig::default())
    }

    pub fn with_config(registry: BlockRegistry, routes: RouteTable, config: EngineConfig) -> Self {
        Self {
            registry,
            routes,
            events: EventBus::new(),
            config,
        }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to an event. See [`events`](super::events) for the names.
    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.events.on(name, listener)
    }

    pub fn once<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.events.once(name, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    pub fn emit(&self, name: &str, event: &EngineEvent) -> usize {
        self.events.emit(name, event)
    }

    /// Run the engine from `init_id` with the given initial arguments.
    ///
    /// Resolves with the final parameter list once the `end` event has been
    /// delivered. Step failures never escape; they surface as `error` events.
    pub async fn start(&self, init_id: impl Into<String>, args: impl IntoParams) -> Params {
        let state = ExecutionState {
            run_id: Uuid::new_v4(),
            current_id: Some(init_id.into()),
            params: args.into_params(),
            timer: Timer::now(),
        };

        let span = info_span!("engine_run", engine = %self.config.label, run_id = %state.run_id);
        self.drive(state).instrument(span).await
    }

    async fn drive(&self, mut state: ExecutionState) -> Params {
        let init_id = state.current_id.clone().unwrap_or_default();
        info!(block_id = %init_id, arity = state.params.len(), "run started");

        self.events.emit(
            events::START,
            &EngineEvent::Start(StartEvent {
                run_id: state.run_id,
                id: init_id,
                params: state.params.clone(),
                start_time: state.timer.started_at_ms(),
            }),
        );

        let mut steps: u64 = 0;
        let mut failures: u64 = 0;

        loop {
            let id = match state.current_id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    debug!("no next block, terminating");
                    break;
                }
            };

            let Some(block) = self.registry.get(&id) else {
                debug!(block_id = %id, "block not registered, terminating");
                break;
            };

            steps += 1;
            match self.step(&id, block.as_ref(), &mut state).await {
                Ok(next) => {
                    debug!(block_id = %id, next = next.as_deref().unwrap_or("-"), "step finished");
                    state.current_id = next;
                }
                Err(error) => {
                    failures += 1;
                    warn!(block_id = %id, error = %error, "step failed, retrying block");
                    self.events.emit(
                        events::ERROR,
                        &EngineEvent::Error(ErrorEvent {
                            run_id: state.run_id,
                            id,
                            params: state.params.clone(),
                            error,
                        }),
                    );
                }
            }
        }

        let time = state.timer.elapsed_ms();
        info!(steps, failures, time_ms = time, "run finished");

        self.events.emit(
            events::END,
            &EngineEvent::End(EndEvent {
                run_id: state.run_id,
                result: state.params.clone(),
                time,
            }),
        );

        state.params
    }

    /// Run one step and return the id that follows it.
    ///
    /// `state.params` is replaced before routing, so a routing failure leaves
    /// the block's normalized output in place for the retry.
    async fn step(
        &self,
        id: &str,
        block: &dyn Block,
        state: &mut ExecutionState,
    ) -> Result<Option<String>, StepError> {
        let result = block
            .run(&state.params)
            .await
            .map_err(|source| StepError::Block {
                id: id.to_string(),
                source,
            })?;

        self.trace_result(id, &state.params, &result);

        let event = EngineEvent::BlockResult(BlockResultEvent {
            run_id: state.run_id,
            id: id.to_string(),
            params: state.params.clone(),
            result: result.clone(),
        });
        self.events.emit(events::BLOCK_RESULT, &event);
        self.events.emit(&events::block_result_for(id), &event);

        state.params = normalize(result);

        self.routes
            .resolve(id, &state.params)
            .await
            .map_err(|source| StepError::Route {
                id: id.to_string(),
                source,
            })
    }

    fn trace_result(&self, id: &str, params: &[Value], result: &Value) {
        if self.config.trace_params {
            debug!(block_id = %id, params = ?params, result = %result, "block returned");
        } else {
            debug!(block_id = %id, "block returned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{arg, BlockMetadata, FnBlock};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn block<F>(id: &str, run: F) -> Arc<dyn Block>
    where
        F: Fn(&[Value]) -> Result<Value, BlockError> + Send + Sync + 'static,
    {
        Arc::new(FnBlock::new(BlockMetadata::new(id, id, "0.1.0"), run))
    }

    fn record(engine: &Engine, name: impl Into<String>) -> Arc<Mutex<Vec<EngineEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.on(name, move |event| sink.lock().push(event.clone()));
        seen
    }

    fn sum_engine() -> Engine {
        let registry = BlockRegistry::new().with_block(block("sum", |args| {
            let a: i64 = arg(args, 0)?;
            let b: i64 = arg(args, 1)?;
            Ok(json!(a + b))
        }));
        Engine::new(registry, RouteTable::new())
    }

    #[tokio::test]
    async fn test_missing_init_block_terminates_silently() {
        let engine = Engine::new(BlockRegistry::new(), RouteTable::new());
        let starts = record(&engine, events::START);
        let results = record(&engine, events::BLOCK_RESULT);
        let errors = record(&engine, events::ERROR);
        let ends = record(&engine, events::END);

        let result = engine.start("missing", json!("only")).await;

        assert_eq!(result, vec![json!("only")]);
        assert_eq!(starts.lock().len(), 1);
        assert!(results.lock().is_empty());
        assert!(errors.lock().is_empty());

        let ends = ends.lock();
        assert_eq!(ends.len(), 1);
        assert_eq!(ends[0].as_end().unwrap().result, vec![json!("only")]);
    }

    #[tokio::test]
    async fn test_empty_init_id_terminates() {
        let engine = sum_engine();
        let results = record(&engine, events::BLOCK_RESULT);

        let result = engine.start("", vec![json!(1), json!(2)]).await;

        assert_eq!(result, vec![json!(1), json!(2)]);
        assert!(results.lock().is_empty());
    }

    #[tokio::test]
    async fn test_single_step() {
        let engine = sum_engine();
        let starts = record(&engine, events::START);
        let results = record(&engine, events::BLOCK_RESULT);
        let ends = record(&engine, events::END);

        let result = engine.start("sum", [json!(1), json!(2)]).await;
        assert_eq!(result, vec![json!(3)]);

        let starts = starts.lock();
        let start = starts[0].as_start().unwrap();
        assert_eq!(start.id, "sum");
        assert_eq!(start.params, vec![json!(1), json!(2)]);

        let results = results.lock();
        assert_eq!(results.len(), 1);
        let step = results[0].as_block_result().unwrap();
        assert_eq!(step.id, "sum");
        assert_eq!(step.params, vec![json!(1), json!(2)]);
        assert_eq!(step.result, json!(3));

        let ends = ends.lock();
        assert_eq!(ends.len(), 1);
        let end = ends[0].as_end().unwrap();
        assert_eq!(end.result, vec![json!(3)]);
        assert!(end.time >= 0.0);
        assert_eq!(end.run_id, start.run_id);
    }

    #[tokio::test]
    async fn test_block_failure_reports_error_and_retries_same_id() {
        let calls = Arc::new(Mutex::new(0u32));
        let counter = calls.clone();
        let registry = BlockRegistry::new().with_block(block("flaky", move |args| {
            let mut calls = counter.lock();
            *calls += 1;
            if *calls == 1 {
                return Err(BlockError::Execution("not ready".into()));
            }
            Ok(json!(args.len()))
        }));
        let engine = Engine::new(registry, RouteTable::new());
        let errors = record(&engine, events::ERROR);
        let results = record(&engine, events::BLOCK_RESULT);

        let result = engine.start("flaky", vec![json!("a"), json!("b")]).await;

        assert_eq!(result, vec![json!(2)]);
        assert_eq!(*calls.lock(), 2);

        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        let error = errors[0].as_error().unwrap();
        assert_eq!(error.id, "flaky");
        assert_eq!(error.params, vec![json!("a"), json!("b")]);
        assert_eq!(
            error.error,
            StepError::Block {
                id: "flaky".into(),
                source: BlockError::Execution("not ready".into()),
            }
        );

        let results = results.lock();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_block_result().unwrap().params, vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn test_route_failure_retries_with_normalized_output() {
        let attempts = Arc::new(Mutex::new(0u32));
        let counter = attempts.clone();
        let registry = BlockRegistry::new().with_block(block("inc", |args| {
            let n: i64 = arg(args, 0)?;
            Ok(json!(n + 1))
        }));
        let routes = RouteTable::new().route_with("inc", move |_| {
            let mut attempts = counter.lock();
            *attempts += 1;
            if *attempts == 1 {
                return Err(RouteError::Failed("router offline".into()));
            }
            Ok(None)
        });
        let engine = Engine::new(registry, routes);
        let errors = record(&engine, events::ERROR);
        let results = record(&engine, events::BLOCK_RESULT);

        let result = engine.start("inc", json!(1)).await;

        // First attempt ran inc(1) = 2, routing failed, retry ran inc(2) = 3.
        assert_eq!(result, vec![json!(3)]);

        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        let error = errors[0].as_error().unwrap();
        assert_eq!(error.id, "inc");
        assert_eq!(error.params, vec![json!(2)]);
        assert_eq!(error.error.block_id(), "inc");
        assert!(matches!(error.error, StepError::Route { .. }));

        let params: Vec<Params> = results
            .lock()
            .iter()
            .map(|e| e.as_block_result().unwrap().params.clone())
            .collect();
        assert_eq!(params, vec![vec![json!(1)], vec![json!(2)]]);
    }

    #[tokio::test]
    async fn test_result_events_fan_out_with_identical_payloads() {
        let registry = BlockRegistry::new().with_block(block("x", |_| Ok(json!({"ok": true}))));
        let engine = Engine::new(registry, RouteTable::new());
        let generic = record(&engine, events::BLOCK_RESULT);
        let specific = record(&engine, events::block_result_for("x"));
        let other = record(&engine, events::block_result_for("y"));

        engine.start("x", ()).await;

        let generic = generic.lock();
        let specific = specific.lock();
        assert_eq!(generic.len(), 1);
        assert_eq!(specific.len(), 1);
        assert_eq!(generic[0], specific[0]);
        assert!(other.lock().is_empty());
    }

    #[tokio::test]
    async fn test_null_result_clears_params() {
        let registry = BlockRegistry::new().with_block(block("sink", |_| Ok(Value::Null)));
        let engine = Engine::new(registry, RouteTable::new());

        assert!(engine.start("sink", json!([1, 2, 3])).await.is_empty());
    }

    #[tokio::test]
    async fn test_events_are_ordered() {
        let registry = BlockRegistry::new()
            .with_block(block("a", |_| Ok(json!("from a"))))
            .with_block(block("b", |_| Ok(json!("from b"))));
        let engine = Engine::new(registry, RouteTable::new().route("a", "b"));

        let log = Arc::new(Mutex::new(Vec::new()));
        for name in [events::START.to_string(), events::block_result_for("a"), events::block_result_for("b"), events::END.to_string()] {
            let log = log.clone();
            let tag = name.clone();
            engine.on(name, move |_| log.lock().push(tag.clone()));
        }

        engine.start("a", ()).await;

        assert_eq!(
            *log.lock(),
            vec!["start", "block a result", "block b result", "end"]
        );
    }

    #[tokio::test]
    async fn test_config_label_is_kept() {
        let config = EngineConfig::default().with_label("primes");
        let engine = Engine::with_config(BlockRegistry::new(), RouteTable::new(), config);

        assert_eq!(engine.config().label, "primes");
        assert!(engine.registry().is_empty());
        assert!(engine.routes().is_empty());
    }
}
