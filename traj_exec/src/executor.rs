//! # Trajectory Executor
//!
//! Owns the active trajectory plan and periodically emits its unconsumed remainder to the control
//! plugin named in the plan.
//!
//! Two execution contexts share the [`ExecState`]:
//! - the ingestion context, which installs plans as they arrive from a [`PlanSource`],
//! - the emission context, driven by a periodic [`Timer`], which advances the plan and publishes
//!   it through the [`DispatchTable`].
//!
//! Each context runs on its own thread so plan traffic can never delay emission. The state is
//! only touched under its mutex and nothing is published while the mutex is held.
//!
//! Unrecoverable errors are not handled here. They are returned from [`TrajectoryExecutor::run`]
//! as a [`FatalError`] for the caller to hand to the failure guard.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::traj::TrajectoryPlan;
use log::{debug, error, info, trace, warn};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex, MutexGuard,
    },
    thread,
    time::Duration,
};

use crate::{
    dispatch::{DispatchError, DispatchTable, PlanSink, PublishError},
    exec_state::{ExecState, Mode, Step},
    params::{ParamsError, TrajExecParams},
    plan_source::PlanSource,
    registry::{ControlPluginRegistry, RegistryError},
    timer::{Timer, TimerCallback, TimerError, TimerEvent, TimerFactory},
    transform::TransformError,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// ID of the emission timer.
pub const EMIT_TIMER_ID: u32 = 0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Everything the executor needs, built once during initialisation.
pub struct ExecContext {
    /// Period of the emission timer
    pub tick_period: Duration,

    pub dispatch: DispatchTable,
}

pub struct TrajectoryExecutor {
    ingestor: PlanIngestor,
    emitter: PlanEmitter,
    tick_period: Duration,
}

/// Ingestion half of the executor.
#[derive(Clone)]
pub struct PlanIngestor {
    state: Arc<Mutex<ExecState>>,
}

/// Emission half of the executor.
pub struct PlanEmitter {
    state: Arc<Mutex<ExecState>>,
    dispatch: DispatchTable,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which prevent the executor from being created.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error("Could not query the control plugin registry: {0}")]
    RegistryError(#[from] RegistryError),

    #[error("Could not build the dispatch table: {0}")]
    DispatchError(#[from] DispatchError),
}

/// Unrecoverable errors raised while the executor is running.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error(
        "Plan {trajectory_id} is destined for control plugin \"{plugin}\" which is not in the \
        dispatch table"
    )]
    UnknownPlugin {
        plugin: String,
        trajectory_id: String,
    },

    #[error("Internal error, plan transform precondition violated: {0}")]
    PreconditionViolation(#[from] TransformError),

    #[error("Internal error, the execution state lock was poisoned")]
    StatePoisoned,
}

/// Reason the executor stopped running.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("Initialisation failed: {0}")]
    Init(#[from] InitError),

    #[error("{0}")]
    Exec(#[from] ExecError),

    #[error("Could not start the emission timer: {0}")]
    Timer(#[from] TimerError),

    #[error("Could not spawn the plan ingestion thread: {0}")]
    Spawn(std::io::Error),

    #[error("All execution contexts exited")]
    ContextsExited,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ExecContext {
    /// Validate the parameters, query the registry and open one output channel per plugin.
    ///
    /// The registry is queried exactly once. `open_sink(name, endpoint)` opens the channel for
    /// one plugin.
    pub fn init<F>(
        params: &TrajExecParams,
        registry: &dyn ControlPluginRegistry,
        open_sink: F
    ) -> Result<Self, InitError>
    where
        F: FnMut(&str, &str) -> Result<Box<dyn PlanSink>, PublishError>
    {
        let tick_period = params.validate()?;

        info!(
            "Emitting at {} Hz (minimum {} Hz)",
            params.traj_frequency_hz,
            params.min_traj_publish_tickrate_hz
        );

        let plugins: BTreeMap<String, String> = registry.query_control_plugins()?;

        info!("Discovered {} control plugins:", plugins.len());

        let dispatch = DispatchTable::build(&plugins, open_sink)?;

        Ok(Self { tick_period, dispatch })
    }
}

impl TrajectoryExecutor {
    pub fn new(ctx: ExecContext) -> Self {
        let state = Arc::new(Mutex::new(ExecState::new()));

        Self {
            ingestor: PlanIngestor { state: state.clone() },
            emitter: PlanEmitter { state, dispatch: ctx.dispatch },
            tick_period: ctx.tick_period,
        }
    }

    /// Install a newly recieved plan, see [`PlanIngestor::on_new_plan`].
    pub fn on_new_plan(&self, plan: TrajectoryPlan) -> Result<bool, ExecError> {
        self.ingestor.on_new_plan(plan)
    }

    /// Perform one emission tick, see [`PlanEmitter::on_emit_tick`].
    pub fn on_emit_tick(&mut self) -> Result<Option<TrajectoryPlan>, ExecError> {
        self.emitter.on_emit_tick()
    }

    pub fn mode(&self) -> Result<Mode, ExecError> {
        Ok(lock_state(&self.ingestor.state)?.mode())
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// Separate the ingestion and emission halves so they can be driven from different threads.
    pub fn split(self) -> (PlanIngestor, PlanEmitter) {
        (self.ingestor, self.emitter)
    }

    /// Run the executor until an unrecoverable error occurs.
    ///
    /// Plans are recieved from `source` on a dedicated ingestion thread and emitted from a timer
    /// built by `timers`. This function blocks until either context fails, stops both and returns
    /// the error.
    pub fn run<S>(self, timers: &dyn TimerFactory, source: S) -> FatalError
    where
        S: PlanSource + 'static
    {
        let (fatal_tx, fatal_rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));

        let tick_period = self.tick_period;
        let plugins: Vec<String> = self.emitter.dispatch.plugins().map(String::from).collect();
        let (ingestor, emitter) = self.split();

        let mut timer = match timers.build_timer(
            EMIT_TIMER_ID,
            tick_period,
            emission_callback(emitter, tick_period, fatal_tx.clone()),
            true
        ) {
            Ok(t) => t,
            Err(e) => return FatalError::Timer(e),
        };

        let ingest_stop = stop.clone();
        let ingest_handle = match thread::Builder::new()
            .name("plan_ingest".into())
            .spawn(move || run_ingestion(ingestor, source, ingest_stop, fatal_tx))
        {
            Ok(h) => h,
            Err(e) => {
                timer.stop();
                return FatalError::Spawn(e);
            }
        };

        info!(
            "Trajectory executor running, emitting every {:?} to {:?}",
            tick_period, plugins
        );

        let fatal = fatal_rx.recv().unwrap_or(FatalError::ContextsExited);

        info!("Stopping execution contexts");

        stop.store(true, Ordering::Relaxed);
        timer.stop();
        if ingest_handle.join().is_err() {
            warn!("Plan ingestion thread panicked");
        }

        fatal
    }
}

impl PlanIngestor {
    /// Install a newly recieved plan, pre-empting the current one.
    ///
    /// Returns `Ok(false)` if the plan was rejected, in which case the state is unchanged.
    pub fn on_new_plan(&self, plan: TrajectoryPlan) -> Result<bool, ExecError> {
        let trajectory_id = plan.trajectory_id.clone();
        let num_points = plan.len();
        let plugin = plan.controller_plugin.clone();

        let result = lock_state(&self.state)?.install(plan);

        match result {
            Ok(replaced) => {
                if let Some(old) = replaced {
                    debug!(
                        "Plan {} pre-empted with {} points remaining",
                        old.trajectory_id,
                        old.len()
                    );
                }
                debug!(
                    "Installed plan {} ({} points) for {}",
                    trajectory_id, num_points, plugin
                );
                Ok(true)
            }
            Err(e) => {
                warn!("Rejected inbound plan: {}", e);
                Ok(false)
            }
        }
    }
}

impl PlanEmitter {
    /// Advance the installed plan and publish it to its control plugin.
    ///
    /// Returns the published plan, or `None` if nothing was published this tick.
    pub fn on_emit_tick(&mut self) -> Result<Option<TrajectoryPlan>, ExecError> {
        let plan = {
            let mut state = lock_state(&self.state)?;

            let step = state.next_step()?;

            match step {
                Step::Idle => return Ok(None),
                Step::Exhaust => {
                    if let Some(p) = state.current_plan() {
                        debug!("Plan {} exhausted", p.trajectory_id);
                    }
                }
                Step::Emit { ref plan, .. } => {
                    if !self.dispatch.contains(&plan.controller_plugin) {
                        return Err(ExecError::UnknownPlugin {
                            plugin: plan.controller_plugin.clone(),
                            trajectory_id: plan.trajectory_id.clone(),
                        });
                    }
                }
            }

            match state.apply(step) {
                Some(p) => p,
                None => return Ok(None),
            }
        };

        let sink = self.dispatch.lookup(&plan.controller_plugin).ok_or_else(|| {
            ExecError::UnknownPlugin {
                plugin: plan.controller_plugin.clone(),
                trajectory_id: plan.trajectory_id.clone(),
            }
        })?;

        match sink.publish(&plan) {
            Ok(()) => trace!(
                "Emitted {} ({} points) to {}",
                plan.trajectory_id,
                plan.len(),
                plan.controller_plugin
            ),
            Err(e) => warn!(
                "Could not publish plan {} to {}: {}",
                plan.trajectory_id, plan.controller_plugin, e
            ),
        }

        Ok(Some(plan))
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Initialise the executor and run it until an unrecoverable error occurs.
///
/// Nothing is started if initialisation fails: no timer is built and `source` is never read.
pub fn init_and_run<F, S>(
    params: &TrajExecParams,
    registry: &dyn ControlPluginRegistry,
    open_sink: F,
    timers: &dyn TimerFactory,
    source: S
) -> FatalError
where
    F: FnMut(&str, &str) -> Result<Box<dyn PlanSink>, PublishError>,
    S: PlanSource + 'static
{
    match ExecContext::init(params, registry, open_sink) {
        Ok(ctx) => TrajectoryExecutor::new(ctx).run(timers, source),
        Err(e) => FatalError::Init(e),
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn lock_state(state: &Mutex<ExecState>) -> Result<MutexGuard<'_, ExecState>, ExecError> {
    state.lock().map_err(|_| ExecError::StatePoisoned)
}

/// Build the emission timer callback.
///
/// After the first error the callback does nothing, the error is reported once.
fn emission_callback(
    mut emitter: PlanEmitter,
    tick_period: Duration,
    fatal_tx: mpsc::Sender<FatalError>
) -> TimerCallback {
    let mut failed = false;

    Box::new(move |event: &TimerEvent| {
        if failed {
            return;
        }

        let lateness = event.actual.saturating_duration_since(event.expected);
        if lateness > tick_period {
            warn!("Emission tick {} is {:?} late", event.tick, lateness);
        }

        if let Err(e) = emitter.on_emit_tick() {
            failed = true;
            fatal_tx.send(FatalError::Exec(e)).ok();
        }
    })
}

fn run_ingestion<S: PlanSource>(
    ingestor: PlanIngestor,
    mut source: S,
    stop: Arc<AtomicBool>,
    fatal_tx: mpsc::Sender<FatalError>
) {
    while !stop.load(Ordering::Relaxed) {
        match source.recv_plan() {
            Ok(Some(plan)) => {
                if let Err(e) = ingestor.on_new_plan(plan) {
                    fatal_tx.send(FatalError::Exec(e)).ok();
                    return;
                }
            }
            Ok(None) => (),
            Err(e) if e.is_transient() => warn!("Dropped inbound message: {}", e),
            Err(e) => {
                error!("Plan source failed, no further plans will be recieved: {}", e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dispatch::ChannelPlanSink,
        guard::{test::ChannelAlertSink, FailureGuard},
        plan_source::{ChannelPlanSource, PlanSourceError},
        registry::StaticRegistry,
        timer::ManualTimerFactory,
        transform::test::line_plan,
    };
    use comms_if::{
        alert::AlertType,
        net::{zmq, MonitoredSocketError},
    };
    use std::{
        cell::Cell,
        sync::atomic::AtomicUsize,
        sync::mpsc::{channel, Receiver},
        time::Instant,
    };

    const PARAMS: &str = r#"
        plan_endpoint = "tcp://localhost:6000"
        system_alert_endpoint = "tcp://*:6010"

        [registry]
        type = "static"
        plugins = {}
    "#;

    /// Build an executor with one channel sink per named plugin.
    fn executor(plugins: &[&str]) -> (TrajectoryExecutor, BTreeMap<String, Receiver<TrajectoryPlan>>) {
        let mut receivers = BTreeMap::new();
        let mut senders = BTreeMap::new();

        for p in plugins {
            let (tx, rx) = channel();
            senders.insert(p.to_string(), tx);
            receivers.insert(p.to_string(), rx);
        }

        let registry = StaticRegistry::new(
            plugins.iter().map(|p| (p.to_string(), format!("chan_{}", p))).collect()
        );
        let params: TrajExecParams = util::params::from_toml_str(PARAMS).unwrap();

        let ctx = ExecContext::init(&params, &registry, |name, _| {
            Ok(Box::new(ChannelPlanSink::new(senders[name].clone())) as Box<dyn PlanSink>)
        }).unwrap();

        (TrajectoryExecutor::new(ctx), receivers)
    }

    fn xs(plan: &TrajectoryPlan) -> Vec<f64> {
        plan.points.iter().map(|p| p.x_m).collect()
    }

    /// Poll `cond` until it holds or a second has passed.
    fn wait_for<F: FnMut() -> bool>(mut cond: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_emission_sequence() {
        let (mut exec, rx) = executor(&["A"]);
        let rx_a = &rx["A"];

        assert_eq!(exec.mode().unwrap(), Mode::Idle);
        assert_eq!(exec.tick_period(), Duration::from_millis(100));
        assert_eq!(exec.on_emit_tick().unwrap(), None);

        assert!(exec.on_new_plan(line_plan("t1", "A", 3)).unwrap());
        assert_eq!(exec.mode().unwrap(), Mode::Active);

        exec.on_emit_tick().unwrap();
        assert_eq!(xs(&rx_a.try_recv().unwrap()), vec![0.0, 1.0, 2.0]);

        exec.on_emit_tick().unwrap();
        assert_eq!(xs(&rx_a.try_recv().unwrap()), vec![1.0, 2.0]);

        exec.on_emit_tick().unwrap();
        assert_eq!(xs(&rx_a.try_recv().unwrap()), vec![2.0]);

        assert_eq!(exec.on_emit_tick().unwrap(), None);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(exec.mode().unwrap(), Mode::Idle);
    }

    #[test]
    fn test_routing_follows_plan() {
        let (mut exec, rx) = executor(&["A", "B"]);

        exec.on_new_plan(line_plan("t1", "A", 3)).unwrap();
        exec.on_emit_tick().unwrap();
        exec.on_emit_tick().unwrap();

        exec.on_new_plan(line_plan("t2", "B", 3)).unwrap();
        exec.on_emit_tick().unwrap();

        assert_eq!(rx["A"].try_iter().count(), 2);

        // Old plan never emitted again after replacement
        let b: Vec<TrajectoryPlan> = rx["B"].try_iter().collect();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].trajectory_id, "t2");
        assert_eq!(xs(&b[0]), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_empty_plan_ignored() {
        let (mut exec, rx) = executor(&["A"]);

        assert!(!exec.on_new_plan(line_plan("empty", "A", 0)).unwrap());
        assert_eq!(exec.mode().unwrap(), Mode::Idle);
        assert_eq!(exec.on_emit_tick().unwrap(), None);

        exec.on_new_plan(line_plan("t1", "A", 3)).unwrap();
        exec.on_emit_tick().unwrap();
        assert!(!exec.on_new_plan(line_plan("empty", "A", 0)).unwrap());

        exec.on_emit_tick().unwrap();
        let emitted: Vec<TrajectoryPlan> = rx["A"].try_iter().collect();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[1].trajectory_id, "t1");
        assert_eq!(xs(&emitted[1]), vec![1.0, 2.0]);
    }

    #[test]
    fn test_unknown_plugin() {
        let (mut exec, rx) = executor(&["A"]);

        exec.on_new_plan(line_plan("t1", "Z", 3)).unwrap();

        match exec.on_emit_tick() {
            Err(ExecError::UnknownPlugin { plugin, trajectory_id }) => {
                assert_eq!(plugin, "Z");
                assert_eq!(trajectory_id, "t1");
            }
            r => panic!("Expected a routing error, got {:?}", r),
        }

        assert!(rx["A"].try_recv().is_err());

        // State is not advanced by the failed tick
        assert_eq!(exec.mode().unwrap(), Mode::Active);
    }

    #[test]
    fn test_init_rejects_slow_rate() {
        struct CountingRegistry(Cell<usize>);

        impl ControlPluginRegistry for CountingRegistry {
            fn query_control_plugins(&self) -> Result<BTreeMap<String, String>, RegistryError> {
                self.0.set(self.0.get() + 1);
                Err(RegistryError::NoPlugins)
            }
        }

        let mut params: TrajExecParams = util::params::from_toml_str(PARAMS).unwrap();
        params.traj_frequency_hz = 2.0;

        let registry = CountingRegistry(Cell::new(0));
        let result = ExecContext::init(&params, &registry, |_, _| Err(PublishError::Disconnected));

        assert!(matches!(
            result,
            Err(InitError::InvalidParams(ParamsError::TickRateTooLow { .. }))
        ));
        assert_eq!(registry.0.get(), 0);
    }

    #[test]
    fn test_empty_registry_starts_nothing() {
        let params: TrajExecParams = util::params::from_toml_str(PARAMS).unwrap();
        let factory = ManualTimerFactory::new();
        let (_plan_tx, plan_rx) = channel();
        let mut opened = 0;

        let fatal = init_and_run(
            &params,
            &StaticRegistry::default(),
            |_, _| {
                opened += 1;
                Err(PublishError::Disconnected)
            },
            &factory,
            ChannelPlanSource::new(plan_rx, Duration::from_millis(5))
        );

        assert!(matches!(
            fatal,
            FatalError::Init(InitError::RegistryError(RegistryError::NoPlugins))
        ));
        assert_eq!(opened, 0);
        assert_eq!(factory.num_timers(), 0);
    }

    #[test]
    fn test_init_and_run_starts_emission_timer() {
        let params: TrajExecParams = util::params::from_toml_str(PARAMS).unwrap();
        let registry = StaticRegistry::new(
            vec![("A".to_string(), "chan_a".to_string())].into_iter().collect()
        );
        let factory = ManualTimerFactory::new();
        let (plan_tx, plan_rx) = channel();
        let (sink_tx, sink_rx) = channel();

        // The run ends when the plan names a plugin with no channel
        plan_tx.send(line_plan("t1", "Z", 2)).unwrap();

        let run_factory = factory.clone();
        let runner = thread::spawn(move || {
            init_and_run(
                &params,
                &registry,
                |_, _| Ok(Box::new(ChannelPlanSink::new(sink_tx.clone())) as Box<dyn PlanSink>),
                &run_factory,
                ChannelPlanSource::new(plan_rx, Duration::from_millis(5))
            )
        });

        assert!(wait_for(|| factory.num_timers() == 1));
        assert!(wait_for(|| {
            factory.fire(EMIT_TIMER_ID);
            factory.fire(EMIT_TIMER_ID) == 0
        }));

        assert!(matches!(
            runner.join().unwrap(),
            FatalError::Exec(ExecError::UnknownPlugin { .. })
        ));
        assert!(sink_rx.try_recv().is_err());
    }

    /// Plan source replaying a fixed sequence of results, then reporting closure.
    struct ScriptedSource {
        script: Vec<Result<Option<TrajectoryPlan>, PlanSourceError>>,
        calls: Arc<AtomicUsize>,
    }

    impl PlanSource for ScriptedSource {
        fn recv_plan(&mut self) -> Result<Option<TrajectoryPlan>, PlanSourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.script.is_empty() {
                Err(PlanSourceError::Disconnected)
            }
            else {
                self.script.remove(0)
            }
        }
    }

    #[test]
    fn test_ingestion_stops_on_socket_failure() {
        let (exec, _rx) = executor(&["A"]);
        let (ingestor, _emitter) = exec.split();
        let state = ingestor.state.clone();
        let (fatal_tx, fatal_rx) = channel();
        let calls = Arc::new(AtomicUsize::new(0));

        let source = ScriptedSource {
            script: vec![
                Err(PlanSourceError::SocketError(MonitoredSocketError::NonUtf8Message)),
                Ok(Some(line_plan("t1", "A", 2))),
                Err(PlanSourceError::SocketError(MonitoredSocketError::RecvError(
                    zmq::Error::ETERM
                ))),
                Ok(Some(line_plan("t2", "A", 2))),
            ],
            calls: calls.clone(),
        };

        // Returns instead of spinning on the dead socket
        run_ingestion(ingestor, source, Arc::new(AtomicBool::new(false)), fatal_tx);

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            state.lock().unwrap().current_plan().map(|p| p.trajectory_id.clone()),
            Some("t1".to_string())
        );
        assert!(fatal_rx.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_ingestion_never_mixes_plans() {
        let (exec, rx) = executor(&["A"]);
        let (ingestor, mut emitter) = exec.split();
        let done = Arc::new(AtomicBool::new(false));

        let ingest_done = done.clone();
        let ingest = thread::spawn(move || {
            for i in 0..500 {
                let id = format!("t{}", i);
                let mut plan = line_plan(&id, "A", 1 + i % 7);
                for p in plan.points.iter_mut() {
                    p.lane_id = Some(id.clone());
                }
                ingestor.on_new_plan(plan).unwrap();
            }
            ingest_done.store(true, Ordering::SeqCst);
        });

        while !done.load(Ordering::SeqCst) {
            emitter.on_emit_tick().unwrap();
        }
        ingest.join().unwrap();
        for _ in 0..10 {
            emitter.on_emit_tick().unwrap();
        }

        let emitted: Vec<TrajectoryPlan> = rx["A"].try_iter().collect();
        assert!(!emitted.is_empty());

        for plan in emitted.iter() {
            assert!(!plan.is_empty());
            for (i, p) in plan.points.iter().enumerate() {
                assert_eq!(p.lane_id.as_deref(), Some(plan.trajectory_id.as_str()));
                // Points are a contiguous suffix of the original plan
                assert_eq!(p.x_m, plan.points[0].x_m + i as f64);
            }
        }
    }

    #[test]
    fn test_run_until_routing_failure() {
        let (exec, rx) = executor(&["A"]);
        let rx_a = &rx["A"];
        let factory = ManualTimerFactory::new();
        let (plan_tx, plan_rx) = channel();
        let (result_tx, result_rx) = channel();

        let run_factory = factory.clone();
        let runner = thread::spawn(move || {
            let source = ChannelPlanSource::new(plan_rx, Duration::from_millis(5));
            result_tx.send(exec.run(&run_factory, source)).unwrap();
        });

        assert!(wait_for(|| factory.num_timers() == 1));
        assert_eq!(factory.period(EMIT_TIMER_ID), Some(Duration::from_millis(100)));

        // First emission once the ingestion context has installed the plan
        plan_tx.send(line_plan("t1", "A", 3)).unwrap();
        assert!(wait_for(|| {
            factory.fire(EMIT_TIMER_ID);
            rx_a.try_recv().is_ok()
        }));

        factory.fire(EMIT_TIMER_ID);
        assert_eq!(xs(&rx_a.try_recv().unwrap()), vec![1.0, 2.0]);
        factory.fire(EMIT_TIMER_ID);
        assert_eq!(xs(&rx_a.try_recv().unwrap()), vec![2.0]);
        factory.fire(EMIT_TIMER_ID);
        assert!(rx_a.try_recv().is_err());

        // A plan for an unknown plugin stops the executor
        plan_tx.send(line_plan("t2", "Z", 3)).unwrap();
        let mut fatal = None;
        assert!(wait_for(|| {
            factory.fire(EMIT_TIMER_ID);
            match result_rx.try_recv() {
                Ok(f) => {
                    fatal = Some(f);
                    true
                }
                Err(_) => false,
            }
        }));
        runner.join().unwrap();

        let fatal = fatal.unwrap();
        assert!(matches!(
            fatal,
            FatalError::Exec(ExecError::UnknownPlugin { ref plugin, .. }) if plugin == "Z"
        ));

        // Nothing published for the failed tick, and the timer is stopped
        assert!(rx_a.try_recv().is_err());
        assert_eq!(factory.fire(EMIT_TIMER_ID), 0);

        // The top level handler raises exactly one alert
        let (alert_tx, alert_rx) = channel();
        let guard = FailureGuard::new("traj_exec", Box::new(ChannelAlertSink(alert_tx)));
        guard.raise_fatal(&fatal.to_string());

        let alerts: Vec<_> = alert_rx.try_iter().collect();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Fatal);
        assert!(alerts[0].description.contains("\"Z\""));
    }
}
