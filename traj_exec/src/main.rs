//! # Trajectory Executor Executable
//!
//! Recieves trajectory plans from the planner and repeatedly publishes the unconsumed part of the
//! active plan to the control plugin it is destined for, so that the controller always tracks
//! the freshest remaining path.
//!
//! Any unrecoverable error raises a fatal system alert and terminates the process.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use comms_if::net::zmq;
use log::info;
use structopt::StructOpt;

// Internal
use traj_lib::{
    dispatch::{PlanSink, ZmqPlanPublisher},
    executor,
    guard::{AlertSink, FailureGuard, ZmqAlertPublisher},
    params::TrajExecParams,
    plan_source::ZmqPlanSubscriber,
    registry,
    timer::ThreadTimerFactory,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Name of this node, used for the session directory and as the source of system alerts.
const NODE_NAME: &str = "traj_exec";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(StructOpt)]
#[structopt(name = "traj_exec", about = "Trajectory Executor")]
struct Opt {
    /// Parameter file, relative to the params directory of the software root
    #[structopt(default_value = "traj_exec.toml")]
    params_file: String,

    /// Log every emission tick
    #[structopt(short, long)]
    verbose: bool,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new(NODE_NAME, "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    let log_level = if opt.verbose {
        LevelFilter::Trace
    }
    else {
        LevelFilter::Debug
    };
    logger_init(log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Trajectory Executor\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let params: TrajExecParams = util::params::load(&opt.params_file)
        .wrap_err("Could not load the parameters")?;

    info!("Parameters loaded from {}", opt.params_file);

    // ---- FAILURE GUARD ----

    let zmq_ctx = zmq::Context::new();

    let alert_sink: Box<dyn AlertSink> = Box::new(
        ZmqAlertPublisher::new(&zmq_ctx, &params.system_alert_endpoint)
            .wrap_err("Failed to open the system alert publisher")?
    );
    let guard = FailureGuard::new(NODE_NAME, alert_sink);

    info!("System alerts published on {}", params.system_alert_endpoint);

    // From here on every failure goes through the guard

    // ---- EXECUTOR INITIALISATION ----

    let registry = match registry::from_params(&zmq_ctx, &params.registry) {
        Ok(r) => r,
        Err(e) => guard.shutdown(&format!("Could not create the registry client: {}", e)),
    };

    let source = match ZmqPlanSubscriber::new(
        &zmq_ctx,
        &params.plan_endpoint,
        params.plan_recv_timeout_ms
    ) {
        Ok(s) => s,
        Err(e) => guard.shutdown(&format!("Could not subscribe to plans: {}", e)),
    };

    info!("Subscribed to plans from {}", params.plan_endpoint);

    // ---- MAIN LOOP ----

    info!("Initialising the executor");

    let fatal = executor::init_and_run(
        &params,
        registry.as_ref(),
        |_, endpoint| {
            Ok(Box::new(ZmqPlanPublisher::new(&zmq_ctx, endpoint)?) as Box<dyn PlanSink>)
        },
        &ThreadTimerFactory,
        source
    );

    guard.shutdown(&fatal.to_string())
}
