//! # Logger
//!
//! Records go to stdout with coloured level tags and to the session log file as plain text. Every
//! line carries the session-relative time and the name of the thread that logged it, so records
//! from the plan ingestion and emission threads can be told apart.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::Colorize;
use log::{self, info, Record};
use std::fmt::Display;
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Targets which are capped at `Info` whatever the minimum level.
const QUIET_TARGETS: &[&str] = &["zmq"];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Logging below `INFO` cannot be disabled, found a minimum level of `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Could not open the session log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("A logger has already been installed: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// `min_level` must be at least `log::Level::Info`. Must only be called once per process.
pub fn logger_init(
    min_level: LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            let tag = colour_tag(record.level());
            out.finish(format_args!("{}", format_record(record, tag, message)))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            let tag = level_tag(record.level());
            out.finish(format_args!("{}", format_record(record, tag, message)))
        })
        .chain(log_file);

    let mut dispatch = fern::Dispatch::new().level(min_level);
    for target in QUIET_TARGETS {
        dispatch = dispatch.level_for(*target, LevelFilter::Info);
    }

    dispatch
        .chain(console)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

/// Flush any buffered log records, used before the process terminates.
pub fn logger_flush() {
    log::logger().flush();
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn format_record<T: Display, M: Display>(record: &Record, tag: T, message: M) -> String {
    let current = std::thread::current();

    // Targets only matter when chasing debug output
    let target = if record.level() > log::Level::Info {
        Some(record.target())
    }
    else {
        None
    };

    format_line(
        session::get_elapsed_seconds(),
        tag,
        current.name().unwrap_or("unnamed"),
        target,
        message
    )
}

fn format_line<T: Display, M: Display>(
    elapsed_s: f64,
    tag: T,
    thread_name: &str,
    target: Option<&str>,
    message: M
) -> String {
    match target {
        Some(t) => format!("[{:10.6} {} {}] {}: {}", elapsed_s, tag, thread_name, t, message),
        None => format!("[{:10.6} {} {}] {}", elapsed_s, tag, thread_name, message),
    }
}

/// Three letter tag for a log level
fn level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Trace => "TRC",
        log::Level::Debug => "DBG",
        log::Level::Info  => "INF",
        log::Level::Warn  => "WRN",
        log::Level::Error => "ERR"
    }
}

fn colour_tag(level: log::Level) -> colored::ColoredString {
    let tag = level_tag(level);

    match level {
        log::Level::Trace => tag.dimmed().italic(),
        log::Level::Debug => tag.dimmed(),
        log::Level::Info  => tag.normal(),
        log::Level::Warn  => tag.yellow(),
        log::Level::Error => tag.red().bold()
    }
}
