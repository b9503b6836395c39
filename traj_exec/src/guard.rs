//! # Failure Guard
//!
//! Single exit path for unrecoverable conditions. A fatal alert is broadcast to the rest of the
//! system and the process is terminated. There is no degraded mode.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    alert::SystemAlert,
    net::{zmq, MonitoredSocket, SocketOptions},
};
use log::{error, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    thread,
    time::Duration,
};

use crate::dispatch::PublishError;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Exit status of the process after a fatal error.
pub const FATAL_EXIT_CODE: i32 = -1;

/// Time given to the zmq I/O thread to transmit the alert before the process exits.
const ALERT_FLUSH_DELAY: Duration = Duration::from_millis(200);

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Channel on which system alerts are broadcast.
pub trait AlertSink: Send {
    fn send_alert(&mut self, alert: &SystemAlert) -> Result<(), PublishError>;

    /// Block until sent alerts have left the process, if the sink buffers them.
    fn flush(&mut self) {}
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct FailureGuard {
    /// Name reported as the source of alerts
    source: String,

    sink: Mutex<Box<dyn AlertSink>>,

    /// Set once the fatal alert has been sent
    raised: AtomicBool,
}

/// Publisher on the system alert channel.
pub struct ZmqAlertPublisher {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FailureGuard {
    pub fn new(source: &str, sink: Box<dyn AlertSink>) -> Self {
        Self {
            source: source.into(),
            sink: Mutex::new(sink),
            raised: AtomicBool::new(false),
        }
    }

    /// Broadcast a fatal alert with the given reason.
    ///
    /// Only the first call sends an alert, later calls only log. Returns `true` if this call sent
    /// the alert.
    pub fn raise_fatal(&self, reason: &str) -> bool {
        if self.raised.swap(true, Ordering::SeqCst) {
            warn!("Fatal alert already raised, suppressing: {}", reason);
            return false;
        }

        error!("FATAL: {}", reason);

        let alert = SystemAlert::fatal(&self.source, reason);

        // Send even if another context panicked while holding the sink
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());

        if let Err(e) = sink.send_alert(&alert) {
            error!("Could not publish the fatal alert: {}", e);
        }
        sink.flush();

        true
    }

    /// Raise a fatal alert and terminate the process.
    pub fn shutdown(&self, reason: &str) -> ! {
        self.raise_fatal(reason);

        error!("Shutting down");
        util::logger::logger_flush();

        std::process::exit(FATAL_EXIT_CODE)
    }

    pub fn has_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

impl ZmqAlertPublisher {
    /// Bind the alert publisher to `endpoint`.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, PublishError> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, endpoint)?;

        Ok(Self { socket })
    }
}

impl AlertSink for ZmqAlertPublisher {
    fn send_alert(&mut self, alert: &SystemAlert) -> Result<(), PublishError> {
        Ok(self.socket.send_json(alert)?)
    }

    fn flush(&mut self) {
        thread::sleep(ALERT_FLUSH_DELAY);
    }
}
