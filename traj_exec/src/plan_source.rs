//! # Plan Sources
//!
//! Inbound trajectory plans from the planner.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{timeout_sockopt, zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    traj::TrajectoryPlan,
};
use std::{
    sync::mpsc::{Receiver, RecvTimeoutError},
    time::Duration,
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Recieves plans from the planner.
pub trait PlanSource: Send {
    /// Wait a bounded time for the next plan.
    ///
    /// `Ok(None)` means no plan arrived in time and the caller should try again.
    fn recv_plan(&mut self) -> Result<Option<TrajectoryPlan>, PlanSourceError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Plans from an in-process channel.
pub struct ChannelPlanSource {
    receiver: Receiver<TrajectoryPlan>,
    timeout: Duration,
}

/// Subscriber to the planner's plan publisher.
pub struct ZmqPlanSubscriber {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlanSourceError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    /// The source will never produce another plan
    #[error("The plan source has been closed")]
    Disconnected,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PlanSourceError {
    /// Whether only the current message was lost and the source can still produce plans.
    pub fn is_transient(&self) -> bool {
        match self {
            PlanSourceError::SocketError(e) => matches!(
                e,
                MonitoredSocketError::NonUtf8Message
                    | MonitoredSocketError::DeserializationError(_)
                    | MonitoredSocketError::RecvError(zmq::Error::EINTR)
                    | MonitoredSocketError::RecvError(zmq::Error::EAGAIN)
            ),
            PlanSourceError::Disconnected => false,
        }
    }
}

impl ChannelPlanSource {
    pub fn new(receiver: Receiver<TrajectoryPlan>, timeout: Duration) -> Self {
        Self { receiver, timeout }
    }
}

impl PlanSource for ChannelPlanSource {
    fn recv_plan(&mut self) -> Result<Option<TrajectoryPlan>, PlanSourceError> {
        match self.receiver.recv_timeout(self.timeout) {
            Ok(plan) => Ok(Some(plan)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(PlanSourceError::Disconnected),
        }
    }
}

impl ZmqPlanSubscriber {
    /// Subscribe to plans published at `endpoint`.
    ///
    /// This function will not block until the planner connects.
    pub fn new(
        ctx: &zmq::Context,
        endpoint: &str,
        recv_timeout_ms: u32
    ) -> Result<Self, PlanSourceError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            linger: 0,
            recv_timeout: timeout_sockopt(recv_timeout_ms),
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::SUB, socket_options, endpoint)?;

        socket
            .set_subscribe(b"")
            .map_err(|e| MonitoredSocketError::SocketOptionError("set_subscribe".into(), e))?;

        Ok(Self { socket })
    }
}

impl PlanSource for ZmqPlanSubscriber {
    fn recv_plan(&mut self) -> Result<Option<TrajectoryPlan>, PlanSourceError> {
        Ok(self.socket.recv_json()?)
    }
}
