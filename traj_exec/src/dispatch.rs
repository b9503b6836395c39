//! # Plugin Dispatch Table
//!
//! Maps the name of each control plugin to the output channel its plans are published on. The
//! table is built once from the registry at startup and never changes afterwards.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    traj::TrajectoryPlan,
};
use log::{debug, info};
use std::{collections::BTreeMap, sync::mpsc::Sender};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// An output channel which plans can be published on.
///
/// Publishing is fire-and-forget, implementations must not block indefinitely.
pub trait PlanSink: Send {
    fn publish(&mut self, plan: &TrajectoryPlan) -> Result<(), PublishError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Immutable map of control plugin name to output channel.
pub struct DispatchTable {
    entries: BTreeMap<String, Box<dyn PlanSink>>,
}

/// A sink which forwards plans into an in-process channel.
#[derive(Clone)]
pub struct ChannelPlanSink {
    sender: Sender<TrajectoryPlan>,
}

/// Publisher of plans for a single control plugin.
pub struct ZmqPlanPublisher {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("The recieving end of the channel has been dropped")]
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No control plugins were provided")]
    NoPlugins,

    #[error("Could not open the channel for plugin {plugin} at {endpoint}: {source}")]
    OpenFailed {
        plugin: String,
        endpoint: String,
        source: PublishError,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DispatchTable {
    /// Build the table, opening one channel per plugin with `open_sink(name, endpoint)`.
    ///
    /// Fails if `plugins` is empty or any channel cannot be opened.
    pub fn build<F>(
        plugins: &BTreeMap<String, String>,
        mut open_sink: F
    ) -> Result<Self, DispatchError>
    where
        F: FnMut(&str, &str) -> Result<Box<dyn PlanSink>, PublishError>
    {
        if plugins.is_empty() {
            return Err(DispatchError::NoPlugins);
        }

        let mut entries = BTreeMap::new();

        for (name, endpoint) in plugins {
            let sink = open_sink(name, endpoint).map_err(|e| DispatchError::OpenFailed {
                plugin: name.clone(),
                endpoint: endpoint.clone(),
                source: e,
            })?;

            info!("    {} -> {}", name, endpoint);
            entries.insert(name.clone(), sink);
        }

        debug!("Dispatch table built with {} entries", entries.len());

        Ok(Self { entries })
    }

    /// Find the channel for the given plugin.
    pub fn lookup(&mut self, plugin: &str) -> Option<&mut (dyn PlanSink + 'static)> {
        self.entries.get_mut(plugin).map(|s| s.as_mut())
    }

    pub fn contains(&self, plugin: &str) -> bool {
        self.entries.contains_key(plugin)
    }

    pub fn plugins(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }
}

impl ChannelPlanSink {
    pub fn new(sender: Sender<TrajectoryPlan>) -> Self {
        Self { sender }
    }
}

impl PlanSink for ChannelPlanSink {
    fn publish(&mut self, plan: &TrajectoryPlan) -> Result<(), PublishError> {
        self.sender
            .send(plan.clone())
            .map_err(|_| PublishError::Disconnected)
    }
}

impl ZmqPlanPublisher {
    /// Bind a plan publisher to `endpoint`.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, PublishError> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            linger: 0,
            send_timeout: 0,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, endpoint)?;

        Ok(Self { socket })
    }
}

impl PlanSink for ZmqPlanPublisher {
    fn publish(&mut self, plan: &TrajectoryPlan) -> Result<(), PublishError> {
        Ok(self.socket.send_json(plan)?)
    }
}
