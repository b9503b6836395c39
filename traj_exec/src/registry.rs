//! # Control Plugin Registry
//!
//! Discovery of the control plugins which can recieve trajectory plans. The registry is queried
//! exactly once, during initialisation.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{timeout_sockopt, zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    registry::{RegistryRequest, RegistryResponse},
};
use log::debug;
use std::collections::BTreeMap;

use crate::params::RegistryParams;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of control plugin registrations.
pub trait ControlPluginRegistry {
    /// Get the map of control plugin name to the endpoint of its plan input.
    ///
    /// An empty result is reported as [`RegistryError::NoPlugins`].
    fn query_control_plugins(&self) -> Result<BTreeMap<String, String>, RegistryError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Registry backed by a fixed map, usually read from the parameter file.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    plugins: BTreeMap<String, String>,
}

/// Client of the remote registry service.
pub struct ZmqRegistryClient {
    socket: MonitoredSocket,
    timeout_ms: u32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("The registry did not respond within {0} ms")]
    Unreachable(u32),

    #[error("The registry rejected the query: {0}")]
    Rejected(String),

    #[error("The registry returned no control plugins")]
    NoPlugins,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StaticRegistry {
    pub fn new(plugins: BTreeMap<String, String>) -> Self {
        Self { plugins }
    }
}

impl ControlPluginRegistry for StaticRegistry {
    fn query_control_plugins(&self) -> Result<BTreeMap<String, String>, RegistryError> {
        non_empty(self.plugins.clone())
    }
}

impl ZmqRegistryClient {
    /// Create a new client of the registry at `endpoint`.
    ///
    /// This function will not block until the server connects, a registry which is not running
    /// is only detected when it is queried.
    pub fn new(
        ctx: &zmq::Context,
        endpoint: &str,
        timeout_ms: u32
    ) -> Result<Self, RegistryError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: timeout_sockopt(timeout_ms),
            linger: 0,
            recv_timeout: timeout_sockopt(timeout_ms),
            send_timeout: timeout_sockopt(timeout_ms),
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REQ, socket_options, endpoint)?;

        Ok(Self { socket, timeout_ms })
    }
}

impl ControlPluginRegistry for ZmqRegistryClient {
    fn query_control_plugins(&self) -> Result<BTreeMap<String, String>, RegistryError> {
        debug!("Querying control plugin registry at {}", self.socket.endpoint());

        match self.socket.send_json(&RegistryRequest::GetControlPlugins) {
            Ok(()) => (),
            Err(MonitoredSocketError::SendError(zmq::Error::EAGAIN)) => {
                return Err(RegistryError::Unreachable(self.timeout_ms))
            }
            Err(e) => return Err(e.into()),
        }

        match self.socket.recv_json::<RegistryResponse>()? {
            Some(RegistryResponse::ControlPlugins(plugins)) => non_empty(plugins),
            Some(RegistryResponse::Error(reason)) => Err(RegistryError::Rejected(reason)),
            None => Err(RegistryError::Unreachable(self.timeout_ms)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create the registry described by the parameters.
pub fn from_params(
    ctx: &zmq::Context,
    params: &RegistryParams
) -> Result<Box<dyn ControlPluginRegistry>, RegistryError> {
    match params {
        RegistryParams::Remote { endpoint, timeout_ms } => {
            Ok(Box::new(ZmqRegistryClient::new(ctx, endpoint, *timeout_ms)?))
        }
        RegistryParams::Static { plugins } => Ok(Box::new(StaticRegistry::new(plugins.clone()))),
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn non_empty(plugins: BTreeMap<String, String>) -> Result<BTreeMap<String, String>, RegistryError> {
    if plugins.is_empty() {
        Err(RegistryError::NoPlugins)
    }
    else {
        Ok(plugins)
    }
}
