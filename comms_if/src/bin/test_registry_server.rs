//! Control plugin registry stand-in
//!
//! Answers every `GetControlPlugins` request with the plugins given on the command line as
//! `name=endpoint` pairs.

use comms_if::{
    net::{zmq, MonitoredSocket, SocketOptions},
    registry::{RegistryRequest, RegistryResponse},
};
use std::collections::BTreeMap;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "test_registry_server", about = "Serve a fixed control plugin registry")]
struct Opt {
    /// Endpoint to bind the registry to
    #[structopt(long, default_value = "tcp://*:6020")]
    endpoint: String,

    /// Plugins to advertise, as `name=endpoint`
    #[structopt(parse(try_from_str = parse_plugin))]
    plugins: Vec<(String, String)>,
}

fn parse_plugin(s: &str) -> Result<(String, String), String> {
    let mut parts = s.splitn(2, '=');
    match (parts.next(), parts.next()) {
        (Some(name), Some(endpoint)) if !name.is_empty() && !endpoint.is_empty() => {
            Ok((name.into(), endpoint.into()))
        }
        _ => Err(format!("Expected `name=endpoint`, found `{}`", s)),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let plugins: BTreeMap<String, String> = opt.plugins.into_iter().collect();

    let ctx = zmq::Context::new();

    let socket_options = SocketOptions {
        bind: true,
        block_on_first_connect: false,
        ..Default::default()
    };

    let socket = MonitoredSocket::new(&ctx, zmq::REP, socket_options, &opt.endpoint)?;

    println!("Registry open on {} with {} plugins", opt.endpoint, plugins.len());

    loop {
        let response = match socket.recv_json::<RegistryRequest>() {
            Ok(Some(RegistryRequest::GetControlPlugins)) => {
                RegistryResponse::ControlPlugins(plugins.clone())
            }
            Ok(None) => continue,
            Err(e) => RegistryResponse::Error(e.to_string()),
        };

        socket.send_json(&response)?;
    }
}
