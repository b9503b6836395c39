//! Control plugin stand-in which prints every trajectory plan it recieves

use comms_if::{
    net::{zmq, MonitoredSocket, SocketOptions},
    traj::TrajectoryPlan,
};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "test_plan_sub", about = "Print trajectory plans sent to a control plugin")]
struct Opt {
    /// Endpoint of the executor's publisher for this plugin
    #[structopt(long, default_value = "tcp://localhost:6001")]
    endpoint: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let ctx = zmq::Context::new();

    let socket_options = SocketOptions {
        block_on_first_connect: false,
        ..Default::default()
    };

    let socket = MonitoredSocket::new(&ctx, zmq::SUB, socket_options, &opt.endpoint)?;
    socket.set_subscribe(b"")?;

    println!("Listening for plans on {}", opt.endpoint);

    loop {
        match socket.recv_json::<TrajectoryPlan>() {
            Ok(Some(plan)) => println!(
                "{}: {} points, first at x = {:?}",
                plan.trajectory_id,
                plan.len(),
                plan.points.first().map(|p| p.x_m)
            ),
            Ok(None) => (),
            Err(e) => println!("Bad plan: {}", e),
        }
    }
}
