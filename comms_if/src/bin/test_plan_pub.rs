//! Planner stand-in which publishes a new trajectory plan periodically
//!
//! Each plan is a straight line along the x axis starting where the previous plan started plus
//! one metre, so pre-emption of one plan by the next is visible downstream.

use chrono::Utc;
use comms_if::{
    net::{zmq, MonitoredSocket, SocketOptions},
    traj::{TrajectoryPlan, TrajectoryPoint},
};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "test_plan_pub", about = "Publish demo trajectory plans")]
struct Opt {
    /// Endpoint to bind the plan publisher to
    #[structopt(long, default_value = "tcp://*:6000")]
    endpoint: String,

    /// Name of the control plugin the plans are destined for
    #[structopt(long, default_value = "PurePursuit")]
    plugin: String,

    /// Number of points in each plan
    #[structopt(long, default_value = "10")]
    num_points: usize,

    /// Time between plans in milliseconds
    #[structopt(long, default_value = "2000")]
    period_ms: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let ctx = zmq::Context::new();

    let socket_options = SocketOptions {
        bind: true,
        block_on_first_connect: false,
        linger: 0,
        send_timeout: 10,
        ..Default::default()
    };

    let socket = MonitoredSocket::new(&ctx, zmq::PUB, socket_options, &opt.endpoint)?;

    println!("Plan publisher open on {}", opt.endpoint);

    let mut seq = 0usize;

    loop {
        let plan = TrajectoryPlan {
            trajectory_id: format!("demo_{}", seq),
            stamp: Utc::now(),
            frame_id: "map".into(),
            controller_plugin: opt.plugin.clone(),
            points: (0..opt.num_points)
                .map(|i| TrajectoryPoint {
                    target_time_s: i as f64 * 0.1,
                    x_m: seq as f64 + i as f64 * 0.1,
                    y_m: 0.0,
                    yaw_rad: 0.0,
                    speed_ms: 1.0,
                    lane_id: None,
                })
                .collect(),
        };

        match socket.send_json(&plan) {
            Ok(_) => println!("Sent {} ({} points)", plan.trajectory_id, plan.len()),
            Err(e) => println!("Failed to send {}: {}", plan.trajectory_id, e),
        }

        seq += 1;

        std::thread::sleep(std::time::Duration::from_millis(opt.period_ms));
    }
}
