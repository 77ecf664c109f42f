//! Reactor Core Simulator - Main Entry Point
//!
//! Headless host: drives a session at a fixed frame interval and prints
//! snapshots as JSON lines.

use clap::{Parser, ValueEnum};
use reactor_sim_lib::{
    ControlMode, ControlPolicy, PhysicalConstants, ReactorSession, ReactorState, SessionConfig,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Manual,
    Automatic,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Threshold,
    FixedTarget,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Simulated duration [s]
    #[arg(long, default_value_t = 100.0)]
    duration: f64,

    /// Host frame interval fed to each tick [s]
    #[arg(long, default_value_t = 1.0 / 60.0)]
    frame_interval: f64,

    /// Power setpoint [MW]
    #[arg(long, default_value_t = 2000.0)]
    target_power: f64,

    /// Initial rod insertion [%]
    #[arg(long, default_value_t = 50.0)]
    rod: f64,

    #[arg(long, value_enum, default_value_t = ModeArg::Automatic)]
    mode: ModeArg,

    #[arg(long, value_enum, default_value_t = PolicyArg::Threshold)]
    policy: PolicyArg,

    /// Simulated seconds per real second
    #[arg(long, default_value_t = 1.0)]
    time_speed: f64,

    /// Print a snapshot every N simulated seconds
    #[arg(long, default_value_t = 1.0)]
    report_every: f64,

    /// SCRAM the reactor at this simulated time [s]
    #[arg(long)]
    scram_at: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    if !(args.frame_interval > 0.0) || !(args.report_every > 0.0) {
        anyhow::bail!("--frame-interval and --report-every must be positive");
    }

    let constants = PhysicalConstants {
        target_power: args.target_power,
        ..PhysicalConstants::default()
    };
    let config = SessionConfig {
        initial_mode: match args.mode {
            ModeArg::Manual => ControlMode::Manual,
            ModeArg::Automatic => ControlMode::Automatic,
        },
        policy: match args.policy {
            PolicyArg::Threshold => ControlPolicy::default(),
            PolicyArg::FixedTarget => ControlPolicy::FixedTarget,
        },
        time_speed: args.time_speed,
        ..SessionConfig::default()
    };

    let mut session =
        ReactorSession::with_config(constants, ReactorState::default(), args.rod, config)?;

    println!("{}", serde_json::to_string(&session.snapshot())?);

    let mut next_report = args.report_every;
    while session.state().elapsed_time < args.duration {
        if let Some(at) = args.scram_at {
            if !session.is_scram_active() && session.state().elapsed_time >= at {
                session.scram();
            }
        }

        session.tick(args.frame_interval)?;

        if session.state().elapsed_time >= next_report {
            println!("{}", serde_json::to_string(&session.snapshot())?);
            next_report += args.report_every;
        }
    }

    Ok(())
}
