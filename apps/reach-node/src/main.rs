use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::{info, warn};

use reach_control::mock::{JsonLinesPublisher, MockReachPolicy, SimulatedArm};
use reach_control::{load_config_file, state_snapshot, ControlLoop, LoopOptions, ReachConfig};

/// UR home pose in target-array slot order (pan, lift, elbow, wrist 1-3).
const UR_HOME: [f64; 6] = [0.0, -1.57, 1.57, -1.57, -1.57, 0.0];

#[derive(Parser, Debug)]
#[command(name = "reach-node", version)]
#[command(about = "Reach policy control loop: one trajectory command per tick")]
struct Args {
    /// YAML reach configuration (defaults to the built-in UR configuration)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many ticks instead of waiting for Ctrl-C
    #[arg(long)]
    ticks: Option<u64>,

    /// Keep running after an invariant fault
    #[arg(long, action = ArgAction::SetTrue)]
    fail_quietly: bool,

    /// Log every published waypoint
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Print the effective configuration as YAML and exit
    #[arg(long, action = ArgAction::SetTrue)]
    print_config: bool,

    /// Print control metrics on exit
    #[arg(long, action = ArgAction::SetTrue)]
    metrics: bool,

    /// Largest per-tick joint step of the mock policy, in radians
    #[arg(long, default_value_t = 0.05)]
    max_step: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => load_config_file(path)?,
        None => ReachConfig::ur_reach(),
    };
    if args.print_config {
        print!("{}", serde_yaml::to_string(&config).context("serializing config")?);
        return Ok(());
    }

    info!("reach-node starting");
    let synthesizer = reach_control::init(&config)?;

    let (writer, reader) = state_snapshot();
    let arm = SimulatedArm::new(&config.joint_order, 0.0, writer);
    arm.report();

    let policy = MockReachPolicy::new(config.slot_names(), UR_HOME.to_vec(), args.max_step)?;
    info!(task = ?policy.task_command(), "mock reach policy ready");

    let stdout = JsonLinesPublisher::new(config.topics.command.clone(), std::io::stdout());
    let mut control = ControlLoop::new(
        synthesizer,
        policy,
        (stdout, arm),
        reader,
        config.control_period(),
        LoopOptions {
            fail_quietly: args.fail_quietly,
            verbose: args.verbose,
        },
    )?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    let summary = control.run(args.ticks, shutdown).await?;

    info!(
        "done: {} ticks, {} published, {} skipped, {} failed, {} clipped targets",
        summary.ticks, summary.published, summary.skipped, summary.failed, summary.clipped
    );
    if args.metrics {
        eprint!("{}", control.metrics().encode_text());
    }
    Ok(())
}

fn setup_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
