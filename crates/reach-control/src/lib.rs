//! reach-control: trajectory commands for a reach policy on a 6-axis arm
//!
//! Every control tick takes the most recent joint state and the policy's raw
//! target, maps the target into actuator units joint by joint, blends it with
//! the current position, and times the move by the slowest joint. The result
//! is one single-point trajectory command addressed to the arm's joint
//! trajectory controller.

mod error;
pub use error::{ConfigError, ControlError, Result, StateError, SynthesisError};

mod types;
pub use types::{
    ControllerStateMsg, JointState, JointTrajectoryMsg, TargetCommand, Tick, TrajectoryDuration,
    TrajectoryPoint, Waypoint, CONTROLLED_JOINTS,
};

mod config;
pub use config::{
    load_config_file, load_config_str, ReachConfig, Topics, VelocityLimits,
    DEFAULT_COMMAND_TOPIC, DEFAULT_STATE_TOPIC,
};

mod traits;
pub use traits::{TargetSource, TrajectoryPublisher};

mod synth;
pub use synth::{CommandSynthesizer, MappedTarget, SkipReason, Synthesis, TickOutput};

mod snapshot;
pub use snapshot::{state_snapshot, StateReader, StateUpdate, StateWriter};

mod metrics;
pub use metrics::ControlMetrics;

mod control;
pub use control::{ControlLoop, LoopOptions, LoopSummary, TickReport};

#[cfg(feature = "mock")]
pub mod mock;

/// Build a synthesizer from a validated configuration and log what it drives.
pub fn init(config: &ReachConfig) -> Result<CommandSynthesizer> {
    let synthesizer = CommandSynthesizer::from_config(config)?;
    for spec in synthesizer.mapper().specs() {
        tracing::debug!(
            slot = spec.index,
            joint = %spec.name,
            source_deg = ?(spec.source.lower_deg, spec.source.upper_deg),
            inverted = spec.source.inverted,
            destination = ?(spec.destination.lower, spec.destination.upper),
            "joint mapping"
        );
    }
    tracing::info!(
        joints = ?synthesizer.joint_order(),
        blend_weight = synthesizer.blend_weight(),
        period_ms = config.control_period_ms,
        command_topic = %config.topics.command,
        "reach control initialized"
    );
    Ok(synthesizer)
}
