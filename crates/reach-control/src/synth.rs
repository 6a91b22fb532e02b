//! Per-tick command synthesis: map, blend, time, and assemble one waypoint.

use crate::config::ReachConfig;
use crate::error::{ConfigError, SynthesisError};
use crate::types::{JointState, TargetCommand, Tick, Waypoint, CONTROLLED_JOINTS};
use joint_mapping::AngleMapper;

/// Why a tick produced no waypoint. Both are expected while warming up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoJointState,
    NoTarget,
}

/// Targets after angle mapping, indexed by slot.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedTarget {
    pub positions: [f64; CONTROLLED_JOINTS],
    /// Number of slots clipped to their source range this tick
    pub clipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub waypoint: Waypoint,
    pub clipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutput {
    Command(Synthesis),
    Skipped(SkipReason),
}

#[derive(Debug, Clone)]
struct JointPlan {
    name: String,
    slot: usize,
    max_velocity: f64,
}

/// Turns the latest joint state and a raw policy target into one waypoint.
///
/// Holds only validated configuration; every call is independent.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    mapper: AngleMapper,
    joint_order: Vec<String>,
    plan: Vec<JointPlan>,
    unmapped: [bool; CONTROLLED_JOINTS],
    unmapped_default: f64,
    blend_weight: f64,
    min_duration_s: f64,
}

impl CommandSynthesizer {
    pub fn from_config(config: &ReachConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mapper = AngleMapper::new(config.joints.iter().cloned())?;

        let mut plan = Vec::with_capacity(config.joint_order.len());
        for name in &config.joint_order {
            let slot = mapper
                .index_of(name)
                .ok_or_else(|| ConfigError::UnknownJointInOrder(name.clone()))?;
            let max_velocity = config
                .max_velocity
                .for_joint(name)
                .ok_or_else(|| ConfigError::MissingMaxVelocity(name.clone()))?;
            plan.push(JointPlan {
                name: name.clone(),
                slot,
                max_velocity,
            });
        }

        let mut unmapped = [false; CONTROLLED_JOINTS];
        for &index in &config.unmapped_indices {
            if let Some(flag) = unmapped.get_mut(index) {
                *flag = true;
            }
        }

        Ok(Self {
            mapper,
            joint_order: config.joint_order.clone(),
            plan,
            unmapped,
            unmapped_default: config.unmapped_default,
            blend_weight: config.blend_weight,
            min_duration_s: config.min_trajectory_duration_s,
        })
    }

    pub fn joint_order(&self) -> &[String] {
        &self.joint_order
    }

    pub fn mapper(&self) -> &AngleMapper {
        &self.mapper
    }

    pub fn blend_weight(&self) -> f64 {
        self.blend_weight
    }

    /// Map every arm slot of `target` to actuator units. Unmapped slots are
    /// left at the configured neutral value.
    pub fn map_target(&self, target: &TargetCommand) -> Result<MappedTarget, SynthesisError> {
        let raw = target.arm_joints()?;
        let mut positions = [self.unmapped_default; CONTROLLED_JOINTS];
        let mut clipped = 0;
        for (slot, &value) in raw.iter().enumerate() {
            if self.unmapped[slot] {
                continue;
            }
            let mapped = self.mapper.map(value, slot)?;
            if mapped.is_clipped() {
                clipped += 1;
            }
            positions[slot] = mapped.value();
        }
        Ok(MappedTarget { positions, clipped })
    }

    /// Produce this tick's waypoint.
    ///
    /// Without a joint state or a target the tick is skipped, whatever the
    /// target contains. Otherwise the duration is the slowest joint's time to
    /// cover its blended move at its velocity limit, never below the floor.
    /// A duration the trajectory message cannot carry aborts the tick.
    pub fn synthesize(
        &self,
        tick: Tick,
        current: Option<&JointState>,
        target: Option<&TargetCommand>,
    ) -> Result<TickOutput, SynthesisError> {
        let Some(current) = current else {
            return Ok(TickOutput::Skipped(SkipReason::NoJointState));
        };
        let Some(target) = target else {
            return Ok(TickOutput::Skipped(SkipReason::NoTarget));
        };

        let mapped = self.map_target(target)?;
        let w = self.blend_weight;

        let mut positions = Vec::with_capacity(self.plan.len());
        let mut duration_s: f64 = 0.0;
        for joint in &self.plan {
            let pos = current
                .position(&joint.name)
                .ok_or_else(|| SynthesisError::MissingJoint(joint.name.clone()))?;
            if !pos.is_finite() {
                return Err(SynthesisError::NonFiniteState(joint.name.clone()));
            }
            let cmd = pos * (1.0 - w) + mapped.positions[joint.slot] * w;
            let joint_duration = joint_duration(cmd - pos, joint.max_velocity, self.min_duration_s);
            duration_s = duration_s.max(joint_duration);
            positions.push(cmd);
        }

        let waypoint = Waypoint::new(positions, duration_s)
            .ok_or(SynthesisError::DurationOutOfRange { duration_s })?;
        tracing::trace!(%tick, duration_s, clipped = mapped.clipped, "waypoint synthesized");
        Ok(TickOutput::Command(Synthesis {
            waypoint,
            clipped: mapped.clipped,
        }))
    }
}

/// Time for one joint to move `delta` at `max_velocity`, floored. A zero
/// velocity limit falls back to the floor.
fn joint_duration(delta: f64, max_velocity: f64, floor: f64) -> f64 {
    let duration = if max_velocity > 0.0 {
        delta.abs() / max_velocity
    } else {
        floor
    };
    duration.max(floor)
}
