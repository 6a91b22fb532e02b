use crate::error::ConfigError;
use crate::types::{CONTROLLED_JOINTS, MAX_TRAJECTORY_SECS};
use anyhow::Context;
use joint_mapping::{validate_specs, JointSpec};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_STATE_TOPIC: &str = "/scaled_joint_trajectory_controller/state";
pub const DEFAULT_COMMAND_TOPIC: &str = "/scaled_joint_trajectory_controller/joint_trajectory";

/// Velocity limit used to derive waypoint durations, in actuator units per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VelocityLimits {
    Global(f64),
    PerJoint(BTreeMap<String, f64>),
}

impl Default for VelocityLimits {
    fn default() -> Self {
        VelocityLimits::Global(0.7)
    }
}

impl VelocityLimits {
    pub fn for_joint(&self, joint: &str) -> Option<f64> {
        match self {
            VelocityLimits::Global(v) => Some(*v),
            VelocityLimits::PerJoint(map) => map.get(joint).copied(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topics {
    pub state: String,
    pub command: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            state: DEFAULT_STATE_TOPIC.to_string(),
            command: DEFAULT_COMMAND_TOPIC.to_string(),
        }
    }
}

/// Everything the reach controller needs to turn policy targets into
/// trajectory commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachConfig {
    /// One entry per controlled joint; `index` is its slot in the target array
    pub joints: Vec<JointSpec>,
    /// Joint names in the order the trajectory controller expects them
    pub joint_order: Vec<String>,
    #[serde(default = "default_control_period_ms")]
    pub control_period_ms: u64,
    /// Weight of the target in `current * (1 - w) + target * w`
    #[serde(default = "default_blend_weight")]
    pub blend_weight: f64,
    #[serde(default)]
    pub max_velocity: VelocityLimits,
    #[serde(default)]
    pub min_trajectory_duration_s: f64,
    /// Slots that are not mapped and are commanded at `unmapped_default`
    #[serde(default = "default_unmapped_indices")]
    pub unmapped_indices: Vec<usize>,
    #[serde(default)]
    pub unmapped_default: f64,
    #[serde(default)]
    pub topics: Topics,
}

fn default_control_period_ms() -> u64 {
    10
}

fn default_blend_weight() -> f64 {
    1.0
}

fn default_unmapped_indices() -> Vec<usize> {
    vec![5]
}

impl ReachConfig {
    /// Deployed configuration for a UR arm behind the scaled joint trajectory
    /// controller, driven at 100 Hz.
    pub fn ur_reach() -> Self {
        let joints = [
            ("shoulder_pan_joint", 0),
            ("shoulder_lift_joint", 1),
            ("elbow_joint", 2),
            ("wrist_1_joint", 3),
            ("wrist_2_joint", 4),
            ("wrist_3_joint", 5),
        ]
        .into_iter()
        .map(|(name, index)| JointSpec::full_turn(name, index))
        .collect();

        let joint_order = [
            "elbow_joint",
            "shoulder_lift_joint",
            "shoulder_pan_joint",
            "wrist_1_joint",
            "wrist_2_joint",
            "wrist_3_joint",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            joints,
            joint_order,
            control_period_ms: default_control_period_ms(),
            blend_weight: default_blend_weight(),
            max_velocity: VelocityLimits::default(),
            min_trajectory_duration_s: 0.0,
            unmapped_indices: default_unmapped_indices(),
            unmapped_default: 0.0,
            topics: Topics::default(),
        }
    }

    pub fn control_period(&self) -> Duration {
        Duration::from_millis(self.control_period_ms)
    }

    /// Joint names ordered by target-array slot.
    pub fn slot_names(&self) -> Vec<String> {
        let mut joints: Vec<&JointSpec> = self.joints.iter().collect();
        joints.sort_by_key(|j| j.index);
        joints.into_iter().map(|j| j.name.clone()).collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.joints.len() != CONTROLLED_JOINTS {
            return Err(ConfigError::JointCount {
                expected: CONTROLLED_JOINTS,
                got: self.joints.len(),
            });
        }
        validate_specs(&self.joints)?;

        let known: HashSet<&str> = self.joints.iter().map(|j| j.name.as_str()).collect();
        let mut seen = HashSet::new();
        for name in &self.joint_order {
            if !known.contains(name.as_str()) {
                return Err(ConfigError::UnknownJointInOrder(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateJointInOrder(name.clone()));
            }
        }
        if self.joint_order.len() != self.joints.len() {
            return Err(ConfigError::IncompleteJointOrder {
                expected: self.joints.len(),
                got: self.joint_order.len(),
            });
        }

        if self.control_period_ms == 0 {
            return Err(ConfigError::ControlPeriod);
        }
        if !(0.0..=1.0).contains(&self.blend_weight) {
            return Err(ConfigError::BlendWeight(self.blend_weight));
        }
        for joint in &self.joints {
            let name = &joint.name;
            let value = self
                .max_velocity
                .for_joint(name)
                .ok_or_else(|| ConfigError::MissingMaxVelocity(name.clone()))?;
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::MaxVelocity {
                    joint: name.clone(),
                    value,
                });
            }
            // zero means "use the floor"; anything else must time a full-range move
            let span = joint.destination.span();
            let full_move_s = span / value;
            if value > 0.0 && (!full_move_s.is_finite() || full_move_s > MAX_TRAJECTORY_SECS) {
                return Err(ConfigError::VelocityTooLow {
                    joint: name.clone(),
                    value,
                    span,
                });
            }
        }
        let floor = self.min_trajectory_duration_s;
        if !(0.0..=MAX_TRAJECTORY_SECS).contains(&floor) {
            return Err(ConfigError::MinDuration(floor));
        }
        if let Some(&index) = self
            .unmapped_indices
            .iter()
            .find(|&&i| i >= CONTROLLED_JOINTS)
        {
            return Err(ConfigError::UnmappedSlot {
                index,
                slots: CONTROLLED_JOINTS,
            });
        }
        if !self.unmapped_default.is_finite() {
            return Err(ConfigError::UnmappedDefault(self.unmapped_default));
        }
        Ok(())
    }
}

impl Default for ReachConfig {
    fn default() -> Self {
        Self::ur_reach()
    }
}

/// Parse and validate a YAML reach configuration.
pub fn load_config_str(raw: &str) -> anyhow::Result<ReachConfig> {
    let config: ReachConfig = serde_yaml::from_str(raw).context("parsing reach config")?;
    config.validate().context("validating reach config")?;
    Ok(config)
}

pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<ReachConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading reach config: {}", path.display()))?;
    load_config_str(&raw).with_context(|| format!("loading {}", path.display()))
}
