use crate::error::{StateError, SynthesisError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use time::OffsetDateTime;

/// Number of arm joints commanded every tick.
pub const CONTROLLED_JOINTS: usize = 6;

/// Index of a control tick, owned by the loop and passed down explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick(pub u64);

impl Tick {
    pub fn next(self) -> Self {
        Tick(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Controller state as it arrives from the arm driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerStateMsg {
    pub joint_names: Vec<String>,
    pub positions: Vec<f64>,
    #[serde(default)]
    pub velocities: Vec<f64>,
}

/// Latest known joint positions (and velocities) by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointState {
    positions: HashMap<String, f64>,
    velocities: HashMap<String, f64>,
    received_at: Option<OffsetDateTime>,
}

impl JointState {
    pub fn from_positions<I, S>(positions: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            positions: positions.into_iter().map(|(n, p)| (n.into(), p)).collect(),
            velocities: HashMap::new(),
            received_at: None,
        }
    }

    /// Build a state from a controller message. Velocities are optional but,
    /// when present, must line up with the names.
    pub fn from_message(msg: &ControllerStateMsg) -> Result<Self, StateError> {
        if msg.positions.len() != msg.joint_names.len() {
            return Err(StateError::LengthMismatch {
                field: "positions",
                names: msg.joint_names.len(),
                values: msg.positions.len(),
            });
        }
        if !msg.velocities.is_empty() && msg.velocities.len() != msg.joint_names.len() {
            return Err(StateError::LengthMismatch {
                field: "velocities",
                names: msg.joint_names.len(),
                values: msg.velocities.len(),
            });
        }

        let mut positions = HashMap::with_capacity(msg.joint_names.len());
        for (name, &pos) in msg.joint_names.iter().zip(&msg.positions) {
            if !pos.is_finite() {
                return Err(StateError::NonFinitePosition(name.clone()));
            }
            if positions.insert(name.clone(), pos).is_some() {
                return Err(StateError::DuplicateJoint(name.clone()));
            }
        }
        let velocities = msg
            .joint_names
            .iter()
            .cloned()
            .zip(msg.velocities.iter().copied())
            .collect();

        Ok(Self {
            positions,
            velocities,
            received_at: Some(OffsetDateTime::now_utc()),
        })
    }

    pub fn with_velocities<I, S>(mut self, velocities: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.velocities = velocities.into_iter().map(|(n, v)| (n.into(), v)).collect();
        self
    }

    pub fn position(&self, joint: &str) -> Option<f64> {
        self.positions.get(joint).copied()
    }

    pub fn velocity(&self, joint: &str) -> Option<f64> {
        self.velocities.get(joint).copied()
    }

    /// Positions for `joints` in that order, or `None` if any is missing.
    pub fn positions_for(&self, joints: &[String]) -> Option<Vec<f64>> {
        joints.iter().map(|j| self.position(j)).collect()
    }

    pub fn received_at(&self) -> Option<OffsetDateTime> {
        self.received_at
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Raw target positions from the policy for one tick, in simulation radians.
/// Six arm joints, optionally followed by a gripper value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCommand {
    values: Vec<f64>,
}

impl TargetCommand {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// The arm-joint part of the command, with a trailing gripper value dropped.
    pub fn arm_joints(&self) -> Result<&[f64], SynthesisError> {
        match self.values.len() {
            CONTROLLED_JOINTS => Ok(&self.values),
            n if n == CONTROLLED_JOINTS + 1 => Ok(&self.values[..CONTROLLED_JOINTS]),
            got => Err(SynthesisError::TargetLength {
                expected: CONTROLLED_JOINTS,
                got,
            }),
        }
    }

    pub fn gripper(&self) -> Option<f64> {
        if self.values.len() == CONTROLLED_JOINTS + 1 {
            self.values.last().copied()
        } else {
            None
        }
    }
}

/// Longest waypoint duration the controller message can carry, in seconds.
pub const MAX_TRAJECTORY_SECS: f64 = i32::MAX as f64;

/// Time offset of a trajectory point, split the way the controller expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryDuration {
    pub sec: i32,
    pub nanosec: u32,
}

impl TrajectoryDuration {
    /// Whole seconds truncated toward zero, remainder truncated to nanoseconds.
    /// `None` for negative or non-finite input and for whole seconds beyond
    /// `i32::MAX`.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        if !(0.0..MAX_TRAJECTORY_SECS + 1.0).contains(&secs) {
            return None;
        }
        let whole = secs.trunc();
        let nanosec = ((secs - whole) * 1e9) as u32;
        Some(Self {
            sec: whole as i32,
            nanosec: nanosec.min(999_999_999),
        })
    }

    pub fn as_secs_f64(&self) -> f64 {
        f64::from(self.sec) + f64::from(self.nanosec) / 1e9
    }
}

/// One commanded point: blended positions in publish order and the time the
/// slowest joint needs to reach them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waypoint {
    positions: Vec<f64>,
    duration_s: f64,
    time_from_start: TrajectoryDuration,
}

impl Waypoint {
    /// `None` if `duration_s` has no [`TrajectoryDuration`] representation.
    pub(crate) fn new(positions: Vec<f64>, duration_s: f64) -> Option<Self> {
        let time_from_start = TrajectoryDuration::from_secs_f64(duration_s)?;
        Some(Self {
            positions,
            duration_s,
            time_from_start,
        })
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    pub fn time_from_start(&self) -> TrajectoryDuration {
        self.time_from_start
    }

    pub fn to_message(&self, joint_names: &[String]) -> JointTrajectoryMsg {
        JointTrajectoryMsg {
            joint_names: joint_names.to_vec(),
            points: vec![TrajectoryPoint {
                positions: self.positions.clone(),
                time_from_start: self.time_from_start,
            }],
        }
    }
}

/// Trajectory command addressed to the joint trajectory controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointTrajectoryMsg {
    pub joint_names: Vec<String>,
    pub points: Vec<TrajectoryPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub positions: Vec<f64>,
    pub time_from_start: TrajectoryDuration,
}
