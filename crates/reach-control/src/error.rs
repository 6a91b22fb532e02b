use crate::types::Tick;
use joint_mapping::{MapFault, SpecError};
use thiserror::Error;

pub type Result<T, E = ControlError> = core::result::Result<T, E>;

/// Configuration that must be rejected before the control loop starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Joint(#[from] SpecError),
    #[error("expected {expected} controlled joints, got {got}")]
    JointCount { expected: usize, got: usize },
    #[error("joint order names unknown joint '{0}'")]
    UnknownJointInOrder(String),
    #[error("joint '{0}' appears more than once in the joint order")]
    DuplicateJointInOrder(String),
    #[error("joint order lists {got} joints, expected {expected}")]
    IncompleteJointOrder { expected: usize, got: usize },
    #[error("blend weight {0} outside [0, 1]")]
    BlendWeight(f64),
    #[error("max velocity {value} for joint '{joint}' must be finite and non-negative")]
    MaxVelocity { joint: String, value: f64 },
    #[error("max velocity {value} for joint '{joint}' cannot time a full {span} move")]
    VelocityTooLow { joint: String, value: f64, span: f64 },
    #[error("no max velocity configured for joint '{0}'")]
    MissingMaxVelocity(String),
    #[error("minimum trajectory duration {0} s outside [0, i32::MAX]")]
    MinDuration(f64),
    #[error("control period must be greater than zero")]
    ControlPeriod,
    #[error("unmapped slot {index} outside 0..{slots}")]
    UnmappedSlot { index: usize, slots: usize },
    #[error("unmapped default {0} must be finite")]
    UnmappedDefault(f64),
}

/// A tick that was aborted before producing a waypoint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthesisError {
    #[error("expected {expected} target positions (plus an optional gripper value), got {got}")]
    TargetLength { expected: usize, got: usize },
    #[error("joint '{0}' missing from current state")]
    MissingJoint(String),
    #[error("joint '{0}' has a non-finite current position")]
    NonFiniteState(String),
    #[error("waypoint duration {duration_s} s cannot be sent as a trajectory time")]
    DurationOutOfRange { duration_s: f64 },
    #[error(transparent)]
    Mapping(#[from] MapFault),
}

impl SynthesisError {
    /// Faults that a validated configuration should make impossible. Callers
    /// treat these as bugs, distinct from bad input on a single tick.
    pub fn is_invariant_fault(&self) -> bool {
        matches!(self, SynthesisError::Mapping(fault) if fault.is_invariant())
    }
}

/// Malformed controller state messages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("{names} joint names but {values} {field}")]
    LengthMismatch {
        field: &'static str,
        names: usize,
        values: usize,
    },
    #[error("duplicate joint '{0}' in state message")]
    DuplicateJoint(String),
    #[error("joint '{0}' reported a non-finite position")]
    NonFinitePosition(String),
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("tick {tick}: {source}")]
    Tick {
        tick: Tick,
        #[source]
        source: SynthesisError,
    },
    #[error("invalid state update: {0}")]
    State(#[from] StateError),
    #[error("target source error: {0}")]
    Source(String),
    #[error("publish error: {0}")]
    Publish(String),
    #[error("{0}")]
    Metrics(String),
}
