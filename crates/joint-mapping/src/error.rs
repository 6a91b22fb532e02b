use thiserror::Error;

/// Joint declarations that can never be mapped. Raised while validating
/// configuration, before any control tick runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    #[error("no joints configured")]
    Empty,
    #[error("joint '{0}' has a non-finite range bound")]
    NonFiniteBound(String),
    #[error("joint '{joint}' has a degenerate source range at {bound_deg} deg")]
    DegenerateSourceRange { joint: String, bound_deg: f64 },
    #[error("joint '{joint}' source range is reversed: [{lower_deg}, {upper_deg}] deg")]
    ReversedSourceRange {
        joint: String,
        lower_deg: f64,
        upper_deg: f64,
    },
    #[error("joint '{joint}' destination range is reversed: [{lower}, {upper}]")]
    ReversedDestinationRange {
        joint: String,
        lower: f64,
        upper: f64,
    },
    #[error("duplicate joint name: {0}")]
    DuplicateName(String),
    #[error("joints '{first}' and '{second}' share slot {index}")]
    DuplicateIndex {
        index: usize,
        first: String,
        second: String,
    },
    #[error("joint '{joint}' uses slot {index} but only {slots} slots exist")]
    IndexOutOfRange {
        joint: String,
        index: usize,
        slots: usize,
    },
}

/// A mapping request that could not produce an actuator value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapFault {
    #[error("no joint spec for slot {index} ({slots} configured)")]
    UnknownSlot { index: usize, slots: usize },
    #[error("joint '{joint}' received non-finite position {position}")]
    NonFinite { joint: String, position: f64 },
    #[error("joint '{joint}' mapped to {mapped} outside destination range [{lower}, {upper}]")]
    OutOfDestinationRange {
        joint: String,
        mapped: f64,
        lower: f64,
        upper: f64,
    },
}

impl MapFault {
    /// True for faults that cannot happen with a validated configuration and
    /// therefore point at a bug rather than at bad input.
    pub fn is_invariant(&self) -> bool {
        matches!(
            self,
            MapFault::UnknownSlot { .. } | MapFault::OutOfDestinationRange { .. }
        )
    }
}
