//! joint-mapping: joint angle conversion between the policy and the actuators
//!
//! A policy model reasons about joints in its simulation frame (radians, with
//! per-joint limits declared in degrees). The controller on the arm has its own
//! range and sign convention. This crate holds the per-joint declarations and
//! the pure mapping between the two, clipping out-of-range requests instead of
//! rejecting them.

mod types;
pub use types::{DestinationRange, JointSpec, SourceRange};

mod error;
pub use error::{MapFault, SpecError};

mod mapper;
pub use mapper::{validate_specs, AngleMapper, Mapped};
