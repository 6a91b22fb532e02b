use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Joint limits in the policy's simulation frame, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceRange {
    pub lower_deg: f64,
    pub upper_deg: f64,
    /// Reflect the mapped value within the destination range
    #[serde(default)]
    pub inverted: bool,
}

impl SourceRange {
    pub fn new(lower_deg: f64, upper_deg: f64) -> Self {
        Self {
            lower_deg,
            upper_deg,
            inverted: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }
}

/// Joint limits in actuator units (radians for the UR controllers).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DestinationRange {
    pub lower: f64,
    pub upper: f64,
}

impl DestinationRange {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn span(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Declaration of one controlled joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    /// Controller-side joint name, unique per arm
    pub name: String,
    /// Position of this joint in the policy's target array
    pub index: usize,
    pub source: SourceRange,
    pub destination: DestinationRange,
}

impl JointSpec {
    pub fn new(
        name: impl Into<String>,
        index: usize,
        source: SourceRange,
        destination: DestinationRange,
    ) -> Self {
        Self {
            name: name.into(),
            index,
            source,
            destination,
        }
    }

    /// Full-turn joint: +/-360 deg in simulation onto +/-2pi rad on the actuator.
    pub fn full_turn(name: impl Into<String>, index: usize) -> Self {
        Self::new(
            name,
            index,
            SourceRange::new(-360.0, 360.0),
            DestinationRange::new(-2.0 * PI, 2.0 * PI),
        )
    }
}
