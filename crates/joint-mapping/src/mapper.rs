use crate::{JointSpec, MapFault, SpecError};
use std::collections::HashMap;

/// Slack allowed on the destination postcondition, relative to the range span.
/// Covers float rounding of the rescale only.
const RANGE_EPSILON: f64 = 1e-12;

/// Outcome of mapping one joint angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mapped {
    /// The request was inside the source range
    InRange(f64),
    /// The request was outside the source range and was clipped to `bound_deg`
    Clipped {
        value: f64,
        requested_deg: f64,
        bound_deg: f64,
    },
}

impl Mapped {
    pub fn value(&self) -> f64 {
        match *self {
            Mapped::InRange(v) => v,
            Mapped::Clipped { value, .. } => value,
        }
    }

    pub fn is_clipped(&self) -> bool {
        matches!(self, Mapped::Clipped { .. })
    }
}

/// Check a set of joint declarations for anything that would make mapping
/// undefined: degenerate or reversed ranges, duplicate names, slot collisions.
/// Slots must cover `0..specs.len()` exactly once.
pub fn validate_specs(specs: &[JointSpec]) -> Result<(), SpecError> {
    if specs.is_empty() {
        return Err(SpecError::Empty);
    }
    let slots = specs.len();
    let mut names: HashMap<&str, usize> = HashMap::new();
    let mut by_slot: Vec<Option<&str>> = vec![None; slots];

    for spec in specs {
        let src = &spec.source;
        let dst = &spec.destination;
        let bounds = [src.lower_deg, src.upper_deg, dst.lower, dst.upper];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(SpecError::NonFiniteBound(spec.name.clone()));
        }
        if src.lower_deg == src.upper_deg {
            return Err(SpecError::DegenerateSourceRange {
                joint: spec.name.clone(),
                bound_deg: src.lower_deg,
            });
        }
        if src.lower_deg > src.upper_deg {
            return Err(SpecError::ReversedSourceRange {
                joint: spec.name.clone(),
                lower_deg: src.lower_deg,
                upper_deg: src.upper_deg,
            });
        }
        if dst.lower > dst.upper {
            return Err(SpecError::ReversedDestinationRange {
                joint: spec.name.clone(),
                lower: dst.lower,
                upper: dst.upper,
            });
        }
        if names.insert(spec.name.as_str(), spec.index).is_some() {
            return Err(SpecError::DuplicateName(spec.name.clone()));
        }
        match by_slot.get_mut(spec.index) {
            None => {
                return Err(SpecError::IndexOutOfRange {
                    joint: spec.name.clone(),
                    index: spec.index,
                    slots,
                })
            }
            Some(Some(first)) => {
                return Err(SpecError::DuplicateIndex {
                    index: spec.index,
                    first: first.to_string(),
                    second: spec.name.clone(),
                })
            }
            Some(slot) => *slot = Some(spec.name.as_str()),
        }
    }
    Ok(())
}

/// Validated joint table, addressed by target-array slot.
#[derive(Debug, Clone)]
pub struct AngleMapper {
    specs: Vec<JointSpec>,
}

impl AngleMapper {
    pub fn new(specs: impl IntoIterator<Item = JointSpec>) -> Result<Self, SpecError> {
        let mut specs: Vec<JointSpec> = specs.into_iter().collect();
        validate_specs(&specs)?;
        specs.sort_by_key(|s| s.index);
        Ok(Self { specs })
    }

    pub fn slots(&self) -> usize {
        self.specs.len()
    }

    /// Specs ordered by slot
    pub fn specs(&self) -> &[JointSpec] {
        &self.specs
    }

    pub fn spec(&self, index: usize) -> Option<&JointSpec> {
        self.specs.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.specs.iter().find(|s| s.name == name).map(|s| s.index)
    }

    /// Map a simulation-frame position (radians) for the joint in `index`.
    ///
    /// Requests outside the declared source range are clipped to the nearest
    /// bound and logged; the result says which case applied. A value that ends
    /// up outside the destination range is returned as
    /// [`MapFault::OutOfDestinationRange`].
    pub fn map(&self, position: f64, index: usize) -> Result<Mapped, MapFault> {
        let spec = self.specs.get(index).ok_or(MapFault::UnknownSlot {
            index,
            slots: self.specs.len(),
        })?;
        map_joint(spec, position)
    }
}

fn map_joint(spec: &JointSpec, position: f64) -> Result<Mapped, MapFault> {
    let (lower, upper) = (spec.source.lower_deg, spec.source.upper_deg);
    let (a, b) = (spec.destination.lower, spec.destination.upper);

    if !position.is_finite() {
        return Err(MapFault::NonFinite {
            joint: spec.name.clone(),
            position,
        });
    }
    // may overflow to +-inf for huge inputs; that still clips to a bound
    let requested_deg = position.to_degrees();

    let clipped_to = if requested_deg < lower {
        Some(lower)
    } else if requested_deg > upper {
        Some(upper)
    } else {
        None
    };
    let angle_deg = clipped_to.unwrap_or(requested_deg);
    if let Some(bound) = clipped_to {
        tracing::warn!(
            joint = %spec.name,
            index = spec.index,
            angle_deg = requested_deg,
            lower,
            upper,
            "joint angle out of range, clipping to {bound}"
        );
    }

    // source bounds land exactly on destination bounds
    let scaled = if angle_deg == lower {
        a
    } else if angle_deg == upper {
        b
    } else {
        (angle_deg - lower) * (b - a) / (upper - lower) + a
    };
    let mapped = match (spec.source.inverted, scaled) {
        (false, _) => scaled,
        (true, v) if v == a => b,
        (true, v) if v == b => a,
        (true, v) => (b - a) - (v - a) + a,
    };

    let slack = RANGE_EPSILON * (b - a).max(1.0);
    if !(a - slack..=b + slack).contains(&mapped) {
        return Err(MapFault::OutOfDestinationRange {
            joint: spec.name.clone(),
            mapped,
            lower: a,
            upper: b,
        });
    }
    let value = mapped.clamp(a, b);

    Ok(match clipped_to {
        None => Mapped::InRange(value),
        Some(bound_deg) => Mapped::Clipped {
            value,
            requested_deg,
            bound_deg,
        },
    })
}
