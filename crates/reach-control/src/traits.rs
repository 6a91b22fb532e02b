use crate::types::{JointState, JointTrajectoryMsg, TargetCommand};
use crate::Result;
use std::time::Duration;

/// Source of per-tick joint targets, typically a policy model running its
/// forward pass in the simulation frame.
pub trait TargetSource: Send {
    fn name(&self) -> &str;

    /// Receive a new joint state snapshot. Called once per snapshot, before
    /// the next `next_target`.
    fn observe(&mut self, _state: &JointState) {}

    /// Target for the coming tick, or `None` if the source has nothing yet.
    fn next_target(&mut self, dt: Duration) -> Result<Option<TargetCommand>>;
}

/// Sink for trajectory commands.
pub trait TrajectoryPublisher: Send {
    fn publish(&mut self, msg: &JointTrajectoryMsg) -> Result<()>;
}

impl<P: TrajectoryPublisher + ?Sized> TrajectoryPublisher for Box<P> {
    fn publish(&mut self, msg: &JointTrajectoryMsg) -> Result<()> {
        (**self).publish(msg)
    }
}

/// Fan a command out to two publishers, first to second.
impl<A, B> TrajectoryPublisher for (A, B)
where
    A: TrajectoryPublisher,
    B: TrajectoryPublisher,
{
    fn publish(&mut self, msg: &JointTrajectoryMsg) -> Result<()> {
        self.0.publish(msg)?;
        self.1.publish(msg)
    }
}
