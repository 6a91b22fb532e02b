//! In-process stand-ins for the policy model, the publisher and the arm,
//! for development and testing

use crate::snapshot::StateWriter;
use crate::types::{JointState, JointTrajectoryMsg, TargetCommand, CONTROLLED_JOINTS};
use crate::{ControlError, Result, TargetSource, TrajectoryPublisher};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Task-space command the reach demo asks for: position (x, y, z) then
/// orientation quaternion (w, x, y, z).
pub const DEFAULT_TASK_COMMAND: [f64; 7] = [0.5, 0.0, 0.2, 0.7071, 0.0, 0.7071, 0.0];

/// Returns the same target every tick.
pub struct ConstantTarget {
    target: TargetCommand,
}

impl ConstantTarget {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            target: TargetCommand::new(values),
        }
    }
}

impl TargetSource for ConstantTarget {
    fn name(&self) -> &str {
        "constant"
    }

    fn next_target(&mut self, _dt: Duration) -> Result<Option<TargetCommand>> {
        Ok(Some(self.target.clone()))
    }
}

/// Mock reach policy.
///
/// Holds a task-space command but does not solve for it; instead it walks the
/// observed joint positions toward a fixed joint-space goal, at most
/// `max_step` rad per tick. Like the real model it has no output until it has
/// seen a joint state.
pub struct MockReachPolicy {
    task_command: [f64; 7],
    slot_names: Vec<String>,
    goal: Vec<f64>,
    max_step: f64,
    gripper: Option<f64>,
    observed: Option<Vec<f64>>,
}

impl MockReachPolicy {
    /// `slot_names` and `goal` are in target-array slot order.
    pub fn new(slot_names: Vec<String>, goal: Vec<f64>, max_step: f64) -> Result<Self> {
        if slot_names.len() != CONTROLLED_JOINTS || goal.len() != CONTROLLED_JOINTS {
            return Err(ControlError::Source(format!(
                "mock policy needs {CONTROLLED_JOINTS} joints and goals, got {} and {}",
                slot_names.len(),
                goal.len()
            )));
        }
        if !max_step.is_finite() || max_step <= 0.0 {
            return Err(ControlError::Source(format!(
                "mock policy step {max_step} must be positive"
            )));
        }
        Ok(Self {
            task_command: DEFAULT_TASK_COMMAND,
            slot_names,
            goal,
            max_step,
            gripper: None,
            observed: None,
        })
    }

    /// Append a gripper value, making every target 7 elements long.
    pub fn with_gripper(mut self, value: f64) -> Self {
        self.gripper = Some(value);
        self
    }

    pub fn task_command(&self) -> &[f64; 7] {
        &self.task_command
    }
}

impl TargetSource for MockReachPolicy {
    fn name(&self) -> &str {
        "mock_reach"
    }

    fn observe(&mut self, state: &JointState) {
        self.observed = state.positions_for(&self.slot_names);
        if self.observed.is_none() {
            tracing::debug!("mock policy: state does not cover all joints");
        }
    }

    fn next_target(&mut self, _dt: Duration) -> Result<Option<TargetCommand>> {
        let Some(current) = &self.observed else {
            return Ok(None);
        };
        let mut values: Vec<f64> = current
            .iter()
            .zip(&self.goal)
            .map(|(c, g)| c + (g - c).clamp(-self.max_step, self.max_step))
            .collect();
        if let Some(gripper) = self.gripper {
            values.push(gripper);
        }
        Ok(Some(TargetCommand::new(values)))
    }
}

/// Keeps every published message; clones share the same buffer.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    sent: Arc<Mutex<Vec<JointTrajectoryMsg>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<JointTrajectoryMsg> {
        self.sent.lock().clone()
    }

    pub fn last(&self) -> Option<JointTrajectoryMsg> {
        self.sent.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

impl TrajectoryPublisher for RecordingPublisher {
    fn publish(&mut self, msg: &JointTrajectoryMsg) -> Result<()> {
        self.sent.lock().push(msg.clone());
        Ok(())
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    msg: &'a JointTrajectoryMsg,
}

/// Writes each command as one line of JSON, tagged with its topic.
pub struct JsonLinesPublisher<W: Write + Send> {
    topic: String,
    out: W,
}

impl<W: Write + Send> JsonLinesPublisher<W> {
    pub fn new(topic: impl Into<String>, out: W) -> Self {
        Self {
            topic: topic.into(),
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> TrajectoryPublisher for JsonLinesPublisher<W> {
    fn publish(&mut self, msg: &JointTrajectoryMsg) -> Result<()> {
        let line = Envelope {
            topic: &self.topic,
            msg,
        };
        serde_json::to_writer(&mut self.out, &line)
            .map_err(|e| ControlError::Publish(e.to_string()))?;
        self.out
            .write_all(b"\n")
            .and_then(|_| self.out.flush())
            .map_err(|e| ControlError::Publish(e.to_string()))
    }
}

/// Arm that reaches every commanded point instantly and reports its new
/// state through a [`StateWriter`].
pub struct SimulatedArm {
    positions: HashMap<String, f64>,
    writer: StateWriter,
}

impl SimulatedArm {
    pub fn new(joints: &[String], initial: f64, writer: StateWriter) -> Self {
        Self {
            positions: joints.iter().map(|j| (j.clone(), initial)).collect(),
            writer,
        }
    }

    /// Push the current positions as a fresh state update.
    pub fn report(&self) -> u64 {
        self.writer
            .replace(JointState::from_positions(self.positions.clone()))
    }

    pub fn position(&self, joint: &str) -> Option<f64> {
        self.positions.get(joint).copied()
    }
}

impl TrajectoryPublisher for SimulatedArm {
    fn publish(&mut self, msg: &JointTrajectoryMsg) -> Result<()> {
        let Some(point) = msg.points.last() else {
            return Ok(());
        };
        if point.positions.len() != msg.joint_names.len() {
            return Err(ControlError::Publish(format!(
                "{} positions for {} joints",
                point.positions.len(),
                msg.joint_names.len()
            )));
        }
        let dt = point.time_from_start.as_secs_f64();
        let mut velocities = Vec::with_capacity(msg.joint_names.len());
        for (name, &target) in msg.joint_names.iter().zip(&point.positions) {
            let previous = self.positions.insert(name.clone(), target).unwrap_or(target);
            let velocity = if dt > 0.0 { (target - previous) / dt } else { 0.0 };
            velocities.push((name.clone(), velocity));
        }
        self.writer.replace(
            JointState::from_positions(self.positions.clone()).with_velocities(velocities),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::state_snapshot;
    use crate::types::{TrajectoryDuration, TrajectoryPoint};

    fn slots() -> Vec<String> {
        (0..6).map(|i| format!("j{i}")).collect()
    }

    #[test]
    fn test_mock_policy_waits_for_state() {
        let mut policy = MockReachPolicy::new(slots(), vec![1.0; 6], 0.1).unwrap();
        assert_eq!(policy.task_command(), &DEFAULT_TASK_COMMAND);
        assert!(policy
            .next_target(Duration::from_millis(10))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_mock_policy_steps_toward_goal() {
        let mut policy = MockReachPolicy::new(slots(), vec![1.0, -1.0, 0.05, 0.0, 0.0, 0.0], 0.1)
            .unwrap()
            .with_gripper(0.5);
        let state = JointState::from_positions(slots().into_iter().map(|j| (j, 0.0)));
        policy.observe(&state);
        let target = policy
            .next_target(Duration::from_millis(10))
            .unwrap()
            .unwrap();
        assert_eq!(target.as_slice(), &[0.1, -0.1, 0.05, 0.0, 0.0, 0.0, 0.5]);
        assert_eq!(target.gripper(), Some(0.5));
    }

    #[test]
    fn test_mock_policy_rejects_bad_setup() {
        assert!(MockReachPolicy::new(slots(), vec![0.0; 5], 0.1).is_err());
        assert!(MockReachPolicy::new(slots(), vec![0.0; 6], 0.0).is_err());
    }

    #[test]
    fn test_mock_policy_partial_state() {
        let mut policy = MockReachPolicy::new(slots(), vec![0.0; 6], 0.1).unwrap();
        policy.observe(&JointState::from_positions([("j0", 0.0)]));
        assert!(policy
            .next_target(Duration::from_millis(10))
            .unwrap()
            .is_none());
    }

    fn msg(positions: Vec<f64>, secs: f64) -> JointTrajectoryMsg {
        JointTrajectoryMsg {
            joint_names: vec!["a".into(), "b".into()],
            points: vec![TrajectoryPoint {
                positions,
                time_from_start: TrajectoryDuration::from_secs_f64(secs).unwrap(),
            }],
        }
    }

    #[test]
    fn test_recording_publisher_shares_buffer() {
        let recorder = RecordingPublisher::new();
        let mut handle = recorder.clone();
        handle.publish(&msg(vec![0.0, 1.0], 0.5)).unwrap();
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.last().unwrap().points[0].positions, vec![0.0, 1.0]);
    }

    #[test]
    fn test_json_lines_publisher() {
        let mut publisher = JsonLinesPublisher::new("/cmd", Vec::new());
        publisher.publish(&msg(vec![0.25, -0.5], 1.5)).unwrap();
        publisher.publish(&msg(vec![0.0, 0.0], 0.0)).unwrap();
        let out = String::from_utf8(publisher.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["topic"], "/cmd");
        assert_eq!(first["msg"]["points"][0]["time_from_start"]["sec"], 1);
        assert_eq!(
            first["msg"]["points"][0]["time_from_start"]["nanosec"],
            500_000_000
        );
    }

    #[test]
    fn test_simulated_arm_reports_state() {
        let (writer, reader) = state_snapshot();
        let mut arm = SimulatedArm::new(&["a".to_string(), "b".to_string()], 0.0, writer);
        assert_eq!(arm.report(), 1);
        arm.publish(&msg(vec![0.5, -0.25], 0.5)).unwrap();
        let update = reader.load().unwrap();
        assert_eq!(update.seq, 2);
        assert_eq!(update.state.position("a"), Some(0.5));
        assert_eq!(update.state.velocity("a"), Some(1.0));
        assert_eq!(update.state.velocity("b"), Some(-0.5));
        assert_eq!(arm.position("b"), Some(-0.25));
    }

    #[test]
    fn test_tee_publisher() {
        let first = RecordingPublisher::new();
        let second = RecordingPublisher::new();
        let mut tee = (first.clone(), second.clone());
        tee.publish(&msg(vec![0.0, 0.0], 0.0)).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }
}
