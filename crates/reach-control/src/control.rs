//! Periodic control loop: one synthesis per tick against the latest snapshot.

use crate::error::{ControlError, Result, SynthesisError};
use crate::metrics::ControlMetrics;
use crate::snapshot::StateReader;
use crate::synth::{CommandSynthesizer, SkipReason, TickOutput};
use crate::types::{Tick, TrajectoryDuration};
use crate::{TargetSource, TrajectoryPublisher};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, Default)]
pub struct LoopOptions {
    /// Log and count invariant faults instead of stopping the loop
    pub fail_quietly: bool,
    /// Log every published waypoint at info level
    pub verbose: bool,
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickReport {
    Published {
        time_from_start: TrajectoryDuration,
        clipped: usize,
    },
    Skipped(SkipReason),
    /// The tick was aborted; the loop keeps running
    Failed(ControlError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub published: u64,
    pub skipped: u64,
    pub failed: u64,
    pub clipped: u64,
}

impl LoopSummary {
    pub fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        match report {
            TickReport::Published { clipped, .. } => {
                self.published += 1;
                self.clipped += *clipped as u64;
            }
            TickReport::Skipped(_) => self.skipped += 1,
            TickReport::Failed(_) => self.failed += 1,
        }
    }
}

pub struct ControlLoop<S, P> {
    synthesizer: CommandSynthesizer,
    source: S,
    publisher: P,
    state: StateReader,
    period: Duration,
    options: LoopOptions,
    metrics: ControlMetrics,
    last_seq: Option<u64>,
}

impl<S, P> ControlLoop<S, P>
where
    S: TargetSource,
    P: TrajectoryPublisher,
{
    pub fn new(
        synthesizer: CommandSynthesizer,
        source: S,
        publisher: P,
        state: StateReader,
        period: Duration,
        options: LoopOptions,
    ) -> Result<Self> {
        if period.is_zero() {
            return Err(ControlError::Config(crate::ConfigError::ControlPeriod));
        }
        let metrics = ControlMetrics::new().map_err(ControlError::Metrics)?;
        Ok(Self {
            synthesizer,
            source,
            publisher,
            state,
            period,
            options,
            metrics,
            last_seq: None,
        })
    }

    pub fn metrics(&self) -> &ControlMetrics {
        &self.metrics
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run one control cycle.
    ///
    /// Only an invariant fault with `fail_quietly` unset is returned as `Err`;
    /// every other failure is reported in the [`TickReport`] and the caller
    /// keeps scheduling.
    pub fn tick(&mut self, tick: Tick) -> Result<TickReport> {
        let span = tracing::debug_span!("tick", tick = tick.0);
        let _enter = span.enter();
        self.metrics.ticks.inc();

        let snapshot = self.state.load();
        if let Some(update) = &snapshot {
            if self.last_seq != Some(update.seq) {
                self.source.observe(&update.state);
                self.last_seq = Some(update.seq);
            }
        }

        let target = match self.source.next_target(self.period) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(source = self.source.name(), "target source failed: {e}");
                self.metrics.tick_errors.inc();
                return Ok(TickReport::Failed(e));
            }
        };

        let current = snapshot.as_deref().map(|u| &u.state);
        match self.synthesizer.synthesize(tick, current, target.as_ref()) {
            Ok(TickOutput::Skipped(reason)) => {
                tracing::debug!(?reason, "no command this tick");
                self.metrics.ticks_skipped.inc();
                Ok(TickReport::Skipped(reason))
            }
            Ok(TickOutput::Command(synthesis)) => {
                let msg = synthesis
                    .waypoint
                    .to_message(self.synthesizer.joint_order());
                if let Err(e) = self.publisher.publish(&msg) {
                    tracing::warn!("publish failed: {e}");
                    self.metrics.tick_errors.inc();
                    return Ok(TickReport::Failed(e));
                }
                let duration_s = synthesis.waypoint.duration_s();
                if self.options.verbose {
                    tracing::info!(
                        duration_s,
                        positions = ?synthesis.waypoint.positions(),
                        "published waypoint"
                    );
                } else {
                    tracing::debug!(duration_s, "published waypoint");
                }
                self.metrics.waypoints_published.inc();
                self.metrics.clipped_targets.inc_by(synthesis.clipped as u64);
                self.metrics.last_duration_s.set(duration_s);
                Ok(TickReport::Published {
                    time_from_start: synthesis.waypoint.time_from_start(),
                    clipped: synthesis.clipped,
                })
            }
            Err(source) => self.fail(tick, source),
        }
    }

    fn fail(&mut self, tick: Tick, source: SynthesisError) -> Result<TickReport> {
        self.metrics.tick_errors.inc();
        let invariant = source.is_invariant_fault();
        let err = ControlError::Tick { tick, source };
        if invariant {
            tracing::error!("invariant fault: {err}");
            if !self.options.fail_quietly {
                return Err(err);
            }
        } else {
            tracing::warn!("tick aborted: {err}");
        }
        Ok(TickReport::Failed(err))
    }

    /// Tick on a fixed period until `max_ticks` have run or `shutdown`
    /// resolves. Late ticks are dropped rather than bunched up.
    pub async fn run<F>(&mut self, max_ticks: Option<u64>, shutdown: F) -> Result<LoopSummary>
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(
            period_ms = self.period.as_millis() as u64,
            source = self.source.name(),
            "control loop started"
        );
        let mut summary = LoopSummary::default();
        let mut tick = Tick::default();
        loop {
            if max_ticks.is_some_and(|max| summary.ticks >= max) {
                break;
            }
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                _ = interval.tick() => {}
            }
            let report = self.tick(tick)?;
            summary.record(&report);
            tick = tick.next();
        }
        tracing::info!(
            ticks = summary.ticks,
            published = summary.published,
            skipped = summary.skipped,
            failed = summary.failed,
            "control loop stopped"
        );
        Ok(summary)
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::config::ReachConfig;
    use crate::mock::{ConstantTarget, RecordingPublisher};
    use crate::snapshot::state_snapshot;
    use crate::types::JointState;
    use joint_mapping::MapFault;

    fn ur_state(value: f64) -> JointState {
        JointState::from_positions(
            ReachConfig::ur_reach()
                .joint_order
                .into_iter()
                .map(|n| (n, value)),
        )
    }

    fn control(
        target: Vec<f64>,
    ) -> (
        ControlLoop<ConstantTarget, RecordingPublisher>,
        crate::snapshot::StateWriter,
        RecordingPublisher,
    ) {
        let config = ReachConfig::ur_reach();
        let synth = CommandSynthesizer::from_config(&config).unwrap();
        let (writer, reader) = state_snapshot();
        let recorder = RecordingPublisher::new();
        let control = ControlLoop::new(
            synth,
            ConstantTarget::new(target),
            recorder.clone(),
            reader,
            config.control_period(),
            LoopOptions::default(),
        )
        .unwrap();
        (control, writer, recorder)
    }

    #[test]
    fn test_skips_until_state_arrives() {
        let (mut control, writer, recorder) = control(vec![0.1; 6]);
        let report = control.tick(Tick(0)).unwrap();
        assert!(matches!(report, TickReport::Skipped(SkipReason::NoJointState)));
        assert!(recorder.is_empty());

        writer.replace(ur_state(0.0));
        let report = control.tick(Tick(1)).unwrap();
        assert!(matches!(report, TickReport::Published { .. }));
        let msg = recorder.last().unwrap();
        assert_eq!(msg.joint_names[0], "elbow_joint");
        assert_eq!(control.metrics().ticks.get(), 2);
        assert_eq!(control.metrics().ticks_skipped.get(), 1);
        assert_eq!(control.metrics().waypoints_published.get(), 1);
    }

    #[test]
    fn test_bad_target_fails_tick_only() {
        let (mut control, writer, recorder) = control(vec![0.1; 4]);
        writer.replace(ur_state(0.0));
        for i in 0..3 {
            let report = control.tick(Tick(i)).unwrap();
            match report {
                TickReport::Failed(ControlError::Tick { tick, source }) => {
                    assert_eq!(tick, Tick(i));
                    assert!(matches!(source, SynthesisError::TargetLength { got: 4, .. }));
                }
                other => panic!("unexpected report {other:?}"),
            }
        }
        assert!(recorder.is_empty());
        assert_eq!(control.metrics().tick_errors.get(), 3);
    }

    fn out_of_range_fault() -> SynthesisError {
        SynthesisError::Mapping(MapFault::OutOfDestinationRange {
            joint: "elbow_joint".into(),
            mapped: 7.0,
            lower: -6.28,
            upper: 6.28,
        })
    }

    #[test]
    fn test_invariant_fault_stops_loop() {
        let (mut control, _writer, _recorder) = control(vec![0.0; 6]);
        match control.fail(Tick(3), out_of_range_fault()) {
            Err(ControlError::Tick { tick, source }) => {
                assert_eq!(tick, Tick(3));
                assert!(source.is_invariant_fault());
            }
            other => panic!("expected a tick error, got {other:?}"),
        }
        assert_eq!(control.metrics().tick_errors.get(), 1);
    }

    #[test]
    fn test_invariant_fault_tolerated_when_quiet() {
        let (mut control, _writer, _recorder) = control(vec![0.0; 6]);
        control.options.fail_quietly = true;
        match control.fail(Tick(3), out_of_range_fault()) {
            Ok(TickReport::Failed(ControlError::Tick { tick, .. })) => assert_eq!(tick, Tick(3)),
            other => panic!("expected a failed tick, got {other:?}"),
        }
        assert_eq!(control.metrics().tick_errors.get(), 1);
    }

    #[test]
    fn test_zero_period_rejected() {
        let config = ReachConfig::ur_reach();
        let (_, reader) = state_snapshot();
        let result = ControlLoop::new(
            CommandSynthesizer::from_config(&config).unwrap(),
            ConstantTarget::new(vec![0.0; 6]),
            RecordingPublisher::new(),
            reader,
            Duration::ZERO,
            LoopOptions::default(),
        );
        assert!(matches!(result, Err(ControlError::Config(_))));
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = LoopSummary::default();
        summary.record(&TickReport::Skipped(SkipReason::NoTarget));
        summary.record(&TickReport::Published {
            time_from_start: TrajectoryDuration::default(),
            clipped: 2,
        });
        summary.record(&TickReport::Failed(ControlError::Publish("down".into())));
        assert_eq!(
            summary,
            LoopSummary {
                ticks: 3,
                published: 1,
                skipped: 1,
                failed: 1,
                clipped: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_run_stops_after_max_ticks() {
        let (mut control, writer, recorder) = control(vec![0.1; 7]);
        writer.replace(ur_state(0.0));
        let summary = control
            .run(Some(5), std::future::pending::<()>())
            .await
            .unwrap();
        assert_eq!(summary.ticks, 5);
        assert_eq!(summary.published, 5);
        assert_eq!(recorder.len(), 5);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (mut control, _writer, recorder) = control(vec![0.1; 6]);
        let summary = control.run(None, async {}).await.unwrap();
        assert_eq!(summary.ticks, 0);
        assert!(recorder.is_empty());
    }
}
