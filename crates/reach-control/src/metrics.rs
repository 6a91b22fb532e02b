use prometheus::core::Collector;
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};

/// Per-loop control counters, registered in a private registry.
#[derive(Clone)]
pub struct ControlMetrics {
    pub registry: Registry,
    pub ticks: IntCounter,
    pub waypoints_published: IntCounter,
    pub ticks_skipped: IntCounter,
    pub tick_errors: IntCounter,
    pub clipped_targets: IntCounter,
    pub last_duration_s: Gauge,
}

impl ControlMetrics {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let err = |e: prometheus::Error| format!("metrics init error: {e}");

        let ticks = IntCounter::new("reach_ticks_total", "Control ticks run").map_err(err)?;
        let waypoints_published = IntCounter::new(
            "reach_waypoints_published_total",
            "Trajectory commands published",
        )
        .map_err(err)?;
        let ticks_skipped = IntCounter::new(
            "reach_ticks_skipped_total",
            "Ticks without joint state or target",
        )
        .map_err(err)?;
        let tick_errors =
            IntCounter::new("reach_tick_errors_total", "Ticks aborted by an error").map_err(err)?;
        let clipped_targets = IntCounter::new(
            "reach_clipped_targets_total",
            "Joint targets clipped to their source range",
        )
        .map_err(err)?;
        let last_duration_s = Gauge::new(
            "reach_last_waypoint_duration_seconds",
            "Duration of the last published waypoint",
        )
        .map_err(err)?;

        let collectors: [Box<dyn Collector>; 6] = [
            Box::new(ticks.clone()),
            Box::new(waypoints_published.clone()),
            Box::new(ticks_skipped.clone()),
            Box::new(tick_errors.clone()),
            Box::new(clipped_targets.clone()),
            Box::new(last_duration_s.clone()),
        ];
        for collector in collectors {
            registry.register(collector).map_err(err)?;
        }

        Ok(Self {
            registry,
            ticks,
            waypoints_published,
            ticks_skipped,
            tick_errors,
            clipped_targets,
            last_duration_s,
        })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        let metrics = ControlMetrics::new().unwrap();
        metrics.ticks.inc();
        metrics.ticks.inc();
        metrics.clipped_targets.inc_by(3);
        metrics.last_duration_s.set(0.5);

        let text = metrics.encode_text();
        assert!(text.contains("reach_ticks_total 2"));
        assert!(text.contains("reach_clipped_targets_total 3"));
        assert!(text.contains("reach_last_waypoint_duration_seconds 0.5"));
        assert!(text.contains("reach_tick_errors_total 0"));
    }

    #[test]
    fn test_independent_registries() {
        let a = ControlMetrics::new().unwrap();
        let b = ControlMetrics::new().unwrap();
        a.ticks.inc();
        assert_eq!(a.ticks.get(), 1);
        assert_eq!(b.ticks.get(), 0);
    }
}
