//! Step-size selection for range queries.
//!
//! Target: at least one point per calendar day, at most ~90 points total.

use std::time::Duration;

const MAX_POINTS: f64 = 90.0;

/// Pick a sampling step for the given span.
///
/// Escalation by span length: ≤6h → 30m, ≤24h → 1h, ≤3d → 6h, ≤7d → 8h,
/// ≤15d → 12h, beyond → 24h. The choice is then adjusted so every covered
/// day keeps at least one point and the total stays under the ceiling.
pub fn select_step(span: Duration) -> Duration {
    let hours = span.as_secs_f64() / 3600.0;
    let days = (hours / 24.0).ceil().max(1.0);

    let mut step_hours: f64 = match hours {
        h if h <= 6.0 => 0.5,
        h if h <= 24.0 => 1.0,
        h if h <= 72.0 => 6.0,
        h if h <= 168.0 => 8.0,
        h if h <= 360.0 => 12.0,
        _ => 24.0,
    };

    // Daily coverage floor: never fewer points than covered days.
    if hours / step_hours < days {
        step_hours = (hours / days).floor().clamp(1.0, 24.0);
    }

    // Point ceiling: grow the step, but never past daily coverage.
    if hours / step_hours > MAX_POINTS {
        let proposed = (hours / MAX_POINTS).ceil();
        if proposed <= 24.0 {
            step_hours = proposed;
        }
    }

    // Final guard: a step that starves some day of points collapses to 24h.
    if hours / step_hours < days {
        step_hours = 24.0;
    }

    Duration::from_secs_f64(step_hours * 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(span_h: f64) -> f64 {
        let span = Duration::from_secs_f64(span_h * 3600.0);
        span.as_secs_f64() / select_step(span).as_secs_f64()
    }

    #[test]
    fn short_spans_use_half_hour_steps() {
        assert_eq!(select_step(Duration::from_secs(6 * 3600)), Duration::from_secs(1800));
        assert_eq!(select_step(Duration::from_secs(24 * 3600)), Duration::from_secs(3600));
    }

    #[test]
    fn escalation_table() {
        assert_eq!(select_step(Duration::from_secs(48 * 3600)), Duration::from_secs(6 * 3600));
        assert_eq!(select_step(Duration::from_secs(7 * 86400)), Duration::from_secs(8 * 3600));
        assert_eq!(select_step(Duration::from_secs(14 * 86400)), Duration::from_secs(12 * 3600));
        assert_eq!(select_step(Duration::from_secs(30 * 86400)), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn point_count_stays_bounded() {
        for span_h in [2.0, 6.0, 12.0, 24.0, 72.0, 168.0, 360.0, 720.0, 2160.0] {
            let p = points(span_h);
            let days = (span_h / 24.0).ceil().max(1.0);
            assert!(p <= MAX_POINTS + 1.0, "span {span_h}h gives {p} points");
            assert!(p >= days - 0.01, "span {span_h}h starves daily coverage ({p} points)");
        }
    }
}
