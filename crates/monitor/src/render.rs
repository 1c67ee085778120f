//! One-line console summaries of feed state.

use xrayops_core::snapshot::{ConnectionHealth, StatsSnapshot};

/// Summarise a snapshot for the console.
///
/// Uses the typed overall view when the payload has that shape and falls
/// back to the compact JSON otherwise.
pub fn snapshot_line(snapshot: &StatsSnapshot) -> String {
    let at = snapshot.received_at().format("%H:%M:%S");
    match snapshot.overall() {
        Some(stats) => {
            let severity = stats
                .by_severity
                .iter()
                .map(|(level, count)| format!("{level}:{count}"))
                .collect::<Vec<_>>()
                .join(" ");
            let top_disease = stats
                .by_disease
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(name, count)| format!(" top={name}({count})"))
                .unwrap_or_default();
            format!(
                "[{at}] stats total={} recent={} severity=[{severity}]{top_disease}",
                stats.total_predictions, stats.recent_count,
            )
        }
        None => format!("[{at}] stats {}", snapshot.data()),
    }
}

pub fn health_line(health: &ConnectionHealth) -> String {
    match (health.connected, &health.last_error) {
        (true, _) => "feed: connected".to_string(),
        (false, Some(reason)) => format!("feed: disconnected ({reason})"),
        (false, None) => "feed: disconnected".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn snapshot(data: serde_json::Value) -> StatsSnapshot {
        StatsSnapshot::new(data, Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 5).unwrap())
    }

    #[test]
    fn overall_stats_are_summarised() {
        let line = snapshot_line(&snapshot(json!({
            "total_predictions": 12,
            "by_severity": {"0": 7, "2": 4, "4": 1},
            "by_disease": {"Effusion": 3, "Atelectasis": 3, "Mass": 1},
            "recent_count": 2
        })));
        assert_eq!(
            line,
            "[09:30:05] stats total=12 recent=2 severity=[0:7 2:4 4:1] top=Atelectasis(3)"
        );
    }

    #[test]
    fn unknown_shape_falls_back_to_json() {
        let line = snapshot_line(&snapshot(json!({"queue": 3})));
        assert_eq!(line, r#"[09:30:05] stats {"queue":3}"#);
    }

    #[test]
    fn health_lines() {
        assert_eq!(health_line(&ConnectionHealth::connected()), "feed: connected");
        assert_eq!(
            health_line(&ConnectionHealth::disconnected(Some("socket closed".into()))),
            "feed: disconnected (socket closed)"
        );
        assert_eq!(
            health_line(&ConnectionHealth::disconnected(None)),
            "feed: disconnected"
        );
    }
}
