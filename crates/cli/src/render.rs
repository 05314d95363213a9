//! Human-readable formatting for terminal output.

use chrono::{DateTime, Duration, Utc};

use driftscope_core::{ReadyIcon, Resource};
use driftscope_schema::FieldNode;

pub fn render_age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match created {
        Some(t) => render_duration((now - t).max(Duration::zero())),
        None => "-".to_string(),
    }
}

pub fn render_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    let days = secs / 86_400;
    let hours = secs % 86_400 / 3600;
    let mins = secs % 3600 / 60;
    if days > 0 {
        format!("{}d{}h", days, hours)
    } else if hours > 0 {
        format!("{}h{}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", secs % 60)
    }
}

/// Raw object as YAML, the way `kubectl get -o yaml` shows it.
pub fn render_yaml(raw: &serde_json::Value) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(raw)
}

pub fn render_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn ready_glyph(icon: ReadyIcon) -> &'static str {
    match icon {
        ReadyIcon::Ready => "✓",
        ReadyIcon::NotReady => "✗",
        ReadyIcon::Progressing => "…",
        ReadyIcon::Reconciling => "↻",
        ReadyIcon::Unknown => "?",
    }
}

/// `+n` when behind, `0` when caught up, `-` when there is no signal.
pub fn render_drift(r: &Resource) -> String {
    if !r.has_observed_generation() {
        return "-".to_string();
    }
    match r.drift() {
        d if d > 0 => format!("+{}", d),
        d => d.to_string(),
    }
}

pub fn or_dash(s: &str) -> &str { if s.is_empty() { "-" } else { s } }

/// Truncate to `max` chars with a trailing `...`.
pub fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max || max < 4 {
        return s.to_string();
    }
    let head: String = s.chars().take(max - 3).collect();
    format!("{}...", head)
}

/// Field name with a marker when it can be drilled into.
pub fn field_label(n: &FieldNode) -> String {
    if n.has_children() { format!("{} ▸", n.name) } else { n.name.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use driftscope_core::GroupVersionResource;
    use serde_json::json;

    #[test]
    fn yaml_shows_raw_object() {
        let raw = json!({"apiVersion": "example.io/v1", "kind": "Widget", "spec": {"replicas": 2}});
        let yaml = render_yaml(&raw).expect("yaml");
        assert!(yaml.starts_with("apiVersion: example.io/v1\n"));
        assert!(yaml.contains("kind: Widget\n"));
        assert!(yaml.contains("spec:\n  replicas: 2\n"));
    }

    #[test]
    fn durations_use_two_units() {
        assert_eq!(render_duration(Duration::seconds(42)), "42s");
        assert_eq!(render_duration(Duration::seconds(125)), "2m");
        assert_eq!(render_duration(Duration::seconds(3 * 3600 + 120)), "3h2m");
        assert_eq!(render_duration(Duration::seconds(2 * 86_400 + 5 * 3600)), "2d5h");
        assert_eq!(render_duration(Duration::seconds(-5)), "0s");
    }

    #[test]
    fn age_of_unknown_creation() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(render_age(None, now), "-");
        assert_eq!(render_age(Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()), now), "1d0h");
    }

    #[test]
    fn drift_column() {
        let gvr = GroupVersionResource::default();
        let now = Utc::now();
        let behind = Resource::from_raw(json!({"metadata": {"generation": 4}, "status": {"observedGeneration": 2}}), &gvr, now);
        let silent = Resource::from_raw(json!({"metadata": {"generation": 4}}), &gvr, now);
        assert_eq!(render_drift(&behind), "+2");
        assert_eq!(render_drift(&silent), "-");
    }

    #[test]
    fn clip_is_char_safe() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("ünïcödé-string", 8), "ünïcö...");
    }
}
