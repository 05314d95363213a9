//! Reconciliation model: pure predicates over an extracted [`Resource`].
//!
//! Time-dependent values take `now` explicitly so callers (and tests) decide
//! the clock.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Resource;

/// Condition types that signal an in-progress rollout.
pub const PROGRESS_CONDITIONS: &[&str] = &["Progressing", "Reconciling"];
/// Condition types that signal readiness.
pub const READINESS_CONDITIONS: &[&str] = &["Ready", "Available", "Healthy", "Synced"];
/// Condition type some controllers use to report they gave up.
pub const STALLED_CONDITION: &str = "Stalled";

/// Default lag after which an in-flight reconcile is reported as stuck.
pub const DEFAULT_STUCK_AFTER_SECS: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadyStatus {
    Ready,
    NotReady,
    Progressing,
    Unknown,
}

impl ReadyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadyStatus::Ready => "Ready",
            ReadyStatus::NotReady => "NotReady",
            ReadyStatus::Progressing => "Progressing",
            ReadyStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ReadyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Icon taxonomy for row rendering; the glyph itself is the front-end's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadyIcon {
    Ready,
    NotReady,
    Progressing,
    Reconciling,
    Unknown,
}

impl From<ReadyStatus> for ReadyIcon {
    fn from(s: ReadyStatus) -> Self {
        match s {
            ReadyStatus::Ready => ReadyIcon::Ready,
            ReadyStatus::NotReady => ReadyIcon::NotReady,
            ReadyStatus::Progressing => ReadyIcon::Progressing,
            ReadyStatus::Unknown => ReadyIcon::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReconcileState {
    /// Controller has processed the latest spec.
    Idle,
    /// Controller is processing spec changes.
    InFlight,
    /// In flight for longer than the stuck threshold.
    Stuck,
    /// Controller reported a failure.
    Error,
}

impl ReconcileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileState::Idle => "Idle",
            ReconcileState::InFlight => "InFlight",
            ReconcileState::Stuck => "Stuck",
            ReconcileState::Error => "Error",
        }
    }
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

fn since(now: DateTime<Utc>, then: DateTime<Utc>) -> Duration {
    (now - then).max(Duration::zero())
}

impl Resource {
    pub fn has_observed_generation(&self) -> bool {
        self.observed_generation > 0
    }

    /// `generation - observedGeneration`, or 0 when no observedGeneration is
    /// reported.
    pub fn drift(&self) -> i64 {
        if self.observed_generation <= 0 {
            return 0;
        }
        self.generation - self.observed_generation
    }

    pub fn is_reconciling(&self) -> bool {
        self.has_observed_generation() && self.drift() > 0
    }

    /// How long convergence took, or has been taking so far.
    pub fn lag(&self, now: DateTime<Utc>) -> Duration {
        let Some(spec) = self.last_spec_write else { return Duration::zero() };
        if self.is_reconciling() {
            return since(now, spec);
        }
        match self.last_status_write {
            Some(status) if status > spec => status - spec,
            _ => Duration::zero(),
        }
    }

    /// Time since the last status write, falling back to object age.
    pub fn silence(&self, now: DateTime<Utc>) -> Duration {
        match (self.last_status_write, self.created_at) {
            (Some(status), _) => since(now, status),
            (None, Some(created)) => since(now, created),
            (None, None) => Duration::zero(),
        }
    }

    /// Priority-table readiness. A `True` progress condition wins over any
    /// readiness condition; a single `False` readiness condition makes the
    /// object `NotReady` even when another one is `True`.
    pub fn ready_status(&self) -> ReadyStatus {
        let progressing = self
            .conditions
            .iter()
            .any(|c| PROGRESS_CONDITIONS.contains(&c.type_.as_str()) && c.is_true());
        if progressing {
            return ReadyStatus::Progressing;
        }
        let readiness = self.conditions.iter().filter(|c| READINESS_CONDITIONS.contains(&c.type_.as_str()));
        let (mut any_true, mut any_false) = (false, false);
        for c in readiness {
            any_true |= c.is_true();
            any_false |= c.is_false();
        }
        match (any_true, any_false) {
            (_, true) => ReadyStatus::NotReady,
            (true, false) => ReadyStatus::Ready,
            (false, false) => ReadyStatus::Unknown,
        }
    }

    pub fn ready_icon(&self) -> ReadyIcon {
        if self.is_reconciling() {
            return ReadyIcon::Reconciling;
        }
        self.ready_status().into()
    }

    pub fn reconcile_state(&self, now: DateTime<Utc>, stuck_after: Duration) -> ReconcileState {
        let stalled = self.condition(STALLED_CONDITION).map_or(false, |c| c.is_true());
        if stalled {
            return ReconcileState::Error;
        }
        if self.is_reconciling() {
            if self.lag(now) >= stuck_after {
                return ReconcileState::Stuck;
            }
            return ReconcileState::InFlight;
        }
        if self.ready_status() == ReadyStatus::NotReady {
            return ReconcileState::Error;
        }
        ReconcileState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::parse_time;
    use crate::GroupVersionResource;
    use serde_json::{json, Value};

    fn t(s: &str) -> DateTime<Utc> { parse_time(s).expect("valid timestamp") }

    fn res(generation: i64, observed: i64, conditions: Value) -> Resource {
        let raw = json!({
            "metadata": {"name": "x", "generation": generation, "creationTimestamp": "2024-01-01T00:00:00Z"},
            "status": {"observedGeneration": observed, "conditions": conditions}
        });
        Resource::from_raw(raw, &GroupVersionResource::default(), t("2024-01-01T00:00:00Z"))
    }

    fn conds(pairs: &[(&str, &str)]) -> Value {
        Value::Array(pairs.iter().map(|(ty, st)| json!({"type": ty, "status": st})).collect())
    }

    #[test]
    fn missing_observed_generation_never_drifts() {
        for generation in [0, 1, 5, 999] {
            let r = res(generation, 0, json!([]));
            assert_eq!(r.drift(), 0, "generation {}", generation);
            assert!(!r.is_reconciling());
            assert!(!r.has_observed_generation());
        }
    }

    #[test]
    fn equal_generations_are_idle() {
        let r = res(5, 5, json!([]));
        assert_eq!(r.drift(), 0);
        assert!(!r.is_reconciling());
    }

    #[test]
    fn positive_drift_is_reconciling() {
        for k in 1..4 {
            let r = res(5 + k, 5, json!([]));
            assert_eq!(r.drift(), k);
            assert!(r.is_reconciling());
        }
    }

    #[test]
    fn lag_while_reconciling_counts_from_spec_write() {
        let mut r = res(6, 5, json!([]));
        r.last_spec_write = Some(t("2024-01-01T00:00:00Z"));
        r.last_status_write = Some(t("2023-12-31T23:00:00Z"));
        assert_eq!(r.lag(t("2024-01-01T00:05:00Z")), Duration::minutes(5));
    }

    #[test]
    fn lag_after_convergence_is_status_minus_spec() {
        let mut r = res(5, 5, json!([]));
        r.last_spec_write = Some(t("2024-01-01T00:00:00Z"));
        r.last_status_write = Some(t("2024-01-01T00:00:30Z"));
        assert_eq!(r.lag(t("2024-01-01T01:00:00Z")), Duration::seconds(30));

        r.last_status_write = Some(t("2023-12-31T00:00:00Z"));
        assert_eq!(r.lag(t("2024-01-01T01:00:00Z")), Duration::zero());

        r.last_spec_write = None;
        assert_eq!(r.lag(t("2024-01-01T01:00:00Z")), Duration::zero());
    }

    #[test]
    fn silence_falls_back_to_creation() {
        let mut r = res(1, 1, json!([]));
        assert_eq!(r.silence(t("2024-01-01T00:10:00Z")), Duration::minutes(10));
        r.last_status_write = Some(t("2024-01-01T00:08:00Z"));
        assert_eq!(r.silence(t("2024-01-01T00:10:00Z")), Duration::minutes(2));
    }

    #[test]
    fn ready_status_priority_table() {
        assert_eq!(res(1, 1, conds(&[("Ready", "True")])).ready_status(), ReadyStatus::Ready);
        assert_eq!(res(1, 1, conds(&[("Synced", "True"), ("Available", "True")])).ready_status(), ReadyStatus::Ready);
        assert_eq!(res(1, 1, conds(&[("Ready", "False")])).ready_status(), ReadyStatus::NotReady);
        assert_eq!(res(1, 1, conds(&[("Ready", "True"), ("Synced", "False")])).ready_status(), ReadyStatus::NotReady);
        assert_eq!(
            res(1, 1, conds(&[("Progressing", "True"), ("Ready", "False")])).ready_status(),
            ReadyStatus::Progressing
        );
        assert_eq!(res(1, 1, conds(&[("Reconciling", "True")])).ready_status(), ReadyStatus::Progressing);
        assert_eq!(res(1, 1, conds(&[("Progressing", "False"), ("Ready", "Unknown")])).ready_status(), ReadyStatus::Unknown);
        assert_eq!(res(1, 1, json!([])).ready_status(), ReadyStatus::Unknown);
    }

    #[test]
    fn ready_icon_prefers_reconciling() {
        assert_eq!(res(6, 5, conds(&[("Ready", "True")])).ready_icon(), ReadyIcon::Reconciling);
        assert_eq!(res(5, 5, conds(&[("Ready", "True")])).ready_icon(), ReadyIcon::Ready);
        assert_eq!(res(5, 0, conds(&[("Ready", "False")])).ready_icon(), ReadyIcon::NotReady);
    }

    #[test]
    fn reconcile_state_classification() {
        let stuck_after = Duration::seconds(DEFAULT_STUCK_AFTER_SECS);
        let now = t("2024-01-01T01:00:00Z");

        assert_eq!(res(5, 5, conds(&[("Ready", "True")])).reconcile_state(now, stuck_after), ReconcileState::Idle);
        assert_eq!(res(5, 5, conds(&[("Ready", "False")])).reconcile_state(now, stuck_after), ReconcileState::Error);
        assert_eq!(res(5, 5, conds(&[("Stalled", "True")])).reconcile_state(now, stuck_after), ReconcileState::Error);

        let mut r = res(6, 5, json!([]));
        r.last_spec_write = Some(t("2024-01-01T00:59:00Z"));
        assert_eq!(r.reconcile_state(now, stuck_after), ReconcileState::InFlight);
        r.last_spec_write = Some(t("2024-01-01T00:00:00Z"));
        assert_eq!(r.reconcile_state(now, stuck_after), ReconcileState::Stuck);
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(ReadyStatus::NotReady.to_string(), "NotReady");
        assert_eq!(ReconcileState::InFlight.to_string(), "InFlight");
    }
}
