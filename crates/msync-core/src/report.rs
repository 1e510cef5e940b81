use std::time::Duration;

use msync_types::Value;
use serde::Serialize;

use crate::binding::BindingMode;

// ---------------------------------------------------------------------------
// Applied
// ---------------------------------------------------------------------------

/// What a successful binding invocation did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Applied {
    /// A direct-mode callable ran.
    Invoked,
    /// A new entity was created and saved.
    Created,
    /// An existing entity was updated and saved.
    Updated,
    /// An existing entity was deleted.
    Deleted,
    /// Nothing to do, e.g. destroying an entity that is already absent.
    Skipped,
}

// ---------------------------------------------------------------------------
// BindingOutcome
// ---------------------------------------------------------------------------

/// Recorded result of one binding invocation.
#[derive(Clone, Debug, Serialize)]
pub struct BindingOutcome {
    /// [`HandlerBinding::label`](crate::HandlerBinding::label) of the binding.
    pub binding: String,
    pub mode: BindingMode,
    /// Wall-clock time the invocation took.
    pub elapsed: Duration,
    /// What happened, or the rendered handler error.
    pub result: Result<Applied, String>,
}

impl BindingOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

// ---------------------------------------------------------------------------
// DispatchReport
// ---------------------------------------------------------------------------

/// The outcome of dispatching one envelope to every matching binding.
#[derive(Clone, Debug, Serialize)]
pub struct DispatchReport {
    pub class: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Per-binding outcomes in invocation order.
    pub outcomes: Vec<BindingOutcome>,
    /// Total wall-clock time for the dispatch.
    pub elapsed: Duration,
}

impl DispatchReport {
    /// Number of bindings that matched and ran.
    pub fn matched(&self) -> usize {
        self.outcomes.len()
    }

    /// Outcomes whose handler failed.
    pub fn failures(&self) -> impl Iterator<Item = &BindingOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Returns `true` if every invoked binding succeeded.
    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }

    /// Returns `true` if no binding matched the envelope.
    pub fn is_noop(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(result: Result<Applied, String>) -> BindingOutcome {
        BindingOutcome {
            binding: "User.create -> User.create (reconciling)".into(),
            mode: BindingMode::Reconciling,
            elapsed: Duration::from_micros(3),
            result,
        }
    }

    #[test]
    fn counts_failures() {
        let report = DispatchReport {
            class: "User".into(),
            action: "create".into(),
            id: Some(Value::from(1)),
            outcomes: vec![outcome(Err("boom".into())), outcome(Ok(Applied::Created))],
            elapsed: Duration::from_micros(10),
        };
        assert_eq!(report.matched(), 2);
        assert_eq!(report.failure_count(), 1);
        assert!(!report.is_clean());
        assert!(!report.is_noop());
    }

    #[test]
    fn empty_report_is_clean_noop() {
        let report = DispatchReport {
            class: "User".into(),
            action: "create".into(),
            id: None,
            outcomes: Vec::new(),
            elapsed: Duration::ZERO,
        };
        assert!(report.is_clean());
        assert!(report.is_noop());
    }

    #[test]
    fn serializes_outcome_result() {
        let json = serde_json::to_value(outcome(Ok(Applied::Deleted))).unwrap();
        assert_eq!(json["result"]["Ok"], "deleted");
        assert_eq!(json["mode"], "reconciling");
    }
}
