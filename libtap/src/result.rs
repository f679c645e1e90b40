//! Structured results: test points, plans, and the final summary.

use crate::error::DiagnosticError;
use crate::event::Event;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Kind of a trailing `# SKIP` / `# TODO` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Skip,
    Todo,
}

impl DirectiveKind {
    /// Canonical upper-case keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            DirectiveKind::Skip => "SKIP",
            DirectiveKind::Todo => "TODO",
        }
    }
}

/// A skip or todo directive with its (possibly empty) reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub reason: String,
}

impl Directive {
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            kind: DirectiveKind::Skip,
            reason: reason.into(),
        }
    }

    pub fn todo(reason: impl Into<String>) -> Self {
        Self {
            kind: DirectiveKind::Todo,
            reason: reason.into(),
        }
    }
}

/// A plan line, `start..end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub start: u64,
    pub end: u64,
    /// Present when the plan carries `# SKIP`, even with an empty reason.
    pub skip_reason: Option<String>,
    /// Any other trailing `# comment`.
    pub comment: Option<String>,
}

impl Plan {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            skip_reason: None,
            comment: None,
        }
    }

    /// Number of test points the plan promises.
    pub fn expected_count(&self) -> u64 {
        if self.end == 0 || self.end < self.start {
            0
        } else {
            (self.end - self.start).saturating_add(1)
        }
    }

    /// Whether the plan declares the whole scope skipped.
    pub fn skip_all(&self) -> bool {
        self.end == 0 || self.skip_reason.is_some()
    }
}

/// A completed child scope attached to the test point it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtest {
    /// Name from `# Subtest: <name>`, or the closing test point's name.
    pub name: String,
    /// Every event the child emitted, ending with its `Complete`.
    pub events: Vec<Event>,
    pub summary: FinalSummary,
}

/// A single `ok` / `not ok` result.
#[derive(Debug, Clone, PartialEq)]
pub struct TestPoint {
    pub ok: bool,
    pub id: u64,
    pub name: String,
    /// Name qualified by the names of enclosing sub-tests.
    pub fullname: String,
    pub directive: Option<Directive>,
    /// Decoded diagnostic block.
    pub diag: Option<Value>,
    /// Why the diagnostic block following this point could not be decoded.
    pub diag_error: Option<DiagnosticError>,
    /// Duration in milliseconds from a `# time=` directive.
    pub time: Option<f64>,
    pub subtest: Option<Box<Subtest>>,
}

impl TestPoint {
    /// A bare result with no directive, diagnostics, or sub-test.
    pub fn new(ok: bool, id: u64, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            ok,
            id,
            fullname: name.clone(),
            name,
            directive: None,
            diag: None,
            diag_error: None,
            time: None,
            subtest: None,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(&self.directive, Some(d) if d.kind == DirectiveKind::Skip)
    }

    pub fn is_todo(&self) -> bool {
        matches!(&self.directive, Some(d) if d.kind == DirectiveKind::Todo)
    }

    /// A failure that counts against the scope: not ok, not skipped, not todo.
    pub fn is_failure(&self) -> bool {
        !self.ok && self.directive.is_none()
    }
}

/// Structural anomaly observed in a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// A plan line after the scope already had one.
    DuplicatePlan { first: Plan, second: Plan },
    /// A plan line after test points (strict mode only).
    LatePlan { after: u64 },
    /// An explicit id that is not the next id in sequence.
    IdOutOfSequence { expected: u64, found: u64 },
    /// A test point after a plan that declared zero tests.
    TestAfterSkipAll { id: u64 },
    /// The plan's range and the observed count disagree at completion.
    PlanCount { expected: u64, observed: u64 },
    /// The line closing a sub-test disagrees with the sub-test's own outcome.
    SubtestOutcome { name: String, line_ok: bool },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::DuplicatePlan { first, second } => write!(
                f,
                "plan {}..{} after plan {}..{}",
                second.start, second.end, first.start, first.end
            ),
            Mismatch::LatePlan { after } => {
                write!(f, "plan appears after {} test points", after)
            }
            Mismatch::IdOutOfSequence { expected, found } => {
                write!(f, "test point id {} where {} was expected", found, expected)
            }
            Mismatch::TestAfterSkipAll { id } => {
                write!(f, "test point {} after a plan of zero tests", id)
            }
            Mismatch::PlanCount { expected, observed } => write!(
                f,
                "plan expects {} test points, observed {}",
                expected, observed
            ),
            Mismatch::SubtestOutcome { name, line_ok } => write!(
                f,
                "subtest {:?} closed with {} but its results say otherwise",
                name,
                if *line_ok { "ok" } else { "not ok" }
            ),
        }
    }
}

/// Outcome counts. Every test point lands in exactly one of
/// pass/fail/skip/todo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub pass: u64,
    pub fail: u64,
    pub skip: u64,
    pub todo: u64,
    pub total: u64,
}

/// An undecodable diagnostic block and the test point that owned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticFault {
    pub id: u64,
    pub error: DiagnosticError,
}

/// Aggregated result of one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalSummary {
    pub ok: bool,
    pub plan: Option<Plan>,
    pub counts: Counts,
    /// Failing test points in order of appearance.
    pub failures: Vec<Arc<TestPoint>>,
    /// Reason of the bailout that ended the scope, if any.
    pub bailout: Option<String>,
    pub mismatches: Vec<Mismatch>,
    pub diagnostic_errors: Vec<DiagnosticFault>,
    /// Duration in milliseconds from a `# time=` comment.
    pub time: Option<f64>,
}

impl FinalSummary {
    pub fn bailed_out(&self) -> bool {
        self.bailout.is_some()
    }

    pub fn has_mismatch(&self) -> bool {
        !self.mismatches.is_empty()
    }
}

impl Default for FinalSummary {
    fn default() -> Self {
        Self {
            ok: true,
            plan: None,
            counts: Counts::default(),
            failures: Vec::new(),
            bailout: None,
            mismatches: Vec::new(),
            diagnostic_errors: Vec::new(),
            time: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_expected_count() {
        assert_eq!(Plan::new(1, 3).expected_count(), 3);
        assert_eq!(Plan::new(5, 5).expected_count(), 1);
        assert_eq!(Plan::new(1, 0).expected_count(), 0);
        assert!(Plan::new(1, 0).skip_all());
        assert!(!Plan::new(1, 2).skip_all());
        assert_eq!(Plan::new(0, u64::MAX).expected_count(), u64::MAX);
    }

    #[test]
    fn test_point_failure_classification() {
        let mut point = TestPoint::new(false, 1, "broken");
        assert!(point.is_failure());
        point.directive = Some(Directive::todo("later"));
        assert!(!point.is_failure());
        assert!(point.is_todo());
        assert!(!point.is_skip());
    }

    #[test]
    fn test_mismatch_display() {
        let m = Mismatch::IdOutOfSequence {
            expected: 2,
            found: 5,
        };
        assert_eq!(m.to_string(), "test point id 5 where 2 was expected");
    }
}
