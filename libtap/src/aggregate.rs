//! Result aggregation.
//!
//! The aggregator is a reducer over the parser's events: it never looks at
//! raw lines or parser internals, so feeding it the same events always
//! produces the same summary.

use crate::event::Event;
use crate::lexer::comment_time;
use crate::result::{Counts, DiagnosticFault, FinalSummary, Mismatch, Plan, TestPoint};
use std::sync::Arc;

/// Accumulates events of one scope into a [`FinalSummary`].
#[derive(Debug, Clone)]
pub struct Aggregator {
    strict: bool,
    /// A mismatch was observed while strict mode was on.
    strict_violation: bool,
    plan: Option<Plan>,
    counts: Counts,
    failures: Vec<Arc<TestPoint>>,
    bailout: Option<String>,
    mismatches: Vec<Mismatch>,
    diagnostic_errors: Vec<DiagnosticFault>,
    time: Option<f64>,
}

impl Aggregator {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            strict_violation: false,
            plan: None,
            counts: Counts::default(),
            failures: Vec::new(),
            bailout: None,
            mismatches: Vec::new(),
            diagnostic_errors: Vec::new(),
            time: None,
        }
    }

    /// Fold one event into the running state.
    pub fn observe(&mut self, event: &Event) {
        match event {
            Event::Plan(plan) => {
                if self.plan.is_none() {
                    self.plan = Some(plan.clone());
                }
            }
            Event::Result(point) => self.record(point),
            Event::Bailout(reason) => {
                if self.bailout.is_none() {
                    self.bailout = Some(reason.clone());
                }
            }
            Event::Mismatch(mismatch) => {
                if self.strict {
                    self.strict_violation = true;
                }
                self.mismatches.push(mismatch.clone());
            }
            Event::Pragma { key, enabled } if key == "strict" => self.strict = *enabled,
            Event::Comment(text) => {
                if let Some(ms) = comment_time(text) {
                    self.time = Some(ms);
                }
            }
            _ => {}
        }
    }

    fn record(&mut self, point: &Arc<TestPoint>) {
        self.counts.total += 1;
        if point.is_skip() {
            self.counts.skip += 1;
        } else if point.is_todo() {
            self.counts.todo += 1;
        } else if point.ok {
            self.counts.pass += 1;
        } else {
            self.counts.fail += 1;
            self.failures.push(Arc::clone(point));
        }
        if let Some(error) = &point.diag_error {
            self.diagnostic_errors.push(DiagnosticFault {
                id: point.id,
                error: error.clone(),
            });
        }
    }

    pub fn bailed_out(&self) -> bool {
        self.bailout.is_some()
    }

    /// The plan/count disagreement to report at completion, if any.
    pub fn reconcile(&self) -> Option<Mismatch> {
        let plan = self.plan.as_ref()?;
        let expected = plan.expected_count();
        let observed = self.counts.total;
        (expected != observed).then_some(Mismatch::PlanCount { expected, observed })
    }

    /// Produce the summary. A plan/count mismatch and a bailout are always
    /// fatal; other mismatches only under strict mode.
    pub fn finish(&self) -> FinalSummary {
        let count_mismatch = self
            .mismatches
            .iter()
            .any(|m| matches!(m, Mismatch::PlanCount { .. }))
            || self.reconcile().is_some();
        let ok = self.counts.fail == 0
            && self.bailout.is_none()
            && !count_mismatch
            && !self.strict_violation;

        FinalSummary {
            ok,
            plan: self.plan.clone(),
            counts: self.counts,
            failures: self.failures.clone(),
            bailout: self.bailout.clone(),
            mismatches: self.mismatches.clone(),
            diagnostic_errors: self.diagnostic_errors.clone(),
            time: self.time,
        }
    }
}
