//! Events emitted by the parser.
//!
//! For every input line the parser emits, in order:
//!
//! 1. `Line` with the raw line
//! 2. at most one of `Version`, `Plan`, `Assert`, `Comment`, `Extra`,
//!    `Pragma`, `Bailout`
//! 3. for test points, `Result`, then `Skip` or `Todo` if a directive is set
//! 4. any `Mismatch` the line caused
//! 5. `Complete` if the line ended the scope
//!
//! A test point is held back until the parser knows whether a diagnostic
//! block follows it, so its `Assert`/`Result` group appears just before the
//! `Line` of the next line that is not part of the block.

use crate::result::{FinalSummary, Mismatch, Plan, TestPoint};
use std::sync::Arc;

/// A single parser event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Every raw input line, without its terminator.
    Line(String),
    /// `TAP version N` as the first line of a scope.
    Version(u32),
    Plan(Plan),
    Assert(Arc<TestPoint>),
    Result(Arc<TestPoint>),
    Skip(Arc<TestPoint>),
    Todo(Arc<TestPoint>),
    Comment(String),
    /// A line that is not TAP.
    Extra(String),
    Pragma { key: String, enabled: bool },
    Bailout(String),
    Mismatch(Mismatch),
    Complete(FinalSummary),
}

impl Event {
    /// Short tag naming the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Line(_) => "line",
            Event::Version(_) => "version",
            Event::Plan(_) => "plan",
            Event::Assert(_) => "assert",
            Event::Result(_) => "result",
            Event::Skip(_) => "skip",
            Event::Todo(_) => "todo",
            Event::Comment(_) => "comment",
            Event::Extra(_) => "extra",
            Event::Pragma { .. } => "pragma",
            Event::Bailout(_) => "bailout",
            Event::Mismatch(_) => "mismatch",
            Event::Complete(_) => "complete",
        }
    }

    /// The final summary, if this is the `Complete` event.
    pub fn as_summary(&self) -> Option<&FinalSummary> {
        match self {
            Event::Complete(summary) => Some(summary),
            _ => None,
        }
    }
}
