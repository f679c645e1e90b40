//! TAP (Test Anything Protocol) streaming parser and serializer.
//!
//! TAP is the line-oriented text format test harnesses use to report
//! results: a version line, a plan (`1..N`), `ok` / `not ok` test points,
//! comments, bailouts, indented sub-tests, and YAML diagnostic blocks.
//!
//! # Parsing Pipeline
//!
//! The parser operates in three phases:
//!
//! 1. **Scanner**: Reassembles arbitrarily chunked input into complete lines,
//!    decoding UTF-8 across chunk boundaries.
//!
//! 2. **Classifier**: Maps each line, indentation stripped, to a token:
//!    version, plan, test point, comment, bailout, pragma, or fence.
//!
//! 3. **Parser**: Drives a per-scope state machine over the tokens, collects
//!    diagnostic blocks, delegates indented blocks to child parsers, and
//!    emits events that an aggregator folds into a final summary.
//!
//! [`stringify`] turns events back into canonical TAP.

mod aggregate;
mod encode;
mod error;
mod event;
mod lexer;
mod parser;
mod result;
mod scanner;
mod value;
pub mod yamlish;

pub use aggregate::Aggregator;
pub use encode::{stringify, stringify_points, StringifyOptions};
pub use error::{DiagnosticError, EncodeError, Result, StringifyError};
pub use event::Event;
pub use lexer::{classify, PointLine, Token};
pub use parser::{parse, parse_summary, ParseOptions, Parser};
pub use result::{
    Counts, DiagnosticFault, Directive, DirectiveKind, FinalSummary, Mismatch, Plan, Subtest,
    TestPoint,
};
pub use scanner::LineScanner;
pub use value::Value;

/// Parse a complete document with default options and return its summary.
///
/// # Example
///
/// ```
/// let summary = libtap::summarize("1..2\nok 1\nnot ok 2 - broken\n");
/// assert!(!summary.ok);
/// assert_eq!(summary.counts.fail, 1);
/// assert_eq!(summary.failures[0].name, "broken");
/// ```
pub fn summarize(input: &str) -> FinalSummary {
    parse_summary(input, &ParseOptions::default())
}
