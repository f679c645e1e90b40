//! Phase 3: Streaming Parser
//!
//! The parser consumes classified lines and drives a small state machine per
//! scope. It handles:
//! - Version, plan, and test point ordering, including id sequencing
//! - Diagnostic blocks fenced by `---` / `...` after a test point
//! - Sub-tests: indented blocks parsed by an owned child parser
//! - Bailouts, bail mode, and the `strict` pragma
//!
//! Events are queued as lines arrive and drained with [`Parser::events`].

use crate::aggregate::Aggregator;
use crate::error::DiagnosticError;
use crate::event::Event;
use crate::lexer::{self, PointLine, Token};
use crate::result::{FinalSummary, Mismatch, Plan, Subtest, TestPoint};
use crate::scanner::{count_indent, LineScanner};
use crate::yamlish;
use std::collections::vec_deque::Drain;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// Knobs for one parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Treat structural mismatches as failures.
    pub strict: bool,
    /// Stop at the first failing test point.
    pub bail: bool,
    /// A bailout inside a sub-test also ends the enclosing scopes.
    pub propagate_bailout: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict: false,
            bail: false,
            propagate_bailout: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ExpectVersion,
    ExpectPlanOrResults,
    InBody,
    Complete,
}

/// Lines of a diagnostic block still being collected.
#[derive(Debug)]
struct DiagBlock {
    indent: usize,
    lines: Vec<String>,
    closed: bool,
}

/// A test point waiting to learn whether a diagnostic block follows.
#[derive(Debug)]
struct PendingPoint {
    point: TestPoint,
    block: Option<DiagBlock>,
    mismatches: Vec<Mismatch>,
}

#[derive(Debug)]
struct ChildScope {
    parser: Box<Parser>,
    indent: usize,
}

/// Incremental TAP parser for one scope.
///
/// Feed text with [`write`](Parser::write) or
/// [`write_bytes`](Parser::write_bytes), signal the end with
/// [`end`](Parser::end), and drain events in between. Every event is also
/// folded into the scope's summary.
#[derive(Debug)]
pub struct Parser {
    options: ParseOptions,
    /// Current strictness, after any pragmas.
    strict: bool,
    state: State,
    scanner: LineScanner,
    events: VecDeque<Event>,
    aggregator: Aggregator,
    summary: Option<FinalSummary>,

    /// Name of this scope; empty at top level.
    name: String,
    /// Joined names of the enclosing scopes.
    parent_path: String,
    is_subtest: bool,
    lines_seen: u64,

    plan: Option<Plan>,
    count: u64,
    next_id: u64,

    pending: Option<PendingPoint>,
    child: Option<ChildScope>,
    /// A finished child whose closing test point has not been seen yet.
    closed_child: Option<Box<Subtest>>,
    /// Name from a `# Subtest:` comment, for the next child.
    announced: Option<String>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(ParseOptions::default())
    }
}

impl Parser {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            strict: options.strict,
            state: State::ExpectVersion,
            scanner: LineScanner::new(),
            events: VecDeque::new(),
            aggregator: Aggregator::new(options.strict),
            summary: None,
            name: String::new(),
            parent_path: String::new(),
            is_subtest: false,
            lines_seen: 0,
            plan: None,
            count: 0,
            next_id: 1,
            pending: None,
            child: None,
            closed_child: None,
            announced: None,
        }
    }

    fn subtest(&self, name: Option<String>) -> Self {
        let mut options = self.options;
        options.strict = self.strict;
        let mut child = Parser::new(options);
        child.name = name.unwrap_or_default();
        child.parent_path = self.scope_path();
        child.is_subtest = true;
        child
    }

    /// Feed a chunk of text. Lines are processed as soon as they are complete.
    pub fn write(&mut self, chunk: &str) {
        if self.is_complete() {
            return;
        }
        self.scanner.push(chunk);
        self.drain_scanner();
    }

    /// Feed raw bytes; UTF-8 sequences may be split across chunks.
    pub fn write_bytes(&mut self, chunk: &[u8]) {
        if self.is_complete() {
            return;
        }
        self.scanner.push_bytes(chunk);
        self.drain_scanner();
    }

    /// Signal end of input. The final summary is available afterwards.
    pub fn end(&mut self) {
        self.scanner.close();
        self.drain_scanner();
        self.finish();
    }

    /// Take every event queued so far.
    pub fn events(&mut self) -> Drain<'_, Event> {
        self.events.drain(..)
    }

    pub fn is_complete(&self) -> bool {
        self.state == State::Complete
    }

    /// The scope's summary, once complete.
    pub fn summary(&self) -> Option<&FinalSummary> {
        self.summary.as_ref()
    }

    fn drain_scanner(&mut self) {
        while let Some(line) = self.scanner.next_line() {
            self.line(line);
            if self.is_complete() {
                break;
            }
        }
    }

    fn emit(&mut self, event: Event) {
        self.aggregator.observe(&event);
        self.events.push_back(event);
    }

    fn mismatch(&mut self, mismatch: Mismatch) {
        trace!(scope = %self.name, %mismatch, "mismatch");
        self.emit(Event::Mismatch(mismatch));
    }

    fn scope_path(&self) -> String {
        join_names(&self.parent_path, &self.name)
    }

    /// Process one raw line of this scope.
    fn line(&mut self, raw: String) {
        if self.is_complete() {
            return;
        }
        self.lines_seen += 1;
        let indent = count_indent(&raw);
        let blank = raw.trim().is_empty();

        if self.collect_block_line(&raw, indent, blank) {
            return;
        }

        if let Some(child) = &mut self.child {
            if blank || indent >= child.indent {
                let stripped = raw.get(child.indent..).unwrap_or("").to_string();
                child.parser.line(stripped);
                let bailout = child
                    .parser
                    .summary()
                    .and_then(|s| s.bailout.clone());
                self.emit(Event::Line(raw));
                if let Some(reason) = bailout {
                    if self.options.propagate_bailout {
                        self.propagate_bailout(reason);
                    }
                }
                return;
            }
            if let Some(reason) = self.close_child() {
                self.bail_out(reason);
                return;
            }
        }

        let token = lexer::classify(&raw[indent..]);

        if indent > 0 {
            if let Some(pending) = &mut self.pending {
                if pending.block.is_none() && token == (Token::BlockFence { closing: false }) {
                    pending.block = Some(DiagBlock {
                        indent,
                        lines: Vec::new(),
                        closed: false,
                    });
                    self.emit(Event::Line(raw));
                    return;
                }
            }
            if self.opens_subtest(&token) {
                self.open_child(raw, indent);
                return;
            }
        }

        self.flush_pending();
        if self.is_complete() {
            return;
        }
        if !matches!(token, Token::TestPoint(_)) {
            self.settle_closed_child();
            if self.is_complete() {
                return;
            }
        }

        self.emit(Event::Line(raw));
        self.token(token);
    }

    /// Route a line into an open diagnostic block. Returns whether the line
    /// was consumed.
    fn collect_block_line(&mut self, raw: &str, indent: usize, blank: bool) -> bool {
        let Some(pending) = &mut self.pending else {
            return false;
        };
        let Some(block) = &mut pending.block else {
            return false;
        };

        if blank {
            block.lines.push(String::new());
        } else if indent == block.indent && raw[indent..].trim_end() == "..." {
            block.closed = true;
            self.emit(Event::Line(raw.to_string()));
            self.flush_pending();
            return true;
        } else if indent >= block.indent {
            block.lines.push(raw[block.indent..].to_string());
        } else {
            // Dedent before the closing fence: the block is abandoned and the
            // line is processed on its own.
            return false;
        }
        self.emit(Event::Line(raw.to_string()));
        true
    }

    fn opens_subtest(&self, token: &Token) -> bool {
        if self.announced.is_some() {
            return true;
        }
        match token {
            Token::Version { .. } | Token::Plan(_) | Token::TestPoint(_) => true,
            Token::Comment { text } => lexer::subtest_name(text).is_some(),
            _ => false,
        }
    }

    fn open_child(&mut self, raw: String, indent: usize) {
        self.flush_pending();
        if self.is_complete() {
            return;
        }
        self.settle_closed_child();
        if self.is_complete() {
            return;
        }

        let name = self.announced.take();
        debug!(scope = %self.name, indent, name = ?name, "subtest opened");
        let mut parser = Box::new(self.subtest(name));
        parser.line(raw[indent..].to_string());
        let bailout = parser.summary().and_then(|s| s.bailout.clone());
        self.child = Some(ChildScope { parser, indent });
        self.emit(Event::Line(raw));
        if let Some(reason) = bailout {
            if self.options.propagate_bailout {
                self.propagate_bailout(reason);
            }
        }
    }

    /// Finish the open child and park it until its closing test point.
    ///
    /// If the child bailed out and bailouts propagate, the parked child is
    /// settled right away and the bailout reason is returned.
    fn close_child(&mut self) -> Option<String> {
        let mut child = self.child.take()?;
        child.parser.finish();
        let summary = child.parser.summary.take().unwrap_or_default();
        let events: Vec<Event> = child.parser.events.drain(..).collect();
        debug!(
            scope = %self.name,
            subtest = %child.parser.name,
            ok = summary.ok,
            "subtest closed"
        );
        let bailout = summary.bailout.clone().filter(|_| self.options.propagate_bailout);
        self.closed_child = Some(Box::new(Subtest {
            name: child.parser.name.clone(),
            events,
            summary,
        }));
        if bailout.is_some() {
            if let Some(point) = self.synthesize_point() {
                self.emit_point(point, Vec::new());
            }
        }
        bailout
    }

    /// Turn a parked child that never got a closing line into a test point.
    fn settle_closed_child(&mut self) {
        if let Some(point) = self.synthesize_point() {
            let point = self.emit_point(point, Vec::new());
            self.after_point(&point);
        }
    }

    fn synthesize_point(&mut self) -> Option<TestPoint> {
        let subtest = self.closed_child.take()?;
        let mut mismatches = Vec::new();
        let id = self.assign_id(None, &mut mismatches);
        for mismatch in mismatches {
            self.mismatch(mismatch);
        }
        let mut point = TestPoint::new(subtest.summary.ok, id, subtest.name.clone());
        point.fullname = join_names(&self.scope_path(), &point.name);
        point.subtest = Some(subtest);
        Some(point)
    }

    fn propagate_bailout(&mut self, reason: String) {
        self.close_child();
        self.bail_out(reason);
    }

    fn token(&mut self, token: Token) {
        if self.state == State::ExpectVersion {
            if let Token::Version { number } = token {
                self.emit(Event::Version(number));
                self.state = State::ExpectPlanOrResults;
                return;
            }
            self.state = State::ExpectPlanOrResults;
        }

        match token {
            Token::Version { number } => {
                self.emit(Event::Extra(format!("TAP version {}", number)));
            }
            Token::Plan(plan) => {
                self.state = State::InBody;
                if let Some(first) = self.plan.clone() {
                    self.mismatch(Mismatch::DuplicatePlan {
                        first,
                        second: plan,
                    });
                    return;
                }
                if self.count == 0 {
                    self.next_id = plan.start;
                }
                self.plan = Some(plan.clone());
                self.emit(Event::Plan(plan));
                if self.count > 0 {
                    self.mismatch(Mismatch::LatePlan { after: self.count });
                }
                self.check_plan_satisfied();
            }
            Token::TestPoint(line) => {
                self.state = State::InBody;
                self.announced = None;
                self.begin_point(line);
            }
            Token::Comment { text } => {
                if let Some(name) = lexer::subtest_name(&text) {
                    if self.is_subtest && self.lines_seen == 1 {
                        self.name = name.to_string();
                    } else {
                        self.announced = Some(name.to_string());
                    }
                }
                self.emit(Event::Comment(text));
            }
            Token::Bailout { reason } => self.bail_out(reason),
            Token::Pragma { key, enabled } => {
                if key == "strict" {
                    self.strict = enabled;
                }
                self.emit(Event::Pragma { key, enabled });
            }
            Token::BlockFence { closing } => {
                let text = if closing { "..." } else { "---" };
                self.emit(Event::Extra(text.to_string()));
            }
            Token::Unknown { text } => self.emit(Event::Extra(text)),
        }
    }

    fn assign_id(&mut self, explicit: Option<u64>, mismatches: &mut Vec<Mismatch>) -> u64 {
        let expected = self.next_id;
        let id = explicit.unwrap_or(expected);
        if id != expected {
            mismatches.push(Mismatch::IdOutOfSequence {
                expected,
                found: id,
            });
        }
        if matches!(&self.plan, Some(plan) if plan.end == 0) {
            mismatches.push(Mismatch::TestAfterSkipAll { id });
        }
        self.next_id = id.saturating_add(1);
        id
    }

    fn begin_point(&mut self, line: PointLine) {
        let mut mismatches = Vec::new();
        let id = self.assign_id(line.id, &mut mismatches);

        let mut point = TestPoint::new(line.ok, id, line.description);
        point.directive = line.directive;
        point.time = line.time;

        if let Some(subtest) = self.closed_child.take() {
            if point.name.is_empty() {
                point.name = subtest.name.clone();
            }
            if subtest.summary.ok != line.ok {
                mismatches.push(Mismatch::SubtestOutcome {
                    name: subtest.name.clone(),
                    line_ok: line.ok,
                });
            }
            point.ok = subtest.summary.ok;
            point.subtest = Some(subtest);
        }
        point.fullname = join_names(&self.scope_path(), &point.name);

        self.pending = Some(PendingPoint {
            point,
            block: None,
            mismatches,
        });
    }

    /// Emit the held test point, decoding its diagnostic block if it has a
    /// closed one.
    fn flush_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let mut point = pending.point;
        if let Some(block) = pending.block {
            if block.closed {
                match yamlish::decode(&block.lines.join("\n")) {
                    Ok(value) => point.diag = Some(value),
                    Err(error) => {
                        debug!(id = point.id, %error, "undecodable diagnostic block");
                        point.diag_error = Some(error);
                    }
                }
            } else {
                debug!(id = point.id, "diagnostic block not terminated");
                point.diag_error = Some(DiagnosticError::Unterminated);
            }
        }
        let point = self.emit_point(point, pending.mismatches);
        self.after_point(&point);
    }

    fn emit_point(&mut self, point: TestPoint, mismatches: Vec<Mismatch>) -> Arc<TestPoint> {
        let point = Arc::new(point);
        self.count += 1;
        self.emit(Event::Assert(Arc::clone(&point)));
        self.emit(Event::Result(Arc::clone(&point)));
        if point.is_skip() {
            self.emit(Event::Skip(Arc::clone(&point)));
        } else if point.is_todo() {
            self.emit(Event::Todo(Arc::clone(&point)));
        }
        for mismatch in mismatches {
            self.mismatch(mismatch);
        }
        point
    }

    fn after_point(&mut self, point: &TestPoint) {
        if self.options.bail && point.is_failure() {
            self.bail_out(point.name.clone());
            return;
        }
        self.check_plan_satisfied();
    }

    fn check_plan_satisfied(&mut self) {
        let expected = self.plan.as_ref().map(Plan::expected_count);
        if self.options.bail && expected == Some(self.count) {
            debug!(scope = %self.name, count = self.count, "plan satisfied");
            self.complete();
        }
    }

    fn bail_out(&mut self, reason: String) {
        debug!(scope = %self.name, %reason, "bail out");
        self.emit(Event::Bailout(reason));
        self.complete();
    }

    /// Flush everything still open at end of input and complete.
    fn finish(&mut self) {
        if self.is_complete() {
            return;
        }
        self.flush_pending();
        if self.is_complete() {
            return;
        }
        if let Some(reason) = self.close_child() {
            self.bail_out(reason);
            return;
        }
        self.settle_closed_child();
        self.complete();
    }

    fn complete(&mut self) {
        if self.is_complete() {
            return;
        }
        // After a bailout nothing but the completion follows.
        if !self.aggregator.bailed_out() {
            if let Some(mismatch) = self.aggregator.reconcile() {
                self.mismatch(mismatch);
            }
        }
        let summary = self.aggregator.finish();
        self.state = State::Complete;
        self.summary = Some(summary.clone());
        self.emit(Event::Complete(summary));
    }
}

fn join_names(path: &str, name: &str) -> String {
    match (path.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => path.to_string(),
        (false, false) => format!("{} > {}", path, name),
    }
}

/// Parse a complete document and return every event.
pub fn parse(input: &str, options: &ParseOptions) -> Vec<Event> {
    let mut parser = Parser::new(*options);
    parser.write(input);
    parser.end();
    let events = parser.events().collect();
    events
}

/// Parse a complete document and return only its summary.
pub fn parse_summary(input: &str, options: &ParseOptions) -> FinalSummary {
    let mut parser = Parser::new(*options);
    parser.write(input);
    parser.end();
    parser.summary().cloned().unwrap_or_default()
}
