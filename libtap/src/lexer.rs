//! Phase 2: Line Classifier
//!
//! The classifier maps one line, with its indentation already stripped, to a
//! token. It is a pure function: it knows nothing about parser state, so the
//! same text always yields the same token. Routing by indentation and
//! deciding whether a fence belongs to a test point is the parser's job.

use crate::result::{Directive, DirectiveKind, Plan};

/// A classified line.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `TAP version N`
    Version { number: u32 },
    /// `start..end`, optionally `# SKIP reason` or `# comment`
    Plan(Plan),
    /// `ok` / `not ok` line
    TestPoint(PointLine),
    /// `# text`
    Comment { text: String },
    /// `Bail out! reason`
    Bailout { reason: String },
    /// `pragma +key` / `pragma -key`
    Pragma { key: String, enabled: bool },
    /// `---` (opening) or `...` (closing)
    BlockFence { closing: bool },
    /// Anything else.
    Unknown { text: String },
}

/// Fields of a test point line.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLine {
    pub ok: bool,
    pub id: Option<u64>,
    pub description: String,
    pub directive: Option<Directive>,
    pub time: Option<f64>,
}

/// What follows an unescaped ` # ` on a test point line.
enum Trailer {
    Directive(Directive),
    Time(f64),
}

/// Classify a single indentation-stripped line.
pub fn classify(text: &str) -> Token {
    let line = text.trim_end();

    if let Some(reason) = strip_prefix_ignore_case(line, "bail out!") {
        return Token::Bailout {
            reason: reason.trim().to_string(),
        };
    }
    if let Some(number) = parse_version(line) {
        return Token::Version { number };
    }
    if let Some(plan) = parse_plan(line) {
        return Token::Plan(plan);
    }
    if let Some(point) = parse_point(line) {
        return Token::TestPoint(point);
    }
    if let Some((key, enabled)) = parse_pragma(line) {
        return Token::Pragma { key, enabled };
    }
    match line {
        "---" => return Token::BlockFence { closing: false },
        "..." => return Token::BlockFence { closing: true },
        _ => {}
    }
    if line.starts_with('#') {
        return Token::Comment {
            text: line.to_string(),
        };
    }
    Token::Unknown {
        text: text.to_string(),
    }
}

/// Name announced by a `# Subtest: <name>` comment.
pub fn subtest_name(comment: &str) -> Option<&str> {
    let rest = comment.strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("Subtest")?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix(':').map(str::trim)
}

/// Milliseconds from a `# time=<n>ms` comment.
pub fn comment_time(comment: &str) -> Option<f64> {
    parse_time(comment.strip_prefix('#')?.trim())
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

fn parse_version(line: &str) -> Option<u32> {
    let rest = strip_prefix_ignore_case(line, "tap version ")?;
    let digits = rest.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Split a leading run of ASCII digits off `s`.
fn leading_number(s: &str) -> Option<(u64, &str)> {
    let len = s.bytes().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    let n = s[..len].parse().ok()?;
    Some((n, &s[len..]))
}

fn parse_plan(line: &str) -> Option<Plan> {
    let (start, rest) = leading_number(line)?;
    let rest = rest.strip_prefix("..")?;
    let (end, rest) = leading_number(rest)?;
    if start > end && end != 0 {
        return None;
    }

    let mut plan = Plan::new(start, end);
    let rest = rest.trim();
    if rest.is_empty() {
        return Some(plan);
    }
    let comment = rest.strip_prefix('#')?.trim();
    match split_keyword(comment) {
        Some((DirectiveKind::Skip, reason)) => plan.skip_reason = Some(reason.to_string()),
        _ if comment.is_empty() => {}
        _ => plan.comment = Some(comment.to_string()),
    }
    Some(plan)
}

fn parse_point(line: &str) -> Option<PointLine> {
    let (ok, rest) = if let Some(rest) = line.strip_prefix("not ok") {
        (false, rest)
    } else if let Some(rest) = line.strip_prefix("ok") {
        (true, rest)
    } else {
        return None;
    };
    if !(rest.is_empty() || rest.starts_with([' ', '\t'])) {
        return None;
    }
    let mut rest = rest.trim_start();

    let mut id = None;
    if let Some((n, after)) = leading_number(rest) {
        if after.is_empty() || after.starts_with([' ', '\t']) {
            id = Some(n);
            rest = after.trim_start();
        }
    }
    if rest == "-" {
        rest = "";
    } else if let Some(after) = rest.strip_prefix("- ") {
        rest = after.trim_start();
    }

    let mut point = PointLine {
        ok,
        id,
        description: String::new(),
        directive: None,
        time: None,
    };
    let description = match find_trailer(rest) {
        Some((at, Trailer::Directive(directive))) => {
            point.directive = Some(directive);
            &rest[..at]
        }
        Some((at, Trailer::Time(ms))) => {
            point.time = Some(ms);
            &rest[..at]
        }
        None => rest,
    };
    point.description = unescape_description(description.trim_end());
    Some(point)
}

/// Find the first unescaped `#` that starts a directive or time trailer.
///
/// A `#` only counts when it begins the text or follows whitespace, so
/// `issue#12` stays part of the description.
fn find_trailer(rest: &str) -> Option<(usize, Trailer)> {
    let bytes = rest.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'#' => {
                let at_boundary = i == 0 || matches!(bytes[i - 1], b' ' | b'\t');
                if at_boundary {
                    if let Some(trailer) = parse_trailer(&rest[i + 1..]) {
                        return Some((i, trailer));
                    }
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

fn parse_trailer(after_hash: &str) -> Option<Trailer> {
    let text = after_hash.trim();
    if let Some((kind, reason)) = split_keyword(text) {
        return Some(Trailer::Directive(Directive {
            kind,
            reason: reason.to_string(),
        }));
    }
    parse_time(text).map(Trailer::Time)
}

/// Match `skip\S*` / `todo\S*` (any case) and return the remaining reason.
fn split_keyword(text: &str) -> Option<(DirectiveKind, &str)> {
    let word_len = text
        .find(|c: char| c.is_whitespace() || c == ':')
        .unwrap_or(text.len());
    let word = &text[..word_len];
    let kind = if strip_prefix_ignore_case(word, "skip").is_some() {
        DirectiveKind::Skip
    } else if strip_prefix_ignore_case(word, "todo").is_some() {
        DirectiveKind::Todo
    } else {
        return None;
    };
    let reason = text[word_len..].trim_start();
    let reason = reason.strip_prefix(':').unwrap_or(reason).trim();
    Some((kind, reason))
}

/// Parse `time=12ms`, `time=1.5s`, or a bare `time=12`.
fn parse_time(text: &str) -> Option<f64> {
    let value = text.strip_prefix("time=")?;
    let (number, scale) = if let Some(n) = value.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix('s') {
        (n, 1000.0)
    } else {
        (value, 1.0)
    };
    let ms: f64 = number.parse().ok()?;
    if ms.is_finite() && ms >= 0.0 {
        Some(ms * scale)
    } else {
        None
    }
}

fn parse_pragma(line: &str) -> Option<(String, bool)> {
    let rest = line.strip_prefix("pragma ")?.trim();
    let enabled = match rest.chars().next()? {
        '+' => true,
        '-' => false,
        _ => return None,
    };
    let key = &rest[1..];
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then(|| (key.to_string(), enabled))
}

/// Undo `\#` and `\\` escapes in a description.
fn unescape_description(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('#' | '\\')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Escape a name so that it classifies back to the same description.
pub fn escape_description(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '#' => out.push_str("\\#"),
            '\\' => out.push_str("\\\\"),
            '\n' | '\r' => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(text: &str) -> PointLine {
        match classify(text) {
            Token::TestPoint(p) => p,
            other => panic!("expected test point, got {:?}", other),
        }
    }

    #[test]
    fn test_version() {
        assert_eq!(classify("TAP version 14"), Token::Version { number: 14 });
        assert_eq!(classify("TAP version 13  "), Token::Version { number: 13 });
        assert!(matches!(classify("TAP version x"), Token::Unknown { .. }));
    }

    #[test]
    fn test_plan() {
        assert_eq!(classify("1..3"), Token::Plan(Plan::new(1, 3)));
        let Token::Plan(plan) = classify("1..0 # SKIP no database") else {
            panic!("expected plan");
        };
        assert_eq!(plan.skip_reason.as_deref(), Some("no database"));
        assert!(plan.skip_all());
        let Token::Plan(plan) = classify("1..2 # generated") else {
            panic!("expected plan");
        };
        assert_eq!(plan.comment.as_deref(), Some("generated"));
        assert!(matches!(classify("5..2"), Token::Unknown { .. }));
        assert!(matches!(classify("1..2 trailing"), Token::Unknown { .. }));
    }

    #[test]
    fn test_point_basic() {
        let p = point("ok 1 - widget works");
        assert!(p.ok);
        assert_eq!(p.id, Some(1));
        assert_eq!(p.description, "widget works");

        let p = point("not ok 3 - widget breaks");
        assert!(!p.ok);
        assert_eq!(p.id, Some(3));

        let p = point("ok");
        assert_eq!(p.id, None);
        assert_eq!(p.description, "");

        let p = point("ok no number here");
        assert_eq!(p.id, None);
        assert_eq!(p.description, "no number here");
    }

    #[test]
    fn test_point_requires_word_boundary() {
        assert!(matches!(classify("okay then"), Token::Unknown { .. }));
        assert!(matches!(classify("not okay"), Token::Unknown { .. }));
    }

    #[test]
    fn test_skip_without_message() {
        let p = point("ok 1 # Skip");
        assert_eq!(p.description, "");
        assert_eq!(p.directive, Some(Directive::skip("")));
    }

    #[test]
    fn test_directives() {
        let p = point("not ok 2 - flaky # TODO fix the race");
        assert_eq!(p.description, "flaky");
        assert_eq!(p.directive, Some(Directive::todo("fix the race")));

        let p = point("ok 4 # skipped: no network");
        assert_eq!(p.directive, Some(Directive::skip("no network")));

        let p = point("ok 5 - issue#12 fixed");
        assert_eq!(p.description, "issue#12 fixed");
        assert_eq!(p.directive, None);

        let p = point("ok 6 - not a # directive");
        assert_eq!(p.description, "not a # directive");
    }

    #[test]
    fn test_escaped_hash() {
        let p = point("ok 1 - hash \\# SKIP stays");
        assert_eq!(p.description, "hash # SKIP stays");
        assert_eq!(p.directive, None);
        assert_eq!(escape_description("hash # SKIP stays"), "hash \\# SKIP stays");
    }

    #[test]
    fn test_time_trailer() {
        let p = point("ok 1 - subtest # time=12.5ms");
        assert_eq!(p.time, Some(12.5));
        assert_eq!(p.description, "subtest");
        assert_eq!(comment_time("# time=2s"), Some(2000.0));
    }

    #[test]
    fn test_bailout() {
        assert_eq!(
            classify("Bail out! network down"),
            Token::Bailout {
                reason: "network down".into()
            }
        );
        assert_eq!(
            classify("Bail out!"),
            Token::Bailout {
                reason: String::new()
            }
        );
    }

    #[test]
    fn test_pragma_fence_comment_unknown() {
        assert_eq!(
            classify("pragma +strict"),
            Token::Pragma {
                key: "strict".into(),
                enabled: true
            }
        );
        assert_eq!(classify("---"), Token::BlockFence { closing: false });
        assert_eq!(classify("..."), Token::BlockFence { closing: true });
        assert_eq!(
            classify("# hello"),
            Token::Comment {
                text: "# hello".into()
            }
        );
        assert_eq!(
            classify("random output"),
            Token::Unknown {
                text: "random output".into()
            }
        );
    }

    #[test]
    fn test_subtest_name() {
        assert_eq!(subtest_name("# Subtest: database"), Some("database"));
        assert_eq!(subtest_name("# Subtest"), Some(""));
        assert_eq!(subtest_name("# Subtests are fun"), None);
        assert_eq!(subtest_name("# hello"), None);
    }
}
