//! Diagnostic blocks: the YAML subset carried between `---` and `...`.
//!
//! Decoding works on the lines between the fences, with the fence's own
//! indentation already removed. Supported:
//! - Block mappings and block sequences, nested to any depth
//! - Compact sequence items (`- key: value`, `- - item`)
//! - Plain, single-quoted and double-quoted scalars
//! - `null`/`~`, booleans, integers, floats (`.inf`, `.nan`)
//! - Literal (`|`, `|-`, `|+`) and folded (`>`) block scalars
//! - Flow collections (`[a, b]`, `{k: v}`)
//! - `#` comments
//!
//! Anchors, tags, multi-document streams and multi-line plain scalars are
//! not supported. The encoder only produces constructs the decoder reads, so
//! `decode(&encode(v)?)` returns `v` for every mapping without NaN.

use crate::error::{DiagnosticError, EncodeError};
use crate::value::Value;
use num_bigint::BigInt;
use num_traits::Num;

type Result<T> = std::result::Result<T, DiagnosticError>;

// =============================================================================
// Decoder
// =============================================================================

/// Decode the body of a diagnostic block. The root must be a mapping; an
/// empty body decodes to an empty mapping.
pub fn decode(text: &str) -> Result<Value> {
    let mut decoder = Decoder::new(text)?;
    decoder.skip_blank();
    let Some(first) = decoder.current() else {
        return Ok(Value::empty_mapping());
    };

    let root = decoder.parse_node(first.indent)?;
    decoder.skip_blank();
    if let Some(extra) = decoder.current() {
        return Err(DiagnosticError::UnexpectedIndent { line: extra.number });
    }
    match root {
        Value::Mapping(_) => Ok(root),
        _ => Err(DiagnosticError::NotAMapping),
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry<'a> {
    /// Raw line, for block scalars.
    raw: &'a str,
    indent: usize,
    /// Text after the indentation, trailing whitespace removed.
    content: &'a str,
    /// One-based line number.
    number: usize,
}

impl Entry<'_> {
    fn is_blank(&self) -> bool {
        self.content.is_empty() || self.content.starts_with('#')
    }
}

struct Decoder<'a> {
    entries: Vec<Entry<'a>>,
    pos: usize,
}

/// Block scalar header: `|` or `>` with optional chomping indicator.
#[derive(Debug, Clone, Copy)]
struct BlockHeader {
    folded: bool,
    chomp: Chomp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chomp {
    Clip,
    Strip,
    Keep,
}

impl<'a> Decoder<'a> {
    fn new(text: &'a str) -> Result<Self> {
        let mut entries = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let ws = raw.len() - raw.trim_start().len();
            let content = raw[ws..].trim_end();
            if !content.is_empty() && raw[..ws].contains('\t') {
                return Err(DiagnosticError::TabNotAllowed { line: i + 1 });
            }
            entries.push(Entry {
                raw,
                indent: ws,
                content,
                number: i + 1,
            });
        }
        Ok(Self { entries, pos: 0 })
    }

    fn skip_blank(&mut self) {
        while self.pos < self.entries.len() && self.entries[self.pos].is_blank() {
            self.pos += 1;
        }
    }

    /// Current entry, assuming blanks were skipped.
    fn current(&self) -> Option<Entry<'a>> {
        self.entries.get(self.pos).copied()
    }

    /// Next non-blank entry.
    fn next_content(&mut self) -> Option<Entry<'a>> {
        self.skip_blank();
        self.current()
    }

    /// Parse the node starting at the current entry, which sits at `indent`.
    fn parse_node(&mut self, indent: usize) -> Result<Value> {
        let Some(entry) = self.next_content() else {
            return Ok(Value::Null);
        };
        if is_seq_item(entry.content) {
            return self.parse_sequence(indent);
        }
        if split_key(entry.content, entry.number)?.is_some() {
            return self.parse_mapping(indent);
        }
        self.pos += 1;
        parse_inline(entry.content, entry.number)
    }

    fn parse_mapping(&mut self, indent: usize) -> Result<Value> {
        let mut entries: Vec<(String, Value)> = Vec::new();

        while let Some(entry) = self.next_content() {
            if entry.indent < indent {
                break;
            }
            if entry.indent > indent {
                return Err(DiagnosticError::UnexpectedIndent { line: entry.number });
            }
            let (key, rest) = split_key(entry.content, entry.number)?
                .ok_or(DiagnosticError::ExpectedKey { line: entry.number })?;
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(DiagnosticError::DuplicateKey {
                    key,
                    line: entry.number,
                });
            }
            self.pos += 1;
            let value = self.parse_value_after_key(rest, indent, entry.number)?;
            entries.push((key, value));
        }

        Ok(Value::Mapping(entries))
    }

    /// Parse what follows `key:` on a line at `indent`.
    fn parse_value_after_key(&mut self, rest: &'a str, indent: usize, line: usize) -> Result<Value> {
        let rest = rest.trim();
        if rest.is_empty() || rest.starts_with('#') {
            return match self.next_content() {
                Some(next) if next.indent > indent => self.parse_node(next.indent),
                // YAML allows a sequence at the same indentation as its key
                Some(next) if next.indent == indent && is_seq_item(next.content) => {
                    self.parse_sequence(indent)
                }
                _ => Ok(Value::Null),
            };
        }
        if let Some(header) = block_header(rest) {
            return Ok(self.parse_block_scalar(indent, header));
        }
        parse_inline(rest, line)
    }

    fn parse_sequence(&mut self, indent: usize) -> Result<Value> {
        let mut items = Vec::new();

        while let Some(entry) = self.next_content() {
            if entry.indent > indent {
                return Err(DiagnosticError::UnexpectedIndent { line: entry.number });
            }
            if entry.indent < indent || !is_seq_item(entry.content) {
                break;
            }

            let after_dash = &entry.content[1..];
            let rest = after_dash.trim_start();
            if rest.is_empty() || rest.starts_with('#') {
                self.pos += 1;
                let item = match self.next_content() {
                    Some(next) if next.indent > indent => self.parse_node(next.indent)?,
                    _ => Value::Null,
                };
                items.push(item);
            } else if is_seq_item(rest) || split_key(rest, entry.number)?.is_some() {
                // Compact nested node: reread the remainder as its own line
                let column = indent + 1 + (after_dash.len() - rest.len());
                self.entries[self.pos].indent = column;
                self.entries[self.pos].content = rest;
                items.push(self.parse_node(column)?);
            } else if let Some(header) = block_header(rest) {
                self.pos += 1;
                items.push(self.parse_block_scalar(indent, header));
            } else {
                self.pos += 1;
                items.push(parse_inline(rest, entry.number)?);
            }
        }

        Ok(Value::Sequence(items))
    }

    /// Collect the lines of a block scalar whose header sat at `parent`.
    fn parse_block_scalar(&mut self, parent: usize, header: BlockHeader) -> Value {
        let mut body: Vec<&str> = Vec::new();
        let mut block_indent = None;

        while let Some(entry) = self.entries.get(self.pos) {
            let raw = entry.raw;
            if raw.trim().is_empty() {
                body.push("");
                self.pos += 1;
                continue;
            }
            let spaces = raw.len() - raw.trim_start_matches(' ').len();
            let wanted = *block_indent.get_or_insert(spaces);
            if spaces <= parent || spaces < wanted {
                break;
            }
            body.push(&raw[wanted..]);
            self.pos += 1;
        }

        // Trailing blank lines only survive `+` chomping
        let trailing = body.iter().rev().take_while(|l| l.is_empty()).count();
        let core = &body[..body.len() - trailing];

        let mut text = if header.folded {
            fold_lines(core)
        } else {
            core.join("\n")
        };
        match header.chomp {
            Chomp::Strip => {}
            Chomp::Clip => {
                if !core.is_empty() {
                    text.push('\n');
                }
            }
            Chomp::Keep => {
                let newlines = if core.is_empty() { trailing } else { trailing + 1 };
                text.push_str(&"\n".repeat(newlines));
            }
        }
        Value::String(text)
    }
}

fn fold_lines(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut after_break = true;
    for line in lines {
        if line.is_empty() {
            out.push('\n');
            after_break = true;
        } else {
            if !after_break {
                out.push(' ');
            }
            out.push_str(line);
            after_break = false;
        }
    }
    out
}

fn is_seq_item(content: &str) -> bool {
    content == "-" || content.starts_with("- ")
}

fn block_header(rest: &str) -> Option<BlockHeader> {
    let indicator = rest.split_whitespace().next()?;
    let after = rest[indicator.len()..].trim();
    if !(after.is_empty() || after.starts_with('#')) {
        return None;
    }
    let (folded, chomp) = match indicator {
        "|" => (false, Chomp::Clip),
        "|-" => (false, Chomp::Strip),
        "|+" => (false, Chomp::Keep),
        ">" => (true, Chomp::Clip),
        ">-" => (true, Chomp::Strip),
        ">+" => (true, Chomp::Keep),
        _ => return None,
    };
    Some(BlockHeader { folded, chomp })
}

/// Split `key: rest` off a line. Returns `None` when the line is not a
/// mapping entry.
fn split_key(content: &str, line: usize) -> Result<Option<(String, &str)>> {
    if content.starts_with(['"', '\'']) {
        let (key, used) = parse_quoted(content, line)?;
        let after = &content[used..];
        let Some(rest) = after.strip_prefix(':') else {
            return Ok(None);
        };
        if rest.is_empty() || rest.starts_with([' ', '\t']) {
            return Ok(Some((key, rest)));
        }
        return Ok(None);
    }
    if content.starts_with(['[', '{', '#']) || is_seq_item(content) {
        return Ok(None);
    }

    let split = match content.find(": ") {
        Some(at) => Some((at, &content[at + 1..])),
        None => content
            .strip_suffix(':')
            .map(|k| (k.len(), "")),
    };
    Ok(split.and_then(|(at, rest)| {
        let key = content[..at].trim_end();
        (!key.is_empty()).then(|| (key.to_string(), rest))
    }))
}

// =============================================================================
// Scalars
// =============================================================================

/// Parse a complete inline value: a quoted or plain scalar, or a flow
/// collection, optionally followed by a comment.
fn parse_inline(text: &str, line: usize) -> Result<Value> {
    let text = text.trim();
    let (value, used) = if text.starts_with(['"', '\'']) {
        let (s, used) = parse_quoted(text, line)?;
        (Value::String(s), used)
    } else if text.starts_with(['[', '{']) {
        let mut flow = Flow { text, pos: 0, line };
        let value = flow.value()?;
        (value, flow.pos)
    } else {
        let plain = match text.find(" #") {
            Some(at) => &text[..at],
            None => text,
        };
        return Ok(resolve_plain(plain.trim()));
    };

    let rest = text[used..].trim_start();
    if rest.is_empty() || rest.starts_with('#') {
        Ok(value)
    } else {
        Err(DiagnosticError::ExtraContent { line })
    }
}

/// Resolve a plain scalar to null, bool, number, or string.
fn resolve_plain(s: &str) -> Value {
    match s {
        "" | "~" | "null" | "Null" | "NULL" => return Value::Null,
        "true" | "True" | "TRUE" => return Value::Bool(true),
        "false" | "False" | "FALSE" => return Value::Bool(false),
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            return Value::Float(f64::INFINITY)
        }
        "-.inf" | "-.Inf" | "-.INF" => return Value::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Value::Float(f64::NAN),
        _ => {}
    }

    if let Some(n) = parse_radix(s) {
        return Value::Integer(n);
    }
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = s.parse::<BigInt>() {
            return Value::Integer(n);
        }
    }
    if looks_like_float(digits) {
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
    }
    Value::String(s.to_string())
}

/// `0x1f` and `0o17` integers.
fn parse_radix(s: &str) -> Option<BigInt> {
    let (radix, digits) = if let Some(hex) = s.strip_prefix("0x") {
        (16, hex)
    } else if let Some(oct) = s.strip_prefix("0o") {
        (8, oct)
    } else {
        return None;
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    BigInt::from_str_radix(digits, radix).ok()
}

fn looks_like_float(s: &str) -> bool {
    let mut seen_digit = false;
    for b in s.bytes() {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' | b'e' | b'E' | b'+' | b'-' => {}
            _ => return false,
        }
    }
    seen_digit && s.starts_with(|c: char| c.is_ascii_digit() || c == '.')
}

/// Parse a quoted scalar at the start of `text`. Returns the string and the
/// number of bytes consumed, quotes included.
fn parse_quoted(text: &str, line: usize) -> Result<(String, usize)> {
    if text.starts_with('\'') {
        return parse_single_quoted(text, line);
    }
    let mut out = String::new();
    let mut chars = text.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, i + 1)),
            '\\' => {
                let (_, esc) = chars
                    .next()
                    .ok_or(DiagnosticError::UnterminatedString { line })?;
                let decoded = match esc {
                    '"' => '"',
                    '\\' => '\\',
                    '/' => '/',
                    ' ' => ' ',
                    '0' => '\0',
                    'a' => '\x07',
                    'b' => '\x08',
                    't' => '\t',
                    'n' => '\n',
                    'v' => '\x0b',
                    'f' => '\x0c',
                    'r' => '\r',
                    'e' => '\x1b',
                    'N' => '\u{85}',
                    '_' => '\u{a0}',
                    'L' => '\u{2028}',
                    'P' => '\u{2029}',
                    'x' | 'u' | 'U' => {
                        let width = match esc {
                            'x' => 2,
                            'u' => 4,
                            _ => 8,
                        };
                        let mut code = 0u32;
                        for _ in 0..width {
                            let digit = chars
                                .next()
                                .and_then(|(_, h)| h.to_digit(16))
                                .ok_or(DiagnosticError::BadEscape { line })?;
                            code = code * 16 + digit;
                        }
                        char::from_u32(code).ok_or(DiagnosticError::BadEscape { line })?
                    }
                    _ => return Err(DiagnosticError::BadEscape { line }),
                };
                out.push(decoded);
            }
            c => out.push(c),
        }
    }
    Err(DiagnosticError::UnterminatedString { line })
}

fn parse_single_quoted(text: &str, line: usize) -> Result<(String, usize)> {
    let mut out = String::new();
    let mut chars = text.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                out.push('\'');
            } else {
                return Ok((out, i + 1));
            }
        } else {
            out.push(c);
        }
    }
    Err(DiagnosticError::UnterminatedString { line })
}

/// Recursive reader for flow collections on a single line.
struct Flow<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Flow<'a> {
    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn invalid(&self) -> DiagnosticError {
        DiagnosticError::InvalidFlow { line: self.line }
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_ws();
        match self.peek() {
            Some('[') => self.sequence(),
            Some('{') => self.mapping(),
            Some('"') | Some('\'') => {
                let (s, used) = parse_quoted(self.rest(), self.line)?;
                self.pos += used;
                Ok(Value::String(s))
            }
            Some(_) => Ok(resolve_plain(self.plain(&[',', ']', '}']))),
            None => Err(self.invalid()),
        }
    }

    /// Take a plain scalar up to the first of `stops`.
    fn plain(&mut self, stops: &[char]) -> &'a str {
        let text = self.text;
        let rest = &text[self.pos..];
        let len = rest.find(|c: char| stops.contains(&c)).unwrap_or(rest.len());
        self.pos += len;
        rest[..len].trim()
    }

    fn sequence(&mut self) -> Result<Value> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(']') {
                self.pos += 1;
                return Ok(Value::Sequence(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {
                    self.pos += 1;
                    return Ok(Value::Sequence(items));
                }
                _ => return Err(self.invalid()),
            }
        }
    }

    fn mapping(&mut self) -> Result<Value> {
        self.pos += 1;
        let mut entries: Vec<(String, Value)> = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Mapping(entries));
            }
            let key = match self.peek() {
                Some('"') | Some('\'') => {
                    let (s, used) = parse_quoted(self.rest(), self.line)?;
                    self.pos += used;
                    s
                }
                Some(_) => self.plain(&[':', ',', '}']).to_string(),
                None => return Err(self.invalid()),
            };
            self.skip_ws();
            if self.peek() != Some(':') {
                return Err(self.invalid());
            }
            self.pos += 1;
            let value = self.value()?;
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(DiagnosticError::DuplicateKey {
                    key,
                    line: self.line,
                });
            }
            entries.push((key, value));
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Mapping(entries));
                }
                _ => return Err(self.invalid()),
            }
        }
    }
}

// =============================================================================
// Encoder
// =============================================================================

/// Encode a mapping as diagnostic block lines, joined with `\n` and without
/// fences or a trailing newline. An empty mapping encodes to an empty string.
pub fn encode(value: &Value) -> std::result::Result<String, EncodeError> {
    match value {
        Value::Mapping(entries) => {
            let mut lines = Vec::new();
            encode_mapping(entries, 0, &mut lines)?;
            Ok(lines.join("\n"))
        }
        other => Err(EncodeError::NotAMapping(kind_name(other))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Integer(_) => "an integer",
        Value::Float(_) => "a float",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
    }
}

fn encode_mapping(
    entries: &[(String, Value)],
    indent: usize,
    lines: &mut Vec<String>,
) -> std::result::Result<(), EncodeError> {
    let pad = " ".repeat(indent);
    for (i, (key, value)) in entries.iter().enumerate() {
        if entries[..i].iter().any(|(k, _)| k == key) {
            return Err(EncodeError::DuplicateKey(key.clone()));
        }
        let head = format!("{}{}:", pad, encode_key(key));
        encode_entry_value(head, value, indent, lines)?;
    }
    Ok(())
}

fn encode_sequence(
    items: &[Value],
    indent: usize,
    lines: &mut Vec<String>,
) -> std::result::Result<(), EncodeError> {
    let pad = " ".repeat(indent);
    for item in items {
        encode_entry_value(format!("{}-", pad), item, indent, lines)?;
    }
    Ok(())
}

/// Write `head` (a `key:` or `-`) followed by its value.
fn encode_entry_value(
    head: String,
    value: &Value,
    indent: usize,
    lines: &mut Vec<String>,
) -> std::result::Result<(), EncodeError> {
    match value {
        Value::Mapping(entries) if entries.is_empty() => lines.push(format!("{} {{}}", head)),
        Value::Sequence(items) if items.is_empty() => lines.push(format!("{} []", head)),
        Value::Mapping(entries) => {
            lines.push(head);
            encode_mapping(entries, indent + 2, lines)?;
        }
        Value::Sequence(items) => {
            lines.push(head);
            encode_sequence(items, indent + 2, lines)?;
        }
        Value::String(s) if literal_style(s).is_some() => {
            let indicator = literal_style(s).unwrap_or("|-");
            lines.push(format!("{} {}", head, indicator));
            let pad = " ".repeat(indent + 2);
            for line in s.strip_suffix('\n').unwrap_or(s).split('\n') {
                if line.is_empty() {
                    lines.push(String::new());
                } else {
                    lines.push(format!("{}{}", pad, line));
                }
            }
        }
        scalar => lines.push(format!("{} {}", head, encode_scalar(scalar))),
    }
    Ok(())
}

/// Literal block indicator for a multi-line string, or `None` when the
/// string must be double-quoted instead.
fn literal_style(s: &str) -> Option<&'static str> {
    if !s.contains('\n') || s.ends_with("\n\n") {
        return None;
    }
    let body = s.strip_suffix('\n');
    let text = body.unwrap_or(s);
    let first = text.split('\n').next().unwrap_or("");
    if first.is_empty() || first.starts_with([' ', '\t']) {
        return None;
    }
    let clean = text.split('\n').all(|line| {
        line == line.trim_end() && !line.chars().any(|c| c.is_control() && c != '\t')
    });
    if !clean || text.contains('\t') {
        return None;
    }
    Some(if body.is_some() { "|" } else { "|-" })
}

fn encode_scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Float(f) => {
            if f.is_nan() {
                ".nan".to_string()
            } else if f.is_infinite() {
                if *f > 0.0 {
                    ".inf".to_string()
                } else {
                    "-.inf".to_string()
                }
            } else {
                let s = format!("{}", f);
                if s.contains('.') || s.contains('e') {
                    s
                } else {
                    format!("{}.0", s)
                }
            }
        }
        Value::String(s) => encode_string(s),
        // Collections are handled by the block encoders
        Value::Sequence(_) | Value::Mapping(_) => String::new(),
    }
}

fn encode_key(key: &str) -> String {
    encode_string(key)
}

fn encode_string(s: &str) -> String {
    if is_plain_safe(s) {
        s.to_string()
    } else {
        encode_double_quoted(s)
    }
}

/// Whether `s` reads back as the same string when written unquoted.
fn is_plain_safe(s: &str) -> bool {
    const INDICATORS: &[char] = &[
        '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%',
        '@', '`', '.', '~', '+',
    ];
    !s.is_empty()
        && s == s.trim()
        && !s.starts_with(INDICATORS)
        && !s.chars().any(char::is_control)
        && !s.contains(": ")
        && !s.contains(" #")
        && !s.ends_with(':')
        && matches!(resolve_plain(s), Value::String(_))
}

fn encode_double_quoted(s: &str) -> String {
    let mut out = String::from("\"");
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: Vec<(&str, Value)>) -> Value {
        Value::Mapping(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn test_decode_flat_mapping() {
        let value = decode("message: widget broke\nseverity: fail\ncount: 3\nratio: 0.5").unwrap();
        assert_eq!(
            value,
            map(vec![
                ("message", "widget broke".into()),
                ("severity", "fail".into()),
                ("count", 3i64.into()),
                ("ratio", 0.5.into()),
            ])
        );
    }

    #[test]
    fn test_decode_empty_block() {
        assert_eq!(decode("").unwrap(), Value::empty_mapping());
        assert_eq!(decode("# only a comment\n").unwrap(), Value::empty_mapping());
    }

    #[test]
    fn test_decode_nested() {
        let text = "\
found:
  - 1
  - two
wanted:
  a: true
  b: ~
at:
- file: test.js
  line: 12
- file: lib.js
  line: 3
";
        let value = decode(text).unwrap();
        assert_eq!(
            value.get("found"),
            Some(&Value::Sequence(vec![1i64.into(), "two".into()]))
        );
        assert_eq!(
            value.get("wanted"),
            Some(&map(vec![("a", true.into()), ("b", Value::Null)]))
        );
        assert_eq!(
            value.get("at"),
            Some(&Value::Sequence(vec![
                map(vec![("file", "test.js".into()), ("line", 12i64.into())]),
                map(vec![("file", "lib.js".into()), ("line", 3i64.into())]),
            ]))
        );
    }

    #[test]
    fn test_decode_quoted_and_flow() {
        let text = "a: \"tab\\there\"\nb: 'it''s'\nc: [1, \"x, y\", []]\nd: {k: v}\n\"odd key\": 1 # note";
        let value = decode(text).unwrap();
        assert_eq!(value.get("a"), Some(&"tab\there".into()));
        assert_eq!(value.get("b"), Some(&"it's".into()));
        assert_eq!(
            value.get("c"),
            Some(&Value::Sequence(vec![
                1i64.into(),
                "x, y".into(),
                Value::Sequence(vec![])
            ]))
        );
        assert_eq!(value.get("d"), Some(&map(vec![("k", "v".into())])));
        assert_eq!(value.get("odd key"), Some(&1i64.into()));
    }

    #[test]
    fn test_decode_block_scalars() {
        let text = "stack: |\n  at one\n    at two\n\n  at three\nfolded: >-\n  a\n  b\n\n  c\nnext: 1";
        let value = decode(text).unwrap();
        assert_eq!(
            value.get("stack"),
            Some(&"at one\n  at two\n\nat three\n".into())
        );
        assert_eq!(value.get("folded"), Some(&"a b\nc".into()));
        assert_eq!(value.get("next"), Some(&1i64.into()));
    }

    #[test]
    fn test_decode_big_integer() {
        let value = decode("n: 123456789012345678901234567890").unwrap();
        let expected: BigInt = "123456789012345678901234567890".parse().unwrap();
        assert_eq!(value.get("n"), Some(&Value::Integer(expected)));

        let value = decode("hex: 0x1f\noct: 0o17\nnot: 0xzz").unwrap();
        assert_eq!(value.get("hex").and_then(Value::as_i64), Some(31));
        assert_eq!(value.get("oct").and_then(Value::as_i64), Some(15));
        assert_eq!(value.get("not"), Some(&Value::from("0xzz")));
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            decode("a: 1\n    b: 2"),
            Err(DiagnosticError::UnexpectedIndent { line: 2 })
        );
        assert_eq!(
            decode("a: 1\na: 2"),
            Err(DiagnosticError::DuplicateKey {
                key: "a".into(),
                line: 2
            })
        );
        assert_eq!(
            decode("a: \"open"),
            Err(DiagnosticError::UnterminatedString { line: 1 })
        );
        assert_eq!(
            decode("a: 1\njust text"),
            Err(DiagnosticError::ExpectedKey { line: 2 })
        );
        assert_eq!(decode("- 1\n- 2"), Err(DiagnosticError::NotAMapping));
        assert_eq!(
            decode("a:\n\t- 1"),
            Err(DiagnosticError::TabNotAllowed { line: 2 })
        );
        assert_eq!(
            decode("a: \"bad \\q\""),
            Err(DiagnosticError::BadEscape { line: 1 })
        );
        assert_eq!(
            decode("a: [1, 2"),
            Err(DiagnosticError::InvalidFlow { line: 1 })
        );
    }

    #[test]
    fn test_encode_layout() {
        let value = map(vec![
            ("message", "widget broke".into()),
            ("found", Value::Sequence(vec![1i64.into(), "two".into()])),
            ("wanted", map(vec![("ok", true.into())])),
            ("empty", Value::Sequence(vec![])),
            ("stack", "at one\nat two\n".into()),
        ]);
        let expected = "\
message: widget broke
found:
  - 1
  - two
wanted:
  ok: true
empty: []
stack: |
  at one
  at two";
        assert_eq!(encode(&value).unwrap(), expected);
    }

    #[test]
    fn test_encode_quotes_ambiguous_strings() {
        let value = map(vec![
            ("a", "true".into()),
            ("b", "12".into()),
            ("c", "key: value".into()),
            ("d", "".into()),
            ("e", " padded".into()),
            ("f", "- dash".into()),
            ("g", "a\n\n".into()),
        ]);
        assert_eq!(
            encode(&value).unwrap(),
            "a: \"true\"\nb: \"12\"\nc: \"key: value\"\nd: \"\"\ne: \" padded\"\nf: \"- dash\"\ng: \"a\\n\\n\""
        );
    }

    #[test]
    fn test_encode_then_decode_preserves_value() {
        let value = map(vec![
            ("message", "it's \"quoted\" # not a comment".into()),
            ("tabs", "a\tb".into()),
            ("float", 2.0.into()),
            ("neg", (-0.25).into()),
            ("inf", f64::INFINITY.into()),
            ("nothing", Value::Null),
            (
                "items",
                Value::Sequence(vec![
                    map(vec![("x", 1i64.into()), ("y", Value::Sequence(vec![]))]),
                    Value::Sequence(vec!["nested".into(), false.into()]),
                    "multi\n  line".into(),
                ]),
            ),
            ("weird key: yes", "~".into()),
            ("url", "http://example.com/a#b".into()),
        ]);
        let text = encode(&value).unwrap();
        assert_eq!(decode(&text).unwrap(), value);
    }

    #[test]
    fn test_encode_errors() {
        assert_eq!(
            encode(&Value::Sequence(vec![])),
            Err(EncodeError::NotAMapping("a sequence"))
        );
        let dup = Value::Mapping(vec![
            ("a".into(), Value::Null),
            ("a".into(), Value::Null),
        ]);
        assert_eq!(encode(&dup), Err(EncodeError::DuplicateKey("a".into())));
    }
}
