//! Test harness for the TAP parser against fixture files.
//!
//! This test harness reads all .tap files from the test/tap/ directory and
//! parses them under every combination of strict and bail mode, comparing
//! the summary against the expectations in the matching .summary file.
//!
//! A .summary file holds `key: value` lines. A key prefixed with a
//! configuration name (`bail.total: 2`) overrides the plain key for that
//! configuration; `strict_bail` layers `bail`, then `strict`, then its own
//! keys.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use libtap::{
    parse, parse_summary, stringify, Event, FinalSummary, ParseOptions, Parser, StringifyOptions,
};

/// Configuration names and the override layers they read.
const CONFIGS: [(&str, &[&str]); 4] = [
    ("default", &[]),
    ("strict", &["strict"]),
    ("bail", &["bail"]),
    ("strict_bail", &["bail", "strict", "strict_bail"]),
];

fn options_for(config: &str) -> ParseOptions {
    ParseOptions {
        strict: config.contains("strict"),
        bail: config.contains("bail"),
        ..ParseOptions::default()
    }
}

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("test")
}

/// Get all .tap test files from the test/tap/ directory.
fn get_tap_files() -> Vec<PathBuf> {
    let pattern = test_root().join("tap").join("*.tap");
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .expect("valid glob pattern")
        .flatten()
        .collect();
    files.sort();
    files
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

/// Read the expectation lines for a .tap file.
fn read_expectations(tap_path: &Path) -> Option<Vec<(String, String)>> {
    let content = fs::read_to_string(tap_path.with_extension("summary")).ok()?;
    Some(
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .collect(),
    )
}

/// Resolve the expectations that apply to one configuration.
fn expected_for(entries: &[(String, String)], layers: &[&str]) -> HashMap<String, String> {
    let mut expected: HashMap<String, String> = entries
        .iter()
        .filter(|(key, _)| !key.contains('.'))
        .cloned()
        .collect();
    for layer in layers {
        let prefix = format!("{}.", layer);
        for (key, value) in entries {
            if let Some(field) = key.strip_prefix(&prefix) {
                expected.insert(field.to_string(), value.clone());
            }
        }
    }
    expected
}

fn failure_ids(summary: &FinalSummary) -> String {
    summary
        .failures
        .iter()
        .map(|p| p.id.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn actual_field(summary: &FinalSummary, key: &str) -> Option<String> {
    let counts = &summary.counts;
    Some(match key {
        "ok" => summary.ok.to_string(),
        "pass" => counts.pass.to_string(),
        "fail" => counts.fail.to_string(),
        "skip" => counts.skip.to_string(),
        "todo" => counts.todo.to_string(),
        "total" => counts.total.to_string(),
        "plan" => summary
            .plan
            .as_ref()
            .map_or("none".to_string(), |p| format!("{}..{}", p.start, p.end)),
        "bailout" => summary.bailout.clone().unwrap_or_else(|| "none".to_string()),
        "failures" => failure_ids(summary),
        "mismatches" => summary.mismatches.len().to_string(),
        "time" => summary.time.map_or("none".to_string(), |t| t.to_string()),
        _ => return None,
    })
}

/// Run a single fixture under one configuration.
fn run_tap_test(path: &Path, config: &str, layers: &[&str]) -> Result<(), String> {
    let name = file_name(path);
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", name, e))?;
    let entries = read_expectations(path)
        .ok_or_else(|| format!("{}: missing .summary file", name))?;

    let summary = parse_summary(&content, &options_for(config));
    let mut keys: Vec<_> = expected_for(&entries, layers).into_iter().collect();
    keys.sort();
    for (key, expected) in keys {
        let actual = actual_field(&summary, &key)
            .ok_or_else(|| format!("{}: unknown expectation key {:?}", name, key))?;
        if actual != expected {
            return Err(format!(
                "{} [{}]: {} mismatch\n  Expected: {}\n  Actual:   {}",
                name, config, key, expected, actual
            ));
        }
    }
    Ok(())
}

/// Serialize a fixture's events, re-parse the output, and compare.
fn run_roundtrip_test(path: &Path, config: &str) -> Result<(), String> {
    let name = file_name(path);
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", name, e))?;
    let options = options_for(config);

    let events = parse(&content, &options);
    let original = events
        .last()
        .and_then(Event::as_summary)
        .cloned()
        .ok_or_else(|| format!("{} [{}]: no complete event", name, config))?;
    let text = stringify(&events, &StringifyOptions::default())
        .map_err(|e| format!("{} [{}]: stringify failed: {}", name, config, e))?;
    let reparsed = parse_summary(&text, &options);

    let same = original.counts == reparsed.counts
        && original.plan == reparsed.plan
        && original.bailout == reparsed.bailout
        && failure_ids(&original) == failure_ids(&reparsed);
    if !same {
        return Err(format!(
            "{} [{}]: round-trip changed the summary\n  Original: {:?}\n  Reparsed: {:?}\n  Output:\n{}",
            name,
            config,
            (original.counts, &original.plan, &original.bailout),
            (reparsed.counts, &reparsed.plan, &reparsed.bailout),
            text.lines()
                .map(|l| format!("    {}", l))
                .collect::<Vec<_>>()
                .join("\n")
        ));
    }
    Ok(())
}

fn report(kind: &str, passed: usize, errors: &[String]) {
    println!("\n{} results: {} passed, {} failed", kind, passed, errors.len());
    if !errors.is_empty() {
        println!("\nErrors:");
        for error in errors {
            println!("  - {}", error);
        }
    }
}

#[test]
fn test_all_tap_fixtures() {
    let files = get_tap_files();
    assert!(!files.is_empty(), "no .tap fixtures found");

    println!("\nRunning {} TAP fixtures:", files.len());

    let mut passed = 0;
    let mut errors: Vec<String> = Vec::new();
    for path in &files {
        for (config, layers) in CONFIGS {
            match run_tap_test(path, config, layers) {
                Ok(()) => passed += 1,
                Err(e) => errors.push(e),
            }
        }
        println!("  {} => checked", file_name(path));
    }

    report("Fixture", passed, &errors);
    assert!(errors.is_empty(), "{} fixture checks failed", errors.len());
}

#[test]
fn test_roundtrip_all_tap_fixtures() {
    let files = get_tap_files();

    let mut passed = 0;
    let mut errors: Vec<String> = Vec::new();
    for path in &files {
        for (config, _) in CONFIGS {
            match run_roundtrip_test(path, config) {
                Ok(()) => passed += 1,
                Err(e) => errors.push(e),
            }
        }
    }

    report("Round-trip", passed, &errors);
    assert!(errors.is_empty(), "{} round-trip checks failed", errors.len());
}

#[test]
fn test_flat_output_is_consistent() {
    for path in get_tap_files() {
        let content = fs::read_to_string(&path).unwrap();
        let events = parse(&content, &ParseOptions::default());
        let text = stringify(&events, &StringifyOptions { flat: true }).unwrap();
        let summary = parse_summary(&text, &ParseOptions::default());

        let name = file_name(&path);
        assert!(summary.mismatches.is_empty(), "{}: {:?}", name, summary.mismatches);
        let plan = summary.plan.expect("flat output always has a plan");
        if summary.bailout.is_none() {
            assert_eq!(plan.expected_count(), summary.counts.total, "{}", name);
        }
    }
}

#[test]
fn test_chunked_fixtures_match_whole() {
    for path in get_tap_files() {
        let bytes = fs::read(&path).unwrap();
        let whole = parse(&String::from_utf8_lossy(&bytes), &ParseOptions::default());

        let mut parser = Parser::new(ParseOptions::default());
        let mut events = Vec::new();
        for chunk in bytes.chunks(3) {
            parser.write_bytes(chunk);
            events.extend(parser.events());
        }
        parser.end();
        events.extend(parser.events());

        assert_eq!(events, whole, "{}", file_name(&path));
    }
}
