//! Summarize a TAP stream.
//!
//! Reads a file named on the command line, or standard input, feeds it to the
//! parser in chunks, and prints the summary. Pass `--bail` or `--strict` to
//! change parsing, `--flat` to print the flattened canonical TAP instead.

use libtap::{stringify, ParseOptions, Parser, StringifyOptions};
use std::fs::File;
use std::io::{self, Read};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut options = ParseOptions::default();
    let mut flat = false;
    let mut path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--bail" => options.bail = true,
            "--strict" => options.strict = true,
            "--flat" => flat = true,
            _ => path = Some(arg),
        }
    }

    let mut input: Box<dyn Read> = match &path {
        Some(path) => Box::new(File::open(path).unwrap()),
        None => Box::new(io::stdin()),
    };

    let mut parser = Parser::new(options);
    let mut events = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = input.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        parser.write_bytes(&buf[..n]);
        events.extend(parser.events());
    }
    parser.end();
    events.extend(parser.events());

    if flat {
        print!(
            "{}",
            stringify(&events, &StringifyOptions { flat: true }).unwrap()
        );
    }

    let summary = parser.summary().cloned().unwrap_or_default();
    let counts = summary.counts;
    eprintln!(
        "# {}: {} passed, {} failed, {} skipped, {} todo ({} total)",
        if summary.ok { "ok" } else { "not ok" },
        counts.pass,
        counts.fail,
        counts.skip,
        counts.todo,
        counts.total
    );
    for failure in &summary.failures {
        eprintln!("#   not ok {} - {}", failure.id, failure.fullname);
    }
    if let Some(reason) = &summary.bailout {
        eprintln!("# bailed out: {}", reason);
    }
    for mismatch in &summary.mismatches {
        eprintln!("# {}", mismatch);
    }

    if summary.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
