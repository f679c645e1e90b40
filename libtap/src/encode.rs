//! Serialize parser events back to canonical TAP.
//!
//! The output is TAP version 14. A plan leads its scope unless it trailed
//! the scope's test points, in which case it stays after them: in bail mode
//! a leading plan ends the scope once its count is reached. Raw `Line` and
//! `Extra` events are dropped, so re-parsing the output yields the same
//! counts, plan, bailout, and failure order as the events it came from.

use crate::error::{Result, StringifyError};
use crate::event::Event;
use crate::lexer::{escape_description, subtest_name};
use crate::result::{Plan, TestPoint};
use crate::yamlish;
use std::sync::Arc;

/// Indentation of one sub-test level.
const SUBTEST_INDENT: usize = 4;

/// Output shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringifyOptions {
    /// Emit only leaf test points, renumbered from 1 and named by their
    /// full names, instead of nested sub-test blocks.
    pub flat: bool,
}

/// Serialize an event stream. On error no partial output is returned.
pub fn stringify(events: &[Event], options: &StringifyOptions) -> Result<String> {
    let mut out = String::new();
    push_line(&mut out, 0, "TAP version 14");
    if options.flat {
        encode_flat(events, &mut out)?;
    } else {
        encode_scope(events, 0, &mut out)?;
    }
    Ok(out)
}

/// Serialize bare test points under a `1..N` plan.
pub fn stringify_points(points: &[TestPoint], options: &StringifyOptions) -> Result<String> {
    let mut events = Vec::with_capacity(points.len() + 1);
    events.push(Event::Plan(Plan::new(1, points.len() as u64)));
    events.extend(points.iter().map(|p| Event::Assert(Arc::new(p.clone()))));
    stringify(&events, options)
}

fn push_line(out: &mut String, indent: usize, text: &str) {
    if !text.is_empty() {
        out.extend(std::iter::repeat(' ').take(indent));
        out.push_str(text);
    }
    out.push('\n');
}

// =============================================================================
// Nested
// =============================================================================

fn encode_scope(events: &[Event], indent: usize, out: &mut String) -> Result<()> {
    let leading_plan = events
        .iter()
        .take_while(|e| !matches!(e, Event::Assert(_)))
        .find_map(|e| match e {
            Event::Plan(plan) => Some(plan),
            _ => None,
        });
    if let Some(plan) = leading_plan {
        push_line(out, indent, &encode_plan(plan)?);
    }

    for event in events {
        match event {
            Event::Plan(plan) if leading_plan.is_none() => {
                push_line(out, indent, &encode_plan(plan)?)
            }
            Event::Assert(point) => encode_point(point, point.id, &point.name, indent, out)?,
            Event::Comment(text) => {
                if subtest_name(text).is_none() {
                    push_line(out, indent, text);
                }
            }
            Event::Pragma { key, enabled } => {
                let sign = if *enabled { '+' } else { '-' };
                push_line(out, indent, &format!("pragma {}{}", sign, key));
            }
            Event::Bailout(reason) => push_line(out, indent, &encode_bailout(reason)),
            _ => {}
        }
    }
    Ok(())
}

fn encode_plan(plan: &Plan) -> Result<String> {
    if plan.start > plan.end && plan.end != 0 {
        return Err(StringifyError::InvalidPlan {
            start: plan.start,
            end: plan.end,
        });
    }
    let mut line = format!("{}..{}", plan.start, plan.end);
    if let Some(reason) = &plan.skip_reason {
        line.push_str(" # SKIP");
        if !reason.is_empty() {
            line.push(' ');
            line.push_str(reason);
        }
    } else if let Some(comment) = &plan.comment {
        line.push_str(" # ");
        line.push_str(comment);
    }
    Ok(line)
}

fn encode_bailout(reason: &str) -> String {
    if reason.is_empty() {
        "Bail out!".to_string()
    } else {
        format!("Bail out! {}", reason)
    }
}

fn encode_point(
    point: &TestPoint,
    id: u64,
    name: &str,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    if let Some(subtest) = &point.subtest {
        let announced = if subtest.name.is_empty() {
            &point.name
        } else {
            &subtest.name
        };
        push_line(out, indent, format!("# Subtest: {}", announced).trim_end());
        encode_scope(&subtest.events, indent + SUBTEST_INDENT, out)?;
    }

    let mut line = String::from(if point.ok { "ok " } else { "not ok " });
    line.push_str(&id.to_string());
    if !name.is_empty() {
        line.push_str(" - ");
        line.push_str(&escape_description(name));
    }
    if let Some(directive) = &point.directive {
        line.push_str(" # ");
        line.push_str(directive.kind.keyword());
        if !directive.reason.is_empty() {
            line.push(' ');
            line.push_str(&directive.reason);
        }
    } else if let Some(ms) = point.time {
        line.push_str(&format!(" # time={}ms", ms));
    }
    push_line(out, indent, &line);

    if let Some(diag) = &point.diag {
        let text =
            yamlish::encode(diag).map_err(|source| StringifyError::Diagnostics { id, source })?;
        push_line(out, indent + 2, "---");
        for block_line in text.lines() {
            push_line(out, indent + 2, block_line);
        }
        push_line(out, indent + 2, "...");
    }
    Ok(())
}

// =============================================================================
// Flat
// =============================================================================

fn encode_flat(events: &[Event], out: &mut String) -> Result<()> {
    let mut leaves = Vec::new();
    for event in events {
        if let Event::Assert(point) = event {
            collect_leaves(point, &mut leaves);
        }
    }
    let bailout = events.iter().find_map(|e| match e {
        Event::Bailout(reason) => Some(reason),
        _ => None,
    });

    let mut plan = Plan::new(1, leaves.len() as u64);
    if leaves.is_empty() {
        plan.skip_reason = events.iter().find_map(|e| match e {
            Event::Plan(p) => p.skip_reason.clone(),
            _ => None,
        });
    }
    push_line(out, 0, &encode_plan(&plan)?);

    for (index, point) in leaves.iter().enumerate() {
        encode_point(point, index as u64 + 1, &point.fullname, 0, out)?;
    }
    if let Some(reason) = bailout {
        push_line(out, 0, &encode_bailout(reason));
    }
    Ok(())
}

/// Leaf points under `point`, in order. A sub-test without any test points
/// of its own counts as a leaf.
fn collect_leaves(point: &Arc<TestPoint>, leaves: &mut Vec<Arc<TestPoint>>) {
    let children: Vec<&Arc<TestPoint>> = match &point.subtest {
        Some(subtest) => subtest
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Assert(child) => Some(child),
                _ => None,
            })
            .collect(),
        None => Vec::new(),
    };
    if children.is_empty() {
        let mut leaf = TestPoint::clone(point);
        leaf.subtest = None;
        leaves.push(Arc::new(leaf));
    } else {
        for child in children {
            collect_leaves(child, leaves);
        }
    }
}
