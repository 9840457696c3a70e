// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Print rule tables and packet traces in a human-friendly manner.
//!
//! This is mostly just a place to hang printing routines so that they
//! can be used by both arpdadm and integration tests.

use crate::api::TableId;
use crate::engine::flow_table::ProcessResult;
use crate::engine::rule::Finalized;
use crate::engine::rule::Rule;
use std::io::Write;
use std::string::String;
use std::string::ToString;
use std::vec::Vec;
use tabwriter::TabWriter;

/// Print the rules of a table.
pub fn print_rules(
    table: TableId,
    rules: &[Rule<Finalized>],
) -> std::io::Result<()> {
    print_rules_into(&mut std::io::stdout(), table, rules)
}

/// Print the rules of a table into a given writer.
pub fn print_rules_into(
    writer: &mut impl Write,
    table: TableId,
    rules: &[Rule<Finalized>],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Table {table}")?;
    write_hrb(&mut t)?;
    print_rule_header(&mut t)?;
    for (id, rule) in rules.iter().enumerate() {
        print_rule(&mut t, id, rule)?;
    }
    t.flush()
}

/// Print the header for the [`print_rule()`] output.
pub fn print_rule_header(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "ID\tPRI\tPREDICATES\tACTIONS")
}

/// Print one rule, one predicate and one action per line.
pub fn print_rule(
    t: &mut impl Write,
    id: usize,
    rule: &Rule<Finalized>,
) -> std::io::Result<()> {
    let mut preds: Vec<String> =
        rule.predicates().iter().map(ToString::to_string).collect();
    let mut actions: Vec<String> =
        rule.actions().iter().map(ToString::to_string).collect();

    if preds.is_empty() {
        preds.push("*".to_string());
    }

    if actions.is_empty() {
        actions.push("drop".to_string());
    }

    let lines = preds.len().max(actions.len());
    for i in 0..lines {
        let pred = preds.get(i).map(String::as_str).unwrap_or("");
        let action = actions.get(i).map(String::as_str).unwrap_or("");

        if i == 0 {
            writeln!(t, "{id}\t{}\t{pred}\t{action}", rule.priority())?;
        } else {
            writeln!(t, "\t\t{pred}\t{action}")?;
        }
    }

    // Separate multi-line rules so it's easier to see where one rule
    // ends and the next begins.
    if lines > 1 {
        writeln!(t, "\t\t\t")?;
    }

    Ok(())
}

/// Print the outcome of running a packet through a flow table.
pub fn print_trace(res: &ProcessResult) -> std::io::Result<()> {
    print_trace_into(&mut std::io::stdout(), res)
}

/// Print the outcome of running a packet through a flow table into a
/// given writer.
pub fn print_trace_into(
    writer: &mut impl Write,
    res: &ProcessResult,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "TABLE\tPRI")?;
    for hit in &res.hits {
        writeln!(t, "{}\t{}", hit.table, hit.priority)?;
    }
    t.flush()?;

    write_hr(&mut t)?;
    for out in &res.emitted {
        writeln!(t, "output:{}\t{}", out.port, out.pkt)?;
    }

    if let Some((table, pkt)) = &res.handoff {
        writeln!(t, "resubmit:{table}\t{pkt}")?;
    }

    if res.is_drop() {
        writeln!(t, "drop")?;
    }

    t.flush()
}

/// Print a horizontal rule in bold.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<70}", "=")
}

/// Print a horizontal rule.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<70}", "-")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::rule::Action;

    #[test]
    fn rule_rows() {
        let rules = vec![Rule::match_any(0, vec![Action::Resubmit(20)])];
        let mut out = Vec::new();
        print_rules_into(&mut out, 1, &rules).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Table 1\n"));
        assert!(out.contains("resubmit(,20)"));
        assert!(out.lines().any(|l| l.starts_with("0") && l.contains('*')));
    }
}
