//! What gets printed once the pipeline has run.

use foldr_pipeline::{Pipeline, Report};
use std::fmt::Write;

/// One line per move, then a count of files left in place.
pub fn moves(report: &Report) -> String {
    let mut out = String::new();
    let verb = match report.dry_run {
        true => "would move",
        false => "moved",
    };
    for step in &report.moves {
        let _ = writeln!(out, "{verb} {step}");
    }
    let _ = writeln!(
        out,
        "{} {}, {} unchanged",
        report.moves.len(),
        match (report.dry_run, report.moves.len()) {
            (true, 1) => "move planned",
            (true, _) => "moves planned",
            (false, 1) => "file moved",
            (false, _) => "files moved",
        },
        report.unchanged
    );
    out
}

/// The working set: fields, then every record with its values, group and
/// pending path.
pub fn selection(pipeline: &Pipeline<'_>) -> String {
    let mut out = String::new();
    let labels = pipeline.table().labels();
    let _ = writeln!(out, "{} selected, {} groups", pipeline.records().len(), pipeline.groups().len());
    if !labels.is_empty() {
        let _ = writeln!(out, "fields: {}", labels.join(", "));
    }
    for record in pipeline.records() {
        let _ = write!(out, "{}", record.path().display());
        for (label, value) in labels.iter().zip(record.values()) {
            let _ = write!(out, " {label}={value}");
        }
        if let Some(slot) = record.slot() {
            let _ = write!(out, " group={}.{}", slot.index, slot.subindex);
        }
        let target = record.pending().target();
        if target != record.path() {
            let _ = write!(out, " -> {}", target.display());
        }
        out.push('\n');
    }
    out
}
