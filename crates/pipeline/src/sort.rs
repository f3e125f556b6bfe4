//! Multi-key stable ordering.

use crate::error::Result;
use crate::fields::{Column, FieldTable};
use crate::record::FileRecord;
use crate::value::Value;
use std::cmp::Ordering;
use tracing::instrument;

/// Composite key of one record, one value per column.
pub(crate) fn keys(
    table: &FieldTable,
    records: &[FileRecord],
    columns: &[Column],
    separator: &str,
) -> Result<Vec<Vec<Value>>> {
    records
        .iter()
        .map(|record| columns.iter().map(|c| table.value(record, *c, separator)).collect())
        .collect()
}

fn compare(a: &[Value], b: &[Value]) -> Ordering {
    a.iter().zip(b).map(|(a, b)| a.compare(b)).find(|o| o.is_ne()).unwrap_or(Ordering::Equal)
}

/// Reorder `records` by the composite key of `columns`.
///
/// The sort is stable, reversed or not: records with equal keys keep the
/// order they had before the call.
#[instrument(skip_all, fields(records = records.len(), reverse = reverse))]
pub(crate) fn sort_by(
    table: &FieldTable,
    records: &mut Vec<FileRecord>,
    columns: &[Column],
    reverse: bool,
    separator: &str,
) -> Result<()> {
    let keys = keys(table, &records[..], columns, separator)?;
    let mut keyed: Vec<_> = keys.into_iter().zip(records.drain(..)).collect();
    keyed.sort_by(|(a, _), (b, _)| match reverse {
        true => compare(b, a),
        false => compare(a, b),
    });
    records.extend(keyed.into_iter().map(|(_, record)| record));
    Ok(())
}
