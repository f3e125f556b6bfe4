//! Partitioning the selection into groups.

use crate::error::Result;
use crate::fields::{Column, FieldTable};
use crate::record::{FileRecord, GroupSlot};
use crate::sort::keys;
use crate::value::Value;
use std::collections::HashMap;
use tracing::instrument;

/// One distinct key of the live grouping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub key: Vec<Value>,
    pub size: usize,
}

/// Assign every record to the group of its composite key.
///
/// Groups are numbered in order of first appearance, members in their
/// current order. Any previous grouping is discarded. Keys match on their
/// exact value, so `01` and `1` form two groups.
#[instrument(skip_all, fields(records = records.len(), columns = columns.len()))]
pub(crate) fn group_using(
    table: &FieldTable,
    records: &mut [FileRecord],
    columns: &[Column],
    separator: &str,
) -> Result<Vec<Group>> {
    let keys = keys(table, records, columns, separator)?;
    let mut seen: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    for (record, key) in records.iter_mut().zip(keys) {
        let index = *seen.entry(key.clone()).or_insert_with(|| {
            groups.push(Group { key: key.clone(), size: 0 });
            groups.len() - 1
        });
        let subindex = groups[index].size;
        groups[index].size += 1;
        record.slot = Some(GroupSlot { index, subindex, key });
    }
    tracing::debug!(groups = groups.len(), "grouped");
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(values: &[&str]) -> (FieldTable, Vec<FileRecord>) {
        let mut table = FieldTable::default();
        table.push(Some("k".into())).unwrap();
        let records = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut record = FileRecord::new(i.to_string());
                record.values = vec![Value::from(*v)];
                record
            })
            .collect();
        (table, records)
    }

    fn slots(records: &[FileRecord]) -> Vec<(usize, usize)> {
        records.iter().map(|r| r.slot().map(|s| (s.index, s.subindex)).unwrap()).collect()
    }

    #[test]
    fn test_first_seen_order() {
        let (table, mut records) = records(&["b", "a", "b", "c", "a", "b"]);
        let groups = group_using(&table, &mut records, &[Column::Field(0)], " ").unwrap();
        let sizes: Vec<_> = groups.iter().map(|g| (g.key[0].to_string(), g.size)).collect();
        assert_eq!(sizes, [("b".to_string(), 3), ("a".to_string(), 2), ("c".to_string(), 1)]);
        assert_eq!(slots(&records), [(0, 0), (1, 0), (0, 1), (2, 0), (1, 1), (0, 2)]);
    }

    #[test]
    fn test_subindex_is_contiguous() {
        let (table, mut records) = records(&["x", "y", "x", "x", "y"]);
        let groups = group_using(&table, &mut records, &[Column::Field(0)], " ").unwrap();
        for (index, group) in groups.iter().enumerate() {
            let mut subs: Vec<_> = slots(&records).into_iter().filter(|(g, _)| *g == index).map(|(_, s)| s).collect();
            subs.sort();
            assert_eq!(subs, (0..group.size).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_numeric_spellings_stay_apart() {
        let (table, mut records) = records(&["1", "01", "1"]);
        let groups = group_using(&table, &mut records, &[Column::Field(0)], " ").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(slots(&records), [(0, 0), (1, 0), (0, 1)]);
    }

    #[test]
    fn test_regrouping_replaces() {
        let (mut table, mut records) = records(&["x", "y", "x"]);
        table.push(Some("same".into())).unwrap();
        for record in &mut records {
            record.values.push(Value::from("1"));
        }
        group_using(&table, &mut records, &[Column::Field(0)], " ").unwrap();
        let groups = group_using(&table, &mut records, &[Column::Field(1)], " ").unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(slots(&records), [(0, 0), (0, 1), (0, 2)]);
    }

    #[test]
    fn test_group_by_previous_group() {
        let (table, mut records) = records(&["x", "y", "x"]);
        group_using(&table, &mut records, &[Column::Field(0)], " ").unwrap();
        let groups = group_using(&table, &mut records, &[Column::Group, Column::Subindex], "-").unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[2].key, [Value::from("x"), Value::Integer(1)]);
    }
}
