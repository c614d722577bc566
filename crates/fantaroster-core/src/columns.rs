// Column reshaping tools used by the offline scripts: renumbering ids,
// dropping columns and renaming headers.

use indexmap::IndexMap;

use crate::record::Record;

/// Replace any existing `id_field` with a fresh sequential id (starting at 1)
/// placed as the first column.
pub fn renumber(records: &[Record], id_field: &str) -> Vec<Record> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let mut out = Record::with_capacity(record.len() + 1);
            out.insert(id_field.to_string(), (i + 1).to_string());
            for (k, v) in record {
                if k != id_field {
                    out.insert(k.clone(), v.clone());
                }
            }
            out
        })
        .collect()
}

/// Remove the named columns from every record, keeping the order of the rest.
pub fn drop_columns(records: &[Record], names: &[String]) -> Vec<Record> {
    records
        .iter()
        .map(|record| {
            record
                .iter()
                .filter(|(k, _)| !names.contains(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .collect()
}

/// Rename columns according to `table` (old name to new name). Column
/// positions are preserved and unmapped columns keep their names.
pub fn rename_columns(records: &[Record], table: &IndexMap<String, String>) -> Vec<Record> {
    records
        .iter()
        .map(|record| {
            record
                .iter()
                .map(|(k, v)| {
                    let name = table.get(k).unwrap_or(k);
                    (name.clone(), v.clone())
                })
                .collect()
        })
        .collect()
}
