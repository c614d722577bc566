// Record serializer: records back to CSV text, plus the atomic file write
// used by every component that rewrites a CSV on disk.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CsvError;
use crate::record::Record;

/// Options controlling CSV output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    pub delimiter: u8,
    /// Explicit column order. Missing fields are written as empty strings and
    /// fields not listed are dropped. When `None`, columns are the union of
    /// all record keys in first-seen order.
    pub columns: Option<Vec<String>>,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            columns: None,
        }
    }
}

impl SerializeOptions {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            columns: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// Union of all keys across `records`, in first-seen order.
pub fn infer_columns(records: &[Record]) -> Vec<String> {
    let mut seen = indexmap::IndexSet::new();
    for record in records {
        for key in record.keys() {
            if !seen.contains(key.as_str()) {
                seen.insert(key.clone());
            }
        }
    }
    seen.into_iter().collect()
}

/// Serialize `records` to CSV text. A header row is always written, even
/// when there are no records; with no columns at all the output is empty.
pub fn serialize(records: &[Record], options: &SerializeOptions) -> Result<String, CsvError> {
    let columns = match &options.columns {
        Some(columns) => columns.clone(),
        None => infer_columns(records),
    };
    if columns.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(
            columns
                .iter()
                .map(|c| record.get(c).map(String::as_str).unwrap_or("")),
        )?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CsvError::Write(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CsvError::Write(e.to_string()))
}

/// Write `contents` to `path` without ever exposing a half-written file:
/// the data goes to `<path>.tmp`, is synced, then renamed into place. On
/// failure the temp file is removed and `path` is left untouched.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), CsvError> {
    let io_err = |source| CsvError::File {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let temp_path = temp_path_for(path);
    if let Err(e) = write_then_rename(&temp_path, path, contents) {
        if let Err(cleanup) = std::fs::remove_file(&temp_path) {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                debug!("could not remove {}: {cleanup}", temp_path.display());
            }
        }
        return Err(io_err(e));
    }

    debug!("wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

fn write_then_rename(temp_path: &Path, path: &Path, contents: &str) -> std::io::Result<()> {
    {
        let mut file = File::create(temp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(temp_path, path)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse, ParseOptions};
    use crate::record::record_from;

    #[test]
    fn inferred_columns_follow_first_seen_order() {
        let records = vec![
            record_from([("Player", "A"), ("Goals", "5")]),
            record_from([("Player", "B"), ("Team", "Y"), ("Goals", "1")]),
        ];
        assert_eq!(infer_columns(&records), vec!["Player", "Goals", "Team"]);

        let text = serialize(&records, &SerializeOptions::default()).unwrap();
        assert_eq!(text, "Player,Goals,Team\nA,5,\nB,1,Y\n");
    }

    #[test]
    fn explicit_columns_pad_and_drop() {
        let records = vec![record_from([
            ("player", "Dybala"),
            ("squad", "Roma"),
            ("secret", "x"),
        ])];
        let options = SerializeOptions::default().columns(["id", "player", "squad"]);
        let text = serialize(&records, &options).unwrap();
        assert_eq!(text, "id,player,squad\n,Dybala,Roma\n");
    }

    #[test]
    fn header_written_without_records() {
        let options = SerializeOptions::default().columns(["id", "player"]);
        assert_eq!(serialize(&[], &options).unwrap(), "id,player\n");
        assert_eq!(serialize(&[], &SerializeOptions::default()).unwrap(), "");
    }

    #[test]
    fn semicolon_output_quotes_as_needed() {
        let records = vec![record_from([("Nome", "Rossi; Paolo"), ("Squadra", "Roma")])];
        let text = serialize(&records, &SerializeOptions::with_delimiter(b';')).unwrap();
        assert_eq!(text, "Nome;Squadra\n\"Rossi; Paolo\";Roma\n");
    }

    #[test]
    fn parse_serialize_parse_is_stable() {
        let original = "\
id;Nome;Squadra;Note
1;Paolo Rossi;Roma;\"quoted; value\"
2;Mario Rossi;Lazio;
3;Nicolò Barella;Inter;\"has \"\"quotes\"\"\"";
        let options = ParseOptions::with_delimiter(b';');
        let first = parse(original, &options).unwrap();
        let text = serialize(&first, &SerializeOptions::with_delimiter(b';')).unwrap();
        let second = parse(&text, &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn write_atomic_replaces_file_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("database.csv");

        write_atomic(&path, "id,player\n1,A\n").unwrap();
        write_atomic(&path, "id,player\n1,B\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,player\n1,B\n");
        assert!(!dir.path().join("nested").join("database.csv.tmp").exists());
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the destination makes the rename fail
        // after the temp file has been written.
        let path = dir.path().join("database.csv");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let err = write_atomic(&path, "id,player\n1,A\n").unwrap_err();
        assert!(matches!(err, CsvError::File { .. }));
        assert!(!dir.path().join("database.csv.tmp").exists());
        assert!(path.join("keep").exists());
    }
}
