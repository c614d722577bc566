// Record parser: CSV text to an ordered sequence of field-keyed records.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::CsvError;
use crate::record::Record;

/// Options controlling how CSV text is split into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Field delimiter byte (comma and semicolon are the common cases).
    pub delimiter: u8,
    /// Strip leading/trailing whitespace from column names.
    pub trim_headers: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            trim_headers: true,
        }
    }
}

impl ParseOptions {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Parse a complete CSV document. The first row is the header; every
/// following row becomes one record, in file order.
///
/// Rows shorter than the header simply lack the trailing keys. Fields beyond
/// the header width are dropped.
pub fn parse(text: &str, options: &ParseOptions) -> Result<Vec<Record>, CsvError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    check_quotes(text, options.delimiter)?;
    read_records(text.as_bytes(), options)
}

/// Parse raw bytes, rejecting input that is not valid UTF-8.
pub fn parse_bytes(bytes: &[u8], options: &ParseOptions) -> Result<Vec<Record>, CsvError> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        let valid = &bytes[..e.valid_up_to()];
        CsvError::Parse {
            line: 1 + valid.iter().filter(|&&b| b == b'\n').count() as u64,
            message: format!("invalid UTF-8: {e}"),
        }
    })?;
    parse(text, options)
}

/// Read everything from `rdr` and parse it. Read failures come back as
/// [`CsvError::Io`].
pub fn parse_reader<R: Read>(mut rdr: R, options: &ParseOptions) -> Result<Vec<Record>, CsvError> {
    let mut bytes = Vec::new();
    rdr.read_to_end(&mut bytes)?;
    parse_bytes(&bytes, options)
}

/// Read and parse the CSV file at `path`.
pub fn read_path(path: &Path, options: &ParseOptions) -> Result<Vec<Record>, CsvError> {
    let bytes = std::fs::read(path).map_err(|source| CsvError::File {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_bytes(&bytes, options)?;
    debug!("parsed {} records from {}", records.len(), path.display());
    Ok(records)
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn read_records<R: Read>(rdr: R, options: &ParseOptions) -> Result<Vec<Record>, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .flexible(true)
        .from_reader(rdr);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| {
            if options.trim_headers {
                h.trim().to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let mut record = Record::with_capacity(headers.len());
        for (i, value) in row.iter().enumerate() {
            match headers.get(i) {
                Some(column) => {
                    record.insert(column.clone(), value.to_string());
                }
                None => {
                    let line = row.position().map(|p| p.line()).unwrap_or(0);
                    debug!("line {line}: dropping field {} beyond header width", i + 1);
                }
            }
        }
        records.push(record);
    }
    Ok(records)
}

/// Reject documents with a quoted field that never closes.
///
/// Follows the reader's quoting rules: a quote only opens a quoted field at
/// the start of a field, `""` inside a quoted field is an escaped quote, and
/// quotes anywhere else are literal.
fn check_quotes(text: &str, delimiter: u8) -> Result<(), CsvError> {
    let delimiter = delimiter as char;
    let mut line: u64 = 1;
    let mut opened_at: u64 = 0;
    let mut in_quotes = false;
    let mut field_start = true;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                }
                '"' => in_quotes = false,
                '\n' => line += 1,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if field_start => {
                in_quotes = true;
                opened_at = line;
                field_start = false;
            }
            '\n' => {
                line += 1;
                field_start = true;
            }
            '\r' => field_start = true,
            c if c == delimiter => field_start = true,
            _ => field_start = false,
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote { line: opened_at });
    }
    Ok(())
}
