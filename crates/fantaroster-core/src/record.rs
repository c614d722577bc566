// Record type shared by every pipeline stage.

use indexmap::IndexMap;

/// One CSV data row: column name to raw string value, in column order.
///
/// Numeric coercion is left to consumers. The key set may differ from row to
/// row, so lookups must tolerate missing keys.
pub type Record = IndexMap<String, String>;

/// Returns the trimmed value of `field`, or `None` if it is absent or blank.
pub fn non_blank<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Parse the longest float literal at the start of a raw value, after
/// trimming whitespace, so scraped values like `85.5%` or `90'` still count.
/// Values with no leading digits, and non-finite results, yield `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let text = raw.trim();
    let bytes = text.as_bytes();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = leading_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = leading_digits(&bytes[end + 1..]);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = leading_digits(&bytes[exp_end..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    text[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

fn leading_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Build a record from `(column, value)` pairs, mostly for tests and fixtures.
pub fn record_from<K, V, I>(pairs: I) -> Record
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
