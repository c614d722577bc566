// Stat aggregator: collapses per-match player rows into one summary per
// (player, team), with integer totals for designated fields and
// per-season averages for everything else.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::record::{parse_number, Record};

/// Matches in a Serie A season; the default averaging divisor.
pub const SEASON_MATCHES: f64 = 38.0;

/// Placeholder used in a group key for a missing key field.
pub const MISSING_KEY_PART: &str = "undefined";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Fields whose exact values identify a group.
    pub key_fields: Vec<String>,
    /// Fields never summed. Key fields are always excluded as well.
    pub excluded_fields: Vec<String>,
    /// Fields emitted as rounded integer totals instead of averages.
    pub designated_fields: Vec<String>,
    /// Averaging divisor for non-designated fields.
    pub divisor: f64,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            key_fields: strings(&["Player", "Team"]),
            excluded_fields: strings(&["Player", "Team", "Date"]),
            designated_fields: strings(&["Goals", "Total Shoot", "Assists"]),
            divisor: SEASON_MATCHES,
        }
    }
}

impl AggregateConfig {
    fn is_excluded(&self, field: &str) -> bool {
        self.key_fields.iter().any(|f| f == field) || self.excluded_fields.iter().any(|f| f == field)
    }

    fn is_designated(&self, field: &str) -> bool {
        self.designated_fields.iter().any(|f| f == field)
    }

    /// Output column name for an averaged field, e.g. `minuti per 38`.
    pub fn average_column(&self, field: &str) -> String {
        format!("{field} per {}", self.divisor)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Group key and accumulator
// ---------------------------------------------------------------------------

/// Composite grouping key: the raw values of the key fields, compared
/// exactly. A missing field is `None`, so rows lacking the key fields share a
/// single degenerate group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(Vec<Option<String>>);

impl GroupKey {
    pub fn from_row(row: &Record, key_fields: &[String]) -> Self {
        Self(key_fields.iter().map(|f| row.get(f).cloned()).collect())
    }

    /// True if any key field was missing from the row.
    pub fn is_degenerate(&self) -> bool {
        self.0.iter().any(Option::is_none)
    }

    pub fn parts(&self) -> &[Option<String>] {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("__")?;
            }
            f.write_str(part.as_deref().unwrap_or(MISSING_KEY_PART))?;
        }
        Ok(())
    }
}

/// Running totals for one group.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Accumulator {
    /// Number of rows that landed in this group.
    pub count: usize,
    /// Sum per numeric field. A field appears only once some row contributed
    /// a finite number for it.
    pub totals: IndexMap<String, f64>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A value in a summary record.
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    /// Key field copied from the input.
    Text(String),
    /// Designated field total, rounded to the nearest integer.
    Count(i64),
    /// Per-divisor average, rounded to two decimals.
    Average(f64),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Text(s) => f.write_str(s),
            StatValue::Count(n) => write!(f, "{n}"),
            StatValue::Average(v) => write!(f, "{v}"),
        }
    }
}

/// One summary per group, fields in emission order: key fields first, then
/// accumulated fields in the order they were first contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub count: usize,
    pub fields: IndexMap<String, StatValue>,
}

impl SummaryRecord {
    pub fn get(&self, field: &str) -> Option<&StatValue> {
        self.fields.get(field)
    }

    /// String form for serialization.
    pub fn to_record(&self) -> Record {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

/// Round to two decimals. A result of `-0.0` becomes `0.0` so it never
/// prints as `-0`.
fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Round half up (toward positive infinity on ties): `2.5` gives 3 and
/// `-2.5` gives -2.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Single-pass aggregator over an insertion-ordered map of groups.
#[derive(Debug)]
pub struct Aggregator {
    config: AggregateConfig,
    groups: IndexMap<GroupKey, Accumulator>,
}

impl Aggregator {
    pub fn new(config: AggregateConfig) -> Self {
        Self {
            config,
            groups: IndexMap::new(),
        }
    }

    pub fn push(&mut self, row: &Record) {
        let key = GroupKey::from_row(row, &self.config.key_fields);
        if key.is_degenerate() {
            warn!("row is missing a key field, grouping under '{key}'");
        }

        let acc = self.groups.entry(key).or_default();
        acc.count += 1;

        for (field, raw) in row {
            if self.config.is_excluded(field) {
                continue;
            }
            match parse_number(raw) {
                Some(value) => *acc.totals.entry(field.clone()).or_insert(0.0) += value,
                None => trace!("skipping non-numeric value {raw:?} for field '{field}'"),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn accumulator(&self, key: &GroupKey) -> Option<&Accumulator> {
        self.groups.get(key)
    }

    /// Emit one summary per group in first-seen order.
    pub fn finish(self) -> Vec<SummaryRecord> {
        let config = &self.config;
        self.groups
            .into_iter()
            .map(|(key, acc)| {
                let mut fields = IndexMap::new();
                for (field, part) in config.key_fields.iter().zip(key.parts()) {
                    fields.insert(
                        field.clone(),
                        StatValue::Text(part.clone().unwrap_or_default()),
                    );
                }
                for (field, sum) in acc.totals {
                    if config.is_designated(&field) {
                        fields.insert(field, StatValue::Count(round_half_up(sum)));
                    } else {
                        fields.insert(
                            config.average_column(&field),
                            StatValue::Average(round2(sum / config.divisor)),
                        );
                    }
                }
                SummaryRecord {
                    count: acc.count,
                    fields,
                }
            })
            .collect()
    }
}

/// Aggregate `rows` in one pass.
pub fn aggregate(rows: &[Record], config: &AggregateConfig) -> Vec<SummaryRecord> {
    let mut aggregator = Aggregator::new(config.clone());
    for row in rows {
        aggregator.push(row);
    }
    aggregator.finish()
}

/// String forms of `summaries`, ready for the serializer.
pub fn summary_records(summaries: &[SummaryRecord]) -> Vec<Record> {
    summaries.iter().map(SummaryRecord::to_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::record_from;

    fn match_row(player: &str, team: &str, goals: &str, minuti: &str) -> Record {
        record_from([
            ("Player", player),
            ("Team", team),
            ("Date", "2024-09-01"),
            ("Goals", goals),
            ("minuti", minuti),
        ])
    }

    #[test]
    fn one_summary_per_distinct_player_team() {
        let rows = vec![
            match_row("A", "X", "1", "90"),
            match_row("B", "X", "0", "90"),
            match_row("A", "X", "2", "45"),
            match_row("A", "Y", "0", "10"),
            match_row("a", "X", "0", "10"),
        ];
        let out = aggregate(&rows, &AggregateConfig::default());
        assert_eq!(out.len(), 4);
        let players: Vec<String> = out
            .iter()
            .map(|s| format!("{}/{}", s.fields["Player"], s.fields["Team"]))
            .collect();
        assert_eq!(players, vec!["A/X", "B/X", "A/Y", "a/X"]);
        assert_eq!(out[0].count, 2);
    }

    #[test]
    fn end_to_end_two_rows() {
        let rows = vec![match_row("A", "X", "3", "90"), match_row("A", "X", "2", "76")];
        let out = aggregate(&rows, &AggregateConfig::default());
        assert_eq!(out.len(), 1);
        let s = &out[0];
        assert_eq!(s.get("Player"), Some(&StatValue::Text("A".into())));
        assert_eq!(s.get("Team"), Some(&StatValue::Text("X".into())));
        assert_eq!(s.get("Goals"), Some(&StatValue::Count(5)));
        assert_eq!(s.get("minuti per 38"), Some(&StatValue::Average(4.37)));
        assert!(s.get("Date").is_none());
        assert!(s.get("Date per 38").is_none());
        assert_eq!(s.fields.len(), 4);
    }

    #[test]
    fn designated_fields_round_to_nearest() {
        let rows = vec![match_row("A", "X", "10.1", "0"), match_row("A", "X", "0.5", "0")];
        let out = aggregate(&rows, &AggregateConfig::default());
        assert_eq!(out[0].get("Goals"), Some(&StatValue::Count(11)));
    }

    #[test]
    fn designated_ties_round_toward_positive_infinity() {
        let out = aggregate(&[match_row("A", "X", "-2.5", "0")], &AggregateConfig::default());
        assert_eq!(out[0].get("Goals"), Some(&StatValue::Count(-2)));

        let out = aggregate(&[match_row("A", "X", "2.5", "0")], &AggregateConfig::default());
        assert_eq!(out[0].get("Goals"), Some(&StatValue::Count(3)));

        let out = aggregate(&[match_row("A", "X", "-2.6", "0")], &AggregateConfig::default());
        assert_eq!(out[0].get("Goals"), Some(&StatValue::Count(-3)));
    }

    #[test]
    fn tiny_negative_average_prints_as_zero() {
        let rows = vec![record_from([("Player", "A"), ("Team", "X"), ("xG", "-0.1")])];
        let out = aggregate(&rows, &AggregateConfig::default());
        assert_eq!(out[0].get("xG per 38"), Some(&StatValue::Average(0.0)));
        assert_eq!(out[0].to_record()["xG per 38"], "0");
    }

    #[test]
    fn numeric_prefixes_are_summed() {
        let rows = vec![
            record_from([("Player", "A"), ("Team", "X"), ("Pass%", "85.5%"), ("minuti", "90'")]),
            record_from([("Player", "A"), ("Team", "X"), ("Pass%", "n/a"), ("minuti", "76'")]),
        ];
        let out = aggregate(&rows, &AggregateConfig::default());
        let columns: Vec<&str> = out[0].fields.keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["Player", "Team", "Pass% per 38", "minuti per 38"]);
        assert_eq!(out[0].get("Pass% per 38"), Some(&StatValue::Average(2.25)));
        assert_eq!(out[0].get("minuti per 38"), Some(&StatValue::Average(4.37)));
    }

    #[test]
    fn per_38_average_of_single_row() {
        let rows = vec![match_row("A", "X", "0", "76")];
        let out = aggregate(&rows, &AggregateConfig::default());
        assert_eq!(out[0].get("minuti per 38"), Some(&StatValue::Average(2.0)));
        assert_eq!(out[0].to_record()["minuti per 38"], "2");
    }

    #[test]
    fn divisor_is_fixed_not_row_count() {
        let rows: Vec<Record> = (0..3).map(|_| match_row("A", "X", "0", "38")).collect();
        let out = aggregate(&rows, &AggregateConfig::default());
        assert_eq!(out[0].count, 3);
        assert_eq!(out[0].get("minuti per 38"), Some(&StatValue::Average(3.0)));
    }

    #[test]
    fn non_numeric_values_are_excluded_not_zero_filled() {
        let rows = vec![
            record_from([("Player", "A"), ("Team", "X"), ("xG", "n/a")]),
            record_from([("Player", "A"), ("Team", "X"), ("xG", "")]),
        ];
        let mut agg = Aggregator::new(AggregateConfig::default());
        for row in &rows {
            agg.push(row);
        }
        let key = GroupKey::from_row(&rows[0], &AggregateConfig::default().key_fields);
        let acc = agg.accumulator(&key).unwrap();
        assert_eq!(acc.count, 2);
        assert!(acc.totals.is_empty());

        let out = agg.finish();
        assert_eq!(out[0].fields.len(), 2);
    }

    #[test]
    fn field_present_in_some_rows_sums_only_those() {
        let rows = vec![
            record_from([("Player", "A"), ("Team", "X"), ("Assists", "1")]),
            record_from([("Player", "A"), ("Team", "X")]),
            record_from([("Player", "A"), ("Team", "X"), ("Assists", "2"), ("Tackles", "19")]),
        ];
        let out = aggregate(&rows, &AggregateConfig::default());
        assert_eq!(out[0].get("Assists"), Some(&StatValue::Count(3)));
        assert_eq!(out[0].get("Tackles per 38"), Some(&StatValue::Average(0.5)));
        let columns: Vec<&str> = out[0].fields.keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["Player", "Team", "Assists", "Tackles per 38"]);
    }

    #[test]
    fn rows_missing_key_fields_share_degenerate_group() {
        let rows = vec![
            record_from([("Goals", "1")]),
            record_from([("Goals", "2")]),
            record_from([("Player", "A"), ("Team", "X"), ("Goals", "4")]),
        ];
        let config = AggregateConfig::default();
        let key = GroupKey::from_row(&rows[0], &config.key_fields);
        assert!(key.is_degenerate());
        assert_eq!(key.to_string(), "undefined__undefined");

        let out = aggregate(&rows, &config);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("Player"), Some(&StatValue::Text(String::new())));
        assert_eq!(out[0].get("Goals"), Some(&StatValue::Count(3)));
    }

    #[test]
    fn custom_config() {
        let config = AggregateConfig {
            key_fields: strings(&["player"]),
            excluded_fields: strings(&["season"]),
            designated_fields: strings(&["goal"]),
            divisor: 10.0,
        };
        let rows = vec![
            record_from([("player", "Dybala"), ("season", "2024"), ("goal", "7"), ("minuti", "25")]),
        ];
        let out = aggregate(&rows, &config);
        assert_eq!(out[0].get("goal"), Some(&StatValue::Count(7)));
        assert_eq!(out[0].get("minuti per 10"), Some(&StatValue::Average(2.5)));
        assert!(out[0].get("season per 10").is_none());
    }

    #[test]
    fn empty_input_yields_no_summaries() {
        assert!(aggregate(&[], &AggregateConfig::default()).is_empty());
    }
}
