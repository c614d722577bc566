// Name reconciler: joins a stats dataset onto a valuation/roster dataset by
// normalized surname, disambiguating on the given name.
//
// The default behaviour is a plain surname join. Team scoping, swapped name
// order, fuzzy surnames and fill-only-missing are opt-in.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::names::{fold, NameKey};
use crate::record::{non_blank, Record};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Full-name column of the stats rows.
    pub stats_name_field: String,
    /// Full-name column of the target rows.
    pub target_name_field: String,
    /// Stat columns copied onto every target row, in output order.
    pub stat_fields: Vec<String>,
    /// Value written when a stat cannot be resolved.
    pub zero_fill: String,
    /// Team column of the stats rows. Together with `target_team_field`,
    /// enables searching the target's own team before the whole dataset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_team_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_team_field: Option<String>,
    /// Also try the name read surname-first ("Rossi Paolo").
    pub swapped_names: bool,
    /// Minimum similarity (0, 1] for matching an unknown surname to the
    /// closest indexed one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzzy_cutoff: Option<f64>,
    /// Only enrich target rows whose `fill_check_fields` are all zero or
    /// blank; other rows keep their values.
    pub only_fill_empty: bool,
    pub fill_check_fields: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            stats_name_field: "player".into(),
            target_name_field: "Nome".into(),
            stat_fields: ["partite", "minuti", "goal", "assist", "rigori", "gialli", "rossi"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            zero_fill: "0".into(),
            stats_team_field: None,
            target_team_field: None,
            swapped_names: false,
            fuzzy_cutoff: None,
            only_fill_empty: false,
            fill_check_fields: vec!["partite".into(), "minuti".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// How a target row was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Surname and given name both matched.
    Exact,
    /// Surname matched but no given name did; first-seen bucket entry used.
    SurnameFallback,
    /// Only a similar surname matched; first entry of its bucket used.
    Fuzzy,
    /// No stats row shares the surname.
    Unmatched,
    /// The target row has no usable name.
    MissingName,
    /// The target row already carries stats and was left as is.
    AlreadyFilled,
}

/// Non-fatal condition found while reconciling. Never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileWarning {
    /// Target row `row` (0-based) had no usable name; stats zero-filled.
    MissingName { row: usize },
    /// Target row `row` had no stats row with the same surname.
    NoMatch { row: usize, name: String },
}

impl fmt::Display for ReconcileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileWarning::MissingName { row } => {
                write!(f, "row {}: no name, stats zero-filled", row + 1)
            }
            ReconcileWarning::NoMatch { row, name } => {
                write!(f, "row {}: no stats found for '{name}'", row + 1)
            }
        }
    }
}

/// Joined rows plus per-run metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// One row per target row, same order.
    pub rows: Vec<Record>,
    pub warnings: Vec<ReconcileWarning>,
    pub exact: usize,
    pub fallback: usize,
    pub fuzzy: usize,
    pub unmatched: usize,
    pub missing_name: usize,
    pub already_filled: usize,
}

impl ReconcileReport {
    fn tally(&mut self, kind: MatchKind) {
        match kind {
            MatchKind::Exact => self.exact += 1,
            MatchKind::SurnameFallback => self.fallback += 1,
            MatchKind::Fuzzy => self.fuzzy += 1,
            MatchKind::Unmatched => self.unmatched += 1,
            MatchKind::MissingName => self.missing_name += 1,
            MatchKind::AlreadyFilled => self.already_filled += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Surname index
// ---------------------------------------------------------------------------

/// Stats rows bucketed by normalized surname. Bucket order is the order the
/// rows appeared in the stats dataset.
#[derive(Debug, Default)]
pub struct SurnameIndex<'a> {
    buckets: HashMap<String, Vec<(NameKey, &'a Record)>>,
}

impl<'a> SurnameIndex<'a> {
    /// Index `stats_rows` by the surname of `name_field`. Rows without a
    /// usable name are skipped.
    pub fn build(stats_rows: &'a [Record], name_field: &str) -> Self {
        let mut index = Self::default();
        let mut skipped = 0usize;
        for row in stats_rows {
            if !index.insert(row, name_field) {
                skipped += 1;
            }
        }
        if skipped > 0 {
            debug!("{skipped} stats rows without a usable '{name_field}' were not indexed");
        }
        index
    }

    /// Add one row. Returns false when it has no usable name.
    fn insert(&mut self, row: &'a Record, name_field: &str) -> bool {
        let Some(key) = row.get(name_field).and_then(|n| NameKey::parse(n)) else {
            return false;
        };
        self.buckets.entry(key.surname.clone()).or_default().push((key, row));
        true
    }

    /// Number of distinct surnames.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Pick the stats row for `key`: the first bucket entry whose given name
    /// matches exactly, otherwise the first entry of the bucket.
    pub fn lookup(&self, key: &NameKey) -> (Option<&'a Record>, MatchKind) {
        let Some(bucket) = self.buckets.get(&key.surname).filter(|b| !b.is_empty()) else {
            return (None, MatchKind::Unmatched);
        };
        match bucket.iter().find(|(candidate, _)| candidate.given == key.given) {
            Some((_, row)) => (Some(*row), MatchKind::Exact),
            None => (Some(bucket[0].1), MatchKind::SurnameFallback),
        }
    }

    /// First row of the bucket whose surname is most similar to `surname`,
    /// if that similarity reaches `cutoff`. Equal scores go to the
    /// alphabetically first surname.
    pub fn closest(&self, surname: &str, cutoff: f64) -> Option<&'a Record> {
        self.buckets
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(candidate, bucket)| {
                (strsim::normalized_levenshtein(surname, candidate), candidate, bucket)
            })
            .filter(|(score, _, _)| *score >= cutoff)
            .max_by(|(a, a_key, _), (b, b_key, _)| a.total_cmp(b).then_with(|| b_key.cmp(a_key)))
            .map(|(score, candidate, bucket)| {
                debug!("'{surname}' taken as '{candidate}' (similarity {score:.2})");
                bucket[0].1
            })
    }
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// Global index plus the optional per-team indexes, searched in that
/// order: the target's team first, then everyone.
struct Matcher<'a, 'c> {
    global: SurnameIndex<'a>,
    by_team: HashMap<String, SurnameIndex<'a>>,
    config: &'c ReconcileConfig,
}

impl<'a, 'c> Matcher<'a, 'c> {
    fn new(stats_rows: &'a [Record], config: &'c ReconcileConfig) -> Self {
        let global = SurnameIndex::build(stats_rows, &config.stats_name_field);
        let mut by_team: HashMap<String, SurnameIndex<'a>> = HashMap::new();
        if let (Some(team_field), Some(_)) = (&config.stats_team_field, &config.target_team_field) {
            for row in stats_rows {
                let Some(team) = non_blank(row, team_field) else {
                    continue;
                };
                by_team
                    .entry(fold(team))
                    .or_default()
                    .insert(row, &config.stats_name_field);
            }
            debug!("indexed stats rows for {} teams", by_team.len());
        }
        Self {
            global,
            by_team,
            config,
        }
    }

    fn resolve(&self, key: &NameKey, target: &Record) -> (Option<&'a Record>, MatchKind) {
        let team_index = self
            .config
            .target_team_field
            .as_deref()
            .and_then(|field| non_blank(target, field))
            .and_then(|team| self.by_team.get(&fold(team)));
        if let Some(index) = team_index {
            let found = self.resolve_in(index, key);
            if found.0.is_some() {
                return found;
            }
        }
        self.resolve_in(&self.global, key)
    }

    fn resolve_in(&self, index: &SurnameIndex<'a>, key: &NameKey) -> (Option<&'a Record>, MatchKind) {
        let found = index.lookup(key);
        if found.0.is_some() {
            return found;
        }
        if self.config.swapped_names && key.given != key.surname {
            let swapped = NameKey {
                surname: key.given.clone(),
                given: key.surname.clone(),
            };
            let found = index.lookup(&swapped);
            if found.0.is_some() {
                return found;
            }
        }
        match self
            .config
            .fuzzy_cutoff
            .and_then(|cutoff| index.closest(&key.surname, cutoff))
        {
            Some(row) => (Some(row), MatchKind::Fuzzy),
            None => (None, MatchKind::Unmatched),
        }
    }
}

/// A stat value that counts as not filled in: absent, blank, or a number
/// equal to zero (decimal comma accepted).
fn is_zero(row: &Record, field: &str) -> bool {
    match non_blank(row, field) {
        None => true,
        Some(value) => value
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map(|n| n == 0.0)
            .unwrap_or(false),
    }
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Augment every target row with the configured stat fields taken from its
/// matched stats row, zero-filling whatever cannot be resolved.
///
/// The output always has exactly one row per target row, in the same order.
/// Original target fields come first and keep their positions; stat fields
/// are appended in configured order (a stat field the target already has is
/// overwritten in place, unless the row is skipped by `only_fill_empty`).
pub fn reconcile(
    stats_rows: &[Record],
    target_rows: &[Record],
    config: &ReconcileConfig,
) -> ReconcileReport {
    let matcher = Matcher::new(stats_rows, config);
    debug!(
        "indexed {} stats rows under {} surnames",
        stats_rows.len(),
        matcher.global.len()
    );

    let mut report = ReconcileReport {
        rows: Vec::with_capacity(target_rows.len()),
        ..ReconcileReport::default()
    };

    for (i, target) in target_rows.iter().enumerate() {
        if config.only_fill_empty
            && !config.fill_check_fields.iter().all(|f| is_zero(target, f))
        {
            report.tally(MatchKind::AlreadyFilled);
            let mut kept = target.clone();
            for field in &config.stat_fields {
                if !kept.contains_key(field) {
                    kept.insert(field.clone(), config.zero_fill.clone());
                }
            }
            report.rows.push(kept);
            continue;
        }

        let name = non_blank(target, &config.target_name_field);
        let (matched, kind) = match name.and_then(NameKey::parse) {
            Some(key) => matcher.resolve(&key, target),
            None => (None, MatchKind::MissingName),
        };

        match kind {
            MatchKind::MissingName => {
                warn!("target row {} has no '{}' value", i + 1, config.target_name_field);
                report.warnings.push(ReconcileWarning::MissingName { row: i });
            }
            MatchKind::Unmatched => {
                let name = name.unwrap_or_default().to_string();
                debug!("no stats for '{name}'");
                report.warnings.push(ReconcileWarning::NoMatch { row: i, name });
            }
            MatchKind::SurnameFallback => {
                debug!(
                    "no given-name match for '{}', using first row with that surname",
                    name.unwrap_or_default()
                );
            }
            MatchKind::Exact | MatchKind::Fuzzy | MatchKind::AlreadyFilled => {}
        }
        report.tally(kind);

        let mut joined = target.clone();
        for field in &config.stat_fields {
            let value = matched
                .and_then(|row| non_blank(row, field))
                .unwrap_or(config.zero_fill.as_str());
            joined.insert(field.clone(), value.to_string());
        }
        report.rows.push(joined);
    }

    report
}
