// File-backed roster store: the player list behind the read, create and
// delete operations of the roster service.
//
// Every mutation is read-all, transform, write-all through an atomic rename.
// The store holds no rows in memory between calls.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::CsvError;
use crate::names::fold;
use crate::parse::{read_path, ParseOptions};
use crate::record::{non_blank, parse_number, Record};
use crate::serialize::{serialize, write_atomic, SerializeOptions};

#[derive(Debug, Error)]
pub enum RosterError {
    #[error(transparent)]
    Csv(#[from] CsvError),

    #[error("invalid player: {0}")]
    InvalidPlayer(String),

    #[error("no id left to assign after {0}")]
    IdsExhausted(u64),
}

// ---------------------------------------------------------------------------
// Layout and filter
// ---------------------------------------------------------------------------

/// Shape of the roster file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterLayout {
    /// Column order written on every rewrite.
    pub columns: Vec<String>,
    pub id_field: String,
    pub name_field: String,
    pub team_field: String,
    pub position_field: String,
    #[serde(skip)]
    pub delimiter: u8,
}

impl Default for RosterLayout {
    fn default() -> Self {
        Self {
            columns: [
                "id", "player", "squad", "pos", "partite", "minuti", "goal", "assist", "rigori",
                "gialli", "rossi",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            id_field: "id".into(),
            name_field: "player".into(),
            team_field: "squad".into(),
            position_field: "pos".into(),
            delimiter: b',',
        }
    }
}

/// Optional criteria for listing players. Every set criterion must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterFilter {
    /// Accent- and case-insensitive substring of the player name.
    pub search: Option<String>,
    /// Exact team.
    pub team: Option<String>,
    /// Exact position/role.
    pub position: Option<String>,
    /// Numeric lower bounds per column; a non-numeric value fails its bound.
    pub min_values: IndexMap<String, f64>,
}

impl RosterFilter {
    pub fn is_empty(&self) -> bool {
        self.search.is_none()
            && self.team.is_none()
            && self.position.is_none()
            && self.min_values.is_empty()
    }

    pub fn matches(&self, record: &Record, layout: &RosterLayout) -> bool {
        if let Some(search) = &self.search {
            let name = record.get(&layout.name_field).map(|n| fold(n)).unwrap_or_default();
            if !name.contains(&fold(search)) {
                return false;
            }
        }
        if let Some(team) = &self.team {
            if record.get(&layout.team_field) != Some(team) {
                return false;
            }
        }
        if let Some(position) = &self.position {
            if record.get(&layout.position_field) != Some(position) {
                return false;
            }
        }
        self.min_values.iter().all(|(field, min)| {
            record
                .get(field)
                .and_then(|v| parse_number(v))
                .is_some_and(|v| v >= *min)
        })
    }
}

/// Parse an id made only of ASCII digits.
fn numeric_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RosterStore {
    path: PathBuf,
    layout: RosterLayout,
}

impl RosterStore {
    pub fn new(path: impl Into<PathBuf>, layout: RosterLayout) -> Self {
        Self {
            path: path.into(),
            layout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> &RosterLayout {
        &self.layout
    }

    /// Read every player. A missing file is an empty roster. Repeated header
    /// rows left behind by earlier tools are dropped.
    pub fn load(&self) -> Result<Vec<Record>, RosterError> {
        let options = ParseOptions::with_delimiter(self.layout.delimiter);
        let rows = match read_path(&self.path, &options) {
            Ok(rows) => rows,
            Err(e) if e.is_not_found() => {
                debug!("{} does not exist yet, treating as empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let id_field = &self.layout.id_field;
        Ok(rows
            .into_iter()
            .filter(|r| r.get(id_field).map(String::as_str) != Some(id_field.as_str()))
            .collect())
    }

    /// Players matching `filter`, in file order.
    pub fn list(&self, filter: &RosterFilter) -> Result<Vec<Record>, RosterError> {
        let rows = self.load()?;
        if filter.is_empty() {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .filter(|r| filter.matches(r, &self.layout))
            .collect())
    }

    /// Append `player` with the next id (`max(existing numeric ids) + 1`) and
    /// return that id. Fields outside the configured columns are dropped.
    pub fn add(&self, mut player: Record) -> Result<u64, RosterError> {
        if non_blank(&player, &self.layout.name_field).is_none() {
            return Err(RosterError::InvalidPlayer(format!(
                "'{}' must not be empty",
                self.layout.name_field
            )));
        }

        let mut rows = self.load()?;
        let max_id = rows
            .iter()
            .filter_map(|r| r.get(&self.layout.id_field).and_then(|v| numeric_id(v)))
            .max()
            .unwrap_or(0);
        let id = max_id
            .checked_add(1)
            .ok_or(RosterError::IdsExhausted(max_id))?;

        let dropped: Vec<&String> = player
            .keys()
            .filter(|k| !self.layout.columns.contains(k))
            .collect();
        if !dropped.is_empty() {
            debug!("dropping fields outside the roster columns: {dropped:?}");
        }

        player.insert(self.layout.id_field.clone(), id.to_string());
        let name = player
            .get(&self.layout.name_field)
            .cloned()
            .unwrap_or_default();
        rows.push(player);
        self.persist(&rows)?;

        info!("added player '{name}' with id {id}");
        Ok(id)
    }

    /// Remove the player with `id`. Remaining ids are left unchanged.
    pub fn delete_by_id(&self, id: u64) -> Result<bool, RosterError> {
        let rows = self.load()?;
        let before = rows.len();
        let kept: Vec<Record> = rows
            .into_iter()
            .filter(|r| r.get(&self.layout.id_field).and_then(|v| numeric_id(v)) != Some(id))
            .collect();
        let removed = before - kept.len();
        if removed == 0 {
            debug!("no player with id {id}");
            return Ok(false);
        }
        self.persist(&kept)?;
        info!("deleted player {id}");
        Ok(true)
    }

    /// Remove every player whose folded name (and team, when given) matches.
    /// Returns how many rows were removed.
    pub fn delete_by_name(&self, name: &str, team: Option<&str>) -> Result<usize, RosterError> {
        let wanted_name = fold(name);
        let wanted_team = team.map(fold);
        if wanted_name.is_empty() {
            return Err(RosterError::InvalidPlayer("name must not be empty".into()));
        }

        let rows = self.load()?;
        let before = rows.len();
        let kept: Vec<Record> = rows
            .into_iter()
            .filter(|r| {
                let name_matches =
                    r.get(&self.layout.name_field).map(|n| fold(n)).as_deref() == Some(wanted_name.as_str());
                let team_matches = match &wanted_team {
                    Some(t) => r.get(&self.layout.team_field).map(|s| fold(s)).as_ref() == Some(t),
                    None => true,
                };
                !(name_matches && team_matches)
            })
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.persist(&kept)?;
            info!("deleted {removed} player(s) named '{name}'");
        }
        Ok(removed)
    }

    fn persist(&self, rows: &[Record]) -> Result<(), RosterError> {
        let options = SerializeOptions::with_delimiter(self.layout.delimiter)
            .columns(self.layout.columns.iter().cloned());
        let text = serialize(rows, &options)?;
        write_atomic(&self.path, &text)?;
        Ok(())
    }
}
