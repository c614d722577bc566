// Configuration loading and validation (config/fantaroster.toml).

use std::path::{Path, PathBuf};

use fantaroster_core::aggregate::AggregateConfig;
use fantaroster_core::reconcile::ReconcileConfig;
use fantaroster_core::roster::RosterLayout;
use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

/// Name of the single config file under `config/` and `defaults/`.
pub const CONFIG_FILE: &str = "fantaroster.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub roster: RosterConfig,
    pub aggregate: AggregateSettings,
    pub reconcile: ReconcileSettings,
    /// Header renames (old name to new name), in file order.
    pub rename: IndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct RosterConfig {
    pub path: String,
    pub layout: RosterLayout,
}

#[derive(Debug, Clone)]
pub struct AggregateSettings {
    pub delimiter: u8,
    pub config: AggregateConfig,
}

#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub stats_delimiter: u8,
    pub target_delimiter: u8,
    pub output_dir: String,
    pub drop_stats_fields: Vec<String>,
    pub drop_target_fields: Vec<String>,
    pub config: ReconcileConfig,
}

// ---------------------------------------------------------------------------
// File structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ConfigFile {
    server: ServerConfig,
    roster: RosterSection,
    #[serde(default)]
    aggregate: AggregateSection,
    #[serde(default)]
    reconcile: ReconcileSection,
    #[serde(default)]
    rename: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RosterSection {
    path: String,
    #[serde(default = "comma")]
    delimiter: String,
    #[serde(flatten)]
    layout: RosterLayout,
}

#[derive(Debug, Deserialize)]
struct AggregateSection {
    #[serde(default = "comma")]
    delimiter: String,
    #[serde(flatten)]
    config: AggregateConfig,
}

impl Default for AggregateSection {
    fn default() -> Self {
        Self {
            delimiter: comma(),
            config: AggregateConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReconcileSection {
    #[serde(default = "comma")]
    stats_delimiter: String,
    #[serde(default = "semicolon")]
    target_delimiter: String,
    #[serde(default = "data_dir")]
    output_dir: String,
    #[serde(default)]
    drop_stats_fields: Vec<String>,
    #[serde(default)]
    drop_target_fields: Vec<String>,
    #[serde(flatten)]
    config: ReconcileConfig,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            stats_delimiter: comma(),
            target_delimiter: semicolon(),
            output_dir: data_dir(),
            drop_stats_fields: Vec::new(),
            drop_target_fields: Vec::new(),
            config: ReconcileConfig::default(),
        }
    }
}

fn comma() -> String {
    ",".into()
}

fn semicolon() -> String {
    ";".into()
}

fn data_dir() -> String {
    "data".into()
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/fantaroster.toml` relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = std::fs::read_to_string(&path)
        .map_err(|_| ConfigError::FileNotFound { path: path.clone() })?;
    parse_config(&text).map_err(|e| match e {
        ParseFailure::Toml(source) => ConfigError::ParseError { path, source },
        ParseFailure::Invalid(err) => err,
    })
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(ConfigError),
}

fn parse_config(text: &str) -> Result<Config, ParseFailure> {
    let file: ConfigFile = toml::from_str(text).map_err(ParseFailure::Toml)?;

    let mut layout = file.roster.layout;
    layout.delimiter =
        delimiter_byte("roster.delimiter", &file.roster.delimiter).map_err(ParseFailure::Invalid)?;

    let config = Config {
        server: file.server,
        roster: RosterConfig {
            path: file.roster.path,
            layout,
        },
        aggregate: AggregateSettings {
            delimiter: delimiter_byte("aggregate.delimiter", &file.aggregate.delimiter)
                .map_err(ParseFailure::Invalid)?,
            config: file.aggregate.config,
        },
        reconcile: ReconcileSettings {
            stats_delimiter: delimiter_byte(
                "reconcile.stats_delimiter",
                &file.reconcile.stats_delimiter,
            )
            .map_err(ParseFailure::Invalid)?,
            target_delimiter: delimiter_byte(
                "reconcile.target_delimiter",
                &file.reconcile.target_delimiter,
            )
            .map_err(ParseFailure::Invalid)?,
            output_dir: file.reconcile.output_dir,
            drop_stats_fields: file.reconcile.drop_stats_fields,
            drop_target_fields: file.reconcile.drop_target_fields,
            config: file.reconcile.config,
        },
        rename: file.rename,
    };

    validate(&config).map_err(ParseFailure::Invalid)?;
    Ok(config)
}

/// Ensure every file in `defaults/` exists in `config/`, copying missing
/// ones. Returns the files that were copied. Existing files are never
/// overwritten.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);
        if target.exists() {
            continue;
        }
        std::fs::copy(&path, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to copy {}: {e}", path.display()),
        })?;
        copied.push(target);
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults
/// into `config/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn delimiter_byte(field: &str, value: &str) -> Result<u8, ConfigError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && c != '"' && c != '\n' && c != '\r' => Ok(c as u8),
        _ => Err(invalid(
            field,
            format!("must be a single ASCII character other than a quote or newline, got {value:?}"),
        )),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port", "must be greater than 0"));
    }

    let layout = &config.roster.layout;
    if config.roster.path.trim().is_empty() {
        return Err(invalid("roster.path", "must not be empty"));
    }
    if layout.columns.is_empty() {
        return Err(invalid("roster.columns", "must not be empty"));
    }
    for (field, value) in [
        ("roster.id_field", &layout.id_field),
        ("roster.name_field", &layout.name_field),
    ] {
        if !layout.columns.contains(value) {
            return Err(invalid(
                field,
                format!("'{value}' is not one of roster.columns"),
            ));
        }
    }

    let aggregate = &config.aggregate.config;
    if aggregate.key_fields.is_empty() {
        return Err(invalid("aggregate.key_fields", "must not be empty"));
    }
    if !aggregate.divisor.is_finite() || aggregate.divisor <= 0.0 {
        return Err(invalid(
            "aggregate.divisor",
            format!("must be a positive number, got {}", aggregate.divisor),
        ));
    }

    let reconcile = &config.reconcile.config;
    if reconcile.stat_fields.is_empty() {
        return Err(invalid("reconcile.stat_fields", "must not be empty"));
    }
    if reconcile.stats_team_field.is_some() != reconcile.target_team_field.is_some() {
        return Err(invalid(
            "reconcile.target_team_field",
            "stats_team_field and target_team_field must be set together",
        ));
    }
    if let Some(cutoff) = reconcile.fuzzy_cutoff {
        if !(cutoff > 0.0 && cutoff <= 1.0) {
            return Err(invalid(
                "reconcile.fuzzy_cutoff",
                format!("must be in (0, 1], got {cutoff}"),
            ));
        }
    }
    if reconcile.only_fill_empty && reconcile.fill_check_fields.is_empty() {
        return Err(invalid("reconcile.fill_check_fields", "must not be empty"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
