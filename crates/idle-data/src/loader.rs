//! Reads a data directory into a validated [`GameConfiguration`].
//!
//! A data directory holds up to three files, each in RON, JSON, or TOML:
//!
//! - `entities.*` (required): a list of entity definitions.
//! - `modifiers.*` (optional): a list of global modifiers.
//! - `properties.*` (optional): universal custom properties, a map from
//!   name to expression, inherited by every entity.
//!
//! TOML has no top-level arrays, so TOML lists sit under a key named after
//! the file (`[[entities]]`, `[[modifiers]]`).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use idle_core::config::GameConfiguration;
use idle_core::error::ConfigError;
use idle_core::hook::EngineHook;
use idle_core::modifier::ModifierDefinition;
use serde::de::DeserializeOwned;

use crate::schema::{EntityData, ExprData};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("{dir} has no {stem} file")]
    MissingRequired { stem: String, dir: PathBuf },

    #[error("{0} is not a .ron, .json or .toml file")]
    UnsupportedFormat(PathBuf),

    /// The same data exists in more than one format.
    #[error("{first} and {second} both define the same data")]
    ConflictingFormats { first: PathBuf, second: PathBuf },

    #[error("{file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The files parsed but do not form a valid configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Data files
// ===========================================================================

/// Data file syntax, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Json,
    Toml,
}

impl Format {
    const ALL: [Format; 3] = [Format::Ron, Format::Json, Format::Toml];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Json => "json",
            Format::Toml => "toml",
        }
    }

    pub fn of(path: &Path) -> Result<Self, DataLoadError> {
        let extension = path.extension().and_then(|e| e.to_str());
        Self::ALL
            .into_iter()
            .find(|format| Some(format.extension()) == extension)
            .ok_or_else(|| DataLoadError::UnsupportedFormat(path.to_path_buf()))
    }
}

/// One data file, read into memory.
#[derive(Debug)]
pub struct DataFile {
    path: PathBuf,
    format: Format,
    text: String,
}

impl DataFile {
    /// The `stem` file in `dir`, in whichever single format it exists.
    pub fn locate(dir: &Path, stem: &str) -> Result<Option<Self>, DataLoadError> {
        let mut present = Format::ALL
            .into_iter()
            .map(|format| dir.join(format!("{stem}.{}", format.extension())))
            .filter(|path| path.is_file());
        let Some(path) = present.next() else {
            return Ok(None);
        };
        if let Some(second) = present.next() {
            return Err(DataLoadError::ConflictingFormats {
                first: path,
                second,
            });
        }
        Self::read(path).map(Some)
    }

    pub fn read(path: impl Into<PathBuf>) -> Result<Self, DataLoadError> {
        let path = path.into();
        let format = Format::of(&path)?;
        let text = std::fs::read_to_string(&path)?;
        Ok(Self { path, format, text })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// The whole file as one `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, DataLoadError> {
        match self.format {
            Format::Ron => ron::from_str(&self.text).map_err(|e| self.parse_error(e)),
            Format::Json => serde_json::from_str(&self.text).map_err(|e| self.parse_error(e)),
            Format::Toml => toml::from_str(&self.text).map_err(|e| self.parse_error(e)),
        }
    }

    /// A list of `T`; for TOML, the array stored under `table_key`.
    pub fn parse_list<T: DeserializeOwned>(&self, table_key: &str) -> Result<Vec<T>, DataLoadError> {
        if self.format != Format::Toml {
            return self.parse();
        }
        let mut table: toml::Table = self.parse()?;
        let list = table
            .remove(table_key)
            .ok_or_else(|| self.parse_error(format!("no `{table_key}` array")))?;
        list.try_into().map_err(|e: toml::de::Error| self.parse_error(e))
    }

    fn parse_error(&self, detail: impl fmt::Display) -> DataLoadError {
        DataLoadError::Parse {
            file: self.path.clone(),
            detail: detail.to_string(),
        }
    }
}

// ===========================================================================
// Configuration loading
// ===========================================================================

/// Load and validate the configuration in `dir`.
pub fn load_configuration(dir: &Path) -> Result<GameConfiguration, DataLoadError> {
    load_configuration_with_hooks(dir, Vec::new())
}

/// Like [`load_configuration`], adding hooks registered in code. Hooks are
/// closures and have no data file form.
pub fn load_configuration_with_hooks(
    dir: &Path,
    hooks: Vec<EngineHook>,
) -> Result<GameConfiguration, DataLoadError> {
    let entities: Vec<EntityData> = DataFile::locate(dir, "entities")?
        .ok_or_else(|| DataLoadError::MissingRequired {
            stem: "entities".into(),
            dir: dir.to_path_buf(),
        })?
        .parse_list("entities")?;

    let modifiers: Vec<ModifierDefinition> = match DataFile::locate(dir, "modifiers")? {
        Some(file) => file.parse_list("modifiers")?,
        None => Vec::new(),
    };

    let properties: BTreeMap<String, ExprData> = match DataFile::locate(dir, "properties")? {
        Some(file) => file.parse()?,
        None => BTreeMap::new(),
    };

    tracing::debug!(
        dir = %dir.display(),
        entities = entities.len(),
        modifiers = modifiers.len(),
        properties = properties.len(),
        "loaded data files"
    );

    let config = GameConfiguration::new(
        entities.into_iter().map(EntityData::into_definition).collect(),
        modifiers,
        hooks,
        properties.into_iter().map(|(k, v)| (k, v.into())).collect(),
    )?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
