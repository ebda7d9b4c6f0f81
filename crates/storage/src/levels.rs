//! Daily level sheets: `levels/levels_YYYY_MM_DD.csv`.
//!
//! ```text
//! level_type,level_value,description,importance
//! support,6295,Major dip buy level,high
//! resistance,6430,POLR upside target,high
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::{Error, Importance, Level, LevelKind, LevelSet, Result};

#[derive(Debug, Deserialize, Serialize)]
struct LevelRow {
    level_type: String,
    level_value: f64,
    description: String,
    importance: String,
}

/// Directory holding one level sheet per trading day.
#[derive(Debug, Clone)]
pub struct LevelStore {
    dir: PathBuf,
}

impl LevelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("levels_{}.csv", date.format("%Y_%m_%d")))
    }

    /// Levels for `date`, or `None` when no sheet exists for that day.
    pub fn load(&self, date: NaiveDate) -> Result<Option<LevelSet>> {
        let path = self.path_for(date);
        if !path.exists() {
            return Ok(None);
        }
        let set = load_file(&path)?;
        info!(
            path = %path.display(),
            supports = set.supports.len(),
            resistances = set.resistances.len(),
            "Loaded levels"
        );
        Ok(Some(set))
    }

    /// Write the sheet for `date`, replacing any existing one.
    pub fn write(&self, date: NaiveDate, levels: &[Level]) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.path_for(date);
        let mut writer = csv::Writer::from_path(&path)?;
        for level in levels {
            writer.serialize(LevelRow {
                level_type: level.kind.to_string(),
                level_value: level.value,
                description: level.description.clone(),
                importance: level.importance.to_string(),
            })?;
        }
        writer.flush()?;
        info!(path = %path.display(), count = levels.len(), "Wrote level sheet");
        Ok(path)
    }
}

/// Parse one level sheet. Unknown importance falls back to medium; an unknown
/// level type or a non-finite value rejects the sheet.
pub fn load_file(path: &Path) -> Result<LevelSet> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut set = LevelSet::default();

    for (i, row) in reader.deserialize::<LevelRow>().enumerate() {
        let row = row?;
        let line = i + 2; // header is line 1

        let kind: LevelKind = row
            .level_type
            .parse()
            .map_err(|e| Error::InvalidInput(format!("{}:{line}: {e}", path.display())))?;

        let importance = row.importance.parse::<Importance>().unwrap_or_else(|_| {
            warn!(
                path = %path.display(),
                line,
                importance = %row.importance,
                "Unknown importance, using medium"
            );
            Importance::default()
        });

        let level = Level::new(kind, row.level_value, row.description, importance)
            .map_err(|e| Error::InvalidInput(format!("{}:{line}: {e}", path.display())))?;
        set.push(level);
    }
    Ok(set)
}
