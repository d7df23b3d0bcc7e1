// Level assets, loaded once at startup and immutable afterwards.

use crate::domain::{Level, LevelError};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("cannot read levels directory {path}: {source}")]
    MissingDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no level files (*.txt) in {0}")]
    Empty(PathBuf),
    #[error(transparent)]
    Level(#[from] LevelError),
}

#[derive(Debug, Default)]
pub struct AssetBundle {
    levels: BTreeMap<String, Level>,
}

impl AssetBundle {
    /// Parses every `*.txt` file in `dir`; the file stem is the level id.
    pub fn load(dir: &Path) -> Result<Self, AssetError> {
        let entries = std::fs::read_dir(dir).map_err(|source| AssetError::MissingDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut levels = BTreeMap::new();
        for entry in entries {
            let path = entry
                .map_err(|source| AssetError::MissingDir {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let level = Level::load(&path)?;
            levels.insert(level.id.clone(), level);
        }

        if levels.is_empty() {
            return Err(AssetError::Empty(dir.to_path_buf()));
        }
        info!(dir = %dir.display(), levels = levels.len(), "assets loaded");
        Ok(Self { levels })
    }

    pub fn from_levels(levels: impl IntoIterator<Item = Level>) -> Self {
        Self {
            levels: levels.into_iter().map(|l| (l.id.clone(), l)).collect(),
        }
    }

    pub fn level(&self, id: &str) -> Option<&Level> {
        self.levels.get(id)
    }

    pub fn level_ids(&self) -> impl Iterator<Item = &str> {
        self.levels.keys().map(String::as_str)
    }
}
