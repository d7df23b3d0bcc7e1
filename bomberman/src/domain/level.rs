// Plain-text level format: 17 grid rows, then one entity per line.

use super::effects::EffectKind;
use super::grid::{TerrainGrid, Tile};
use super::monster::MonsterKind;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const LEVEL_ROWS: usize = 17;

#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("failed to read level file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("level {level_id} has {found} grid rows, expected {}", LEVEL_ROWS)]
    MissingRows { level_id: String, found: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnKind {
    Player,
    Box,
    Monster(MonsterKind),
    Effect(EffectKind),
}

impl SpawnKind {
    fn from_token(token: &str) -> Option<Self> {
        let kind = match token {
            "PLAYER" => SpawnKind::Player,
            "BOX" => SpawnKind::Box,
            "GHOST" => SpawnKind::Monster(MonsterKind::Ghost),
            "SLIME" => SpawnKind::Monster(MonsterKind::Slime),
            "BALLOON" => SpawnKind::Monster(MonsterKind::Balloon),
            "ONION" => SpawnKind::Monster(MonsterKind::Onion),
            other => SpawnKind::Effect(EffectKind::from_level_token(other)?),
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spawn {
    pub kind: SpawnKind,
    pub tile_x: i32,
    pub tile_y: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub id: String,
    pub grid: TerrainGrid,
    pub spawns: Vec<Spawn>,
}

impl Level {
    pub fn load(path: &Path) -> Result<Self, LevelError> {
        let text = std::fs::read_to_string(path).map_err(|source| LevelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(id, &text)
    }

    pub fn parse(id: impl Into<String>, text: &str) -> Result<Self, LevelError> {
        let id = id.into();
        let mut lines = text.lines();

        let rows: Vec<Vec<Tile>> = lines
            .by_ref()
            .take(LEVEL_ROWS)
            .map(|line| line.split_whitespace().map(tile_from_token).collect())
            .collect();
        if rows.len() < LEVEL_ROWS {
            return Err(LevelError::MissingRows {
                level_id: id,
                found: rows.len(),
            });
        }

        let spawns = lines
            .enumerate()
            .filter_map(|(offset, line)| parse_spawn(&id, LEVEL_ROWS + offset + 1, line))
            .collect();

        Ok(Self {
            id,
            grid: TerrainGrid::from_rows(rows),
            spawns,
        })
    }

    /// First PLAYER tile in the file, if any.
    pub fn player_spawn(&self) -> Option<(i32, i32)> {
        self.spawns
            .iter()
            .find(|s| s.kind == SpawnKind::Player)
            .map(|s| (s.tile_x, s.tile_y))
    }
}

fn tile_from_token(token: &str) -> Tile {
    match token {
        "SOLID" => Tile::Solid,
        "BRICK" => Tile::Brick,
        _ => Tile::Grass,
    }
}

fn parse_spawn(level_id: &str, line_no: usize, line: &str) -> Option<Spawn> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return None;
    }
    if parts.len() < 3 {
        warn!(level_id, line_no, line, "invalid entity line; skipping");
        return None;
    }
    let (Ok(tile_x), Ok(tile_y)) = (parts[1].parse::<i32>(), parts[2].parse::<i32>()) else {
        warn!(level_id, line_no, line, "invalid entity coordinates; skipping");
        return None;
    };
    let Some(kind) = SpawnKind::from_token(parts[0]) else {
        warn!(level_id, line_no, entity = parts[0], "unknown entity type; skipping");
        return None;
    };
    Some(Spawn {
        kind,
        tile_x,
        tile_y,
    })
}
