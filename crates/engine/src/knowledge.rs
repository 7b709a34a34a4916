//! Knowledge archive - per-player cross-game experience
//!
//! Each run gets its own timestamped archive file so the first game starts
//! from a blank slate. Knowledge holds only reusable understanding, never
//! the specifics of a single match. Writes are in-memory first and mirrored
//! to disk on `flush`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

/// Port for the persistence collaborator holding per-player knowledge
pub trait KnowledgeArchive: Send + Sync {
    /// The stored knowledge text for a player, empty if none
    fn load(&self, player: &str) -> String;

    /// Replace a player's knowledge text (in memory)
    fn update(&mut self, player: &str, knowledge: &str);

    /// Replace or merge many entries at once
    fn bulk_update(&mut self, entries: &BTreeMap<String, String>) {
        for (player, knowledge) in entries {
            self.update(player, knowledge);
        }
    }

    /// Mirror the in-memory state to the backing store
    fn flush(&mut self) -> Result<()>;

    /// Where the archive lives on disk, if anywhere
    fn path(&self) -> Option<&Path>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArchiveData {
    session_id: String,
    created_at: String,
    players: BTreeMap<String, String>,
}

/// JSON-file-backed knowledge archive
pub struct JsonKnowledgeArchive {
    file_path: PathBuf,
    data: ArchiveData,
}

impl JsonKnowledgeArchive {
    /// Create a fresh, empty archive file under `dir`, named
    /// `<base>_<timestamp>.json`.
    pub fn create(dir: &Path, base: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating experience directory {}", dir.display()))?;

        let session_id = format!("{base}_{}", Local::now().format("%Y%m%d_%H%M%S"));
        let file_path = dir.join(format!("{session_id}.json"));
        let mut archive = Self {
            file_path,
            data: ArchiveData {
                session_id,
                created_at: Utc::now().to_rfc3339(),
                players: BTreeMap::new(),
            },
        };
        // Materialize an empty file for this run up front
        archive.flush()?;
        Ok(archive)
    }
}

impl KnowledgeArchive for JsonKnowledgeArchive {
    fn load(&self, player: &str) -> String {
        self.data.players.get(player).cloned().unwrap_or_default()
    }

    fn update(&mut self, player: &str, knowledge: &str) {
        self.data
            .players
            .insert(player.to_string(), knowledge.to_string());
    }

    fn flush(&mut self) -> Result<()> {
        let serialized =
            serde_json::to_string_pretty(&self.data).context("serializing knowledge archive")?;
        fs::write(&self.file_path, serialized)
            .with_context(|| format!("writing knowledge archive {}", self.file_path.display()))
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.file_path)
    }
}
