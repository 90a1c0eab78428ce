//! Campaign progress kept as JSON under the user's config directory.

use anyhow::{Context, Result};
use chaosgrid_core::{MAX_LEVEL, ProgressStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const DIRNAME: &str = "chaosgrid";
const FILENAME: &str = "progress.json";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct ProgressFile {
    max_unlocked: u32,
}

impl Default for ProgressFile {
    fn default() -> Self {
        Self { max_unlocked: 1 }
    }
}

/// `$XDG_CONFIG_HOME/chaosgrid/progress.json`, falling back to
/// `~/.config`.
pub fn default_path() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join(DIRNAME).join(FILENAME)
}

#[derive(Debug)]
pub struct FileProgressStore {
    path: PathBuf,
    data: ProgressFile,
}

impl FileProgressStore {
    /// Loads the store at `path`. A missing file starts from level 1, an
    /// unreadable one is reported and replaced on the next save.
    pub fn open(path: PathBuf) -> Result<Self> {
        let data = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
                log::warn!("ignoring corrupt progress file {}: {err}", path.display());
                ProgressFile::default()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => ProgressFile::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        log::debug!("progress loaded from {}: {data:?}", path.display());
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locks everything but the first level again.
    pub fn reset(&mut self) -> Result<()> {
        self.data = ProgressFile::default();
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

impl ProgressStore for FileProgressStore {
    type Error = anyhow::Error;

    fn max_unlocked(&self) -> u32 {
        self.data.max_unlocked.clamp(1, MAX_LEVEL)
    }

    fn unlock_up_to(&mut self, level: u32) -> Result<()> {
        let level = level.min(MAX_LEVEL);
        if level <= self.data.max_unlocked {
            return Ok(());
        }
        self.data.max_unlocked = level;
        self.save()
    }
}
