use crate::error::{BibError, Result};
use crate::history::DEFAULT_HISTORY_DEPTH;
use crate::model::ClosureStyle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.json";
const DEFAULT_FILE_EXT: &str = ".bib";
const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
const DEFAULT_COMMENT_MARKER: char = '%';

/// Configuration for bibkeep, stored as `config.json` in the config directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BibConfig {
    /// Extension of the files a directory scan picks up
    #[serde(default = "default_file_ext")]
    pub file_ext: String,

    /// How often the change detector samples its source
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of whole-file snapshots kept for undo/redo
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,

    /// Closure style applied to inserted entries
    #[serde(default)]
    pub closure_style: ClosureStyle,

    /// Lines starting with this character never open an entry
    #[serde(default = "default_comment_marker")]
    pub comment_marker: char,
}

fn default_file_ext() -> String {
    DEFAULT_FILE_EXT.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_history_depth() -> usize {
    DEFAULT_HISTORY_DEPTH
}

fn default_comment_marker() -> char {
    DEFAULT_COMMENT_MARKER
}

impl Default for BibConfig {
    fn default() -> Self {
        Self {
            file_ext: default_file_ext(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            history_depth: DEFAULT_HISTORY_DEPTH,
            closure_style: ClosureStyle::default(),
            comment_marker: DEFAULT_COMMENT_MARKER,
        }
    }
}

impl BibConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(BibError::Io)?;
        let mut config: BibConfig =
            serde_json::from_str(&content).map_err(BibError::Serialization)?;
        let ext = config.file_ext.clone();
        config.set_file_ext(&ext);
        config.history_depth = config.history_depth.max(1);
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(BibError::Io)?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self).map_err(BibError::Serialization)?;
        fs::write(config_path, content).map_err(BibError::Io)?;
        Ok(())
    }

    /// Set the file extension (normalizes to start with a dot)
    pub fn set_file_ext(&mut self, ext: &str) {
        if ext.starts_with('.') {
            self.file_ext = ext.to_string();
        } else {
            self.file_ext = format!(".{}", ext);
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
