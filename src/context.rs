// File: ./src/context.rs
//! Where classcue keeps its files.
//!
//! A run touches four files: the config, the exported schedule text, the
//! cached booking-platform events and the delivery ledger, plus a log in the
//! cache directory. All of them hang off an [`AppContext`], so the binary
//! resolves them through the platform's project directories (or the `--root`
//! override) while tests point them at a throwaway directory that is removed
//! afterwards.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub const CONFIG_FILENAME: &str = "config.toml";
pub const DOCUMENT_FILENAME: &str = "schedule.txt";
pub const EVENTS_FILENAME: &str = "marvelous_events.json";
pub const LEDGER_FILENAME: &str = "reminder_state.json";
pub const LOG_FILENAME: &str = "classcue.log";

/// Data, config and cache roots, with the well-known file names under them.
pub trait AppContext: Send + Sync + std::fmt::Debug {
    fn get_data_dir(&self) -> Result<PathBuf>;
    fn get_config_dir(&self) -> Result<PathBuf>;
    fn get_cache_dir(&self) -> Result<PathBuf>;

    fn get_config_file_path(&self) -> Result<PathBuf> {
        Ok(self.get_config_dir()?.join(CONFIG_FILENAME))
    }

    /// Plain-text export of the schedule document, written by the fetcher.
    fn get_document_path(&self) -> Result<PathBuf> {
        Ok(self.get_data_dir()?.join(DOCUMENT_FILENAME))
    }

    /// Trimmed snapshot of the booking platform's events.
    fn get_events_path(&self) -> Result<PathBuf> {
        Ok(self.get_data_dir()?.join(EVENTS_FILENAME))
    }

    fn get_ledger_path(&self) -> Result<PathBuf> {
        Ok(self.get_data_dir()?.join(LEDGER_FILENAME))
    }

    fn get_log_path(&self) -> Option<PathBuf> {
        self.get_cache_dir().ok().map(|p| p.join(LOG_FILENAME))
    }
}

#[derive(Clone, Debug)]
pub struct StandardContext {
    override_root: Option<PathBuf>,
}

impl StandardContext {
    /// With `override_root`, everything lives under `<root>/{data,config,cache}`.
    pub fn new(override_root: Option<PathBuf>) -> Self {
        Self { override_root }
    }

    fn ensure_exists(path: PathBuf) -> Result<PathBuf> {
        if !path.exists() {
            std::fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(path)
    }

    fn get_proj_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "classcue", "classcue")
    }

    fn resolve(&self, subdir: &str) -> Result<PathBuf> {
        if let Some(root) = &self.override_root {
            return Self::ensure_exists(root.join(subdir));
        }
        let proj = Self::get_proj_dirs().ok_or_else(|| anyhow::anyhow!("No home directory"))?;
        let dir = match subdir {
            "data" => proj.data_dir(),
            "config" => proj.config_dir(),
            _ => proj.cache_dir(),
        };
        Self::ensure_exists(dir.to_path_buf())
    }
}

impl AppContext for StandardContext {
    fn get_data_dir(&self) -> Result<PathBuf> {
        self.resolve("data")
    }

    fn get_config_dir(&self) -> Result<PathBuf> {
        self.resolve("config")
    }

    fn get_cache_dir(&self) -> Result<PathBuf> {
        self.resolve("cache")
    }
}

#[derive(Clone, Debug)]
pub struct TestContext {
    pub root: PathBuf,
}

impl TestContext {
    /// A fresh `classcue_test_<uuid>` directory under the system temp dir.
    pub fn new() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let root = std::env::temp_dir().join(format!("classcue_test_{}", uuid));
        std::fs::create_dir_all(&root).expect("failed to create TestContext temp dir");
        Self { root }
    }

    fn subdir(&self, name: &str) -> Result<PathBuf> {
        let p = self.root.join(name);
        std::fs::create_dir_all(&p)?;
        Ok(p)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContext for TestContext {
    fn get_data_dir(&self) -> Result<PathBuf> {
        self.subdir("data")
    }

    fn get_config_dir(&self) -> Result<PathBuf> {
        self.subdir("config")
    }

    fn get_cache_dir(&self) -> Result<PathBuf> {
        self.subdir("cache")
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
