//! # Storage Module - Data Persistence Layer
//!
//! File-backed persistence for the chains subsystem.
//!
//! ## Architecture
//!
//! ```text
//! data/
//! ├── chains.json     ← Chain catalog (order = chain numbers)
//! ├── users/          ← One JSON record per user
//! └── temp/<session>/ ← Per-session chain.txt interchange files
//! ```
//!
//! ## Concurrency
//!
//! Several session workers share the same files. Every write takes an exclusive
//! `fs2` lock on a sidecar `.<name>.lock` file, writes a temp file and renames it
//! over the target. Read-modify-write updates (usage counters, per-user run counts)
//! hold the lock across the read so concurrent sessions never lose increments.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chainbbs::storage::Storage;
//!
//! fn main() -> anyhow::Result<()> {
//!     let storage = Storage::open("./data", "./data/chains.json")?;
//!     let catalog = storage.load_catalog()?;
//!     println!("{} chains", catalog.len());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod dropfile;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::bbs::roles;
use crate::bbs::session::{Session, SessionId};
use crate::config::Config;
use crate::validation::{safe_filename, secure_json_parse, validate_chain, validate_user_name};
use catalog::ChainCatalog;

const MAX_CATALOG_BYTES: u64 = 1_000_000;
const MAX_USER_BYTES: u64 = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(rename = "access_level", default = "default_user_level")]
    pub user_level: u8,
    /// Number of chains this user has run.
    #[serde(default)]
    pub chains_run: u32,
    pub first_login: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

fn default_user_level() -> u8 {
    roles::LEVEL_USER
}

impl User {
    pub fn new(username: &str, user_level: u8) -> Self {
        let now = Utc::now();
        User {
            username: username.to_string(),
            user_level,
            chains_run: 0,
            first_login: now,
            last_login: now,
        }
    }
}

/// Main storage interface
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
    catalog_path: PathBuf,
}

impl Storage {
    /// Open (creating directories as needed) a data directory.
    pub fn open(data_dir: impl AsRef<Path>, catalog_path: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)
            .map_err(|e| anyhow!("Failed to create data directory {}: {}", data_dir.display(), e))?;
        fs::create_dir_all(data_dir.join("users"))?;
        fs::create_dir_all(data_dir.join("temp"))?;
        Ok(Storage {
            data_dir,
            catalog_path: catalog_path.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(&config.storage.data_dir, config.catalog_path())
    }

    /// Return the base data directory path used by this storage instance
    pub fn base_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    /// Load the chain catalog. A missing file is an empty catalog.
    pub fn load_catalog(&self) -> Result<ChainCatalog> {
        let catalog = match fs::read_to_string(&self.catalog_path) {
            Ok(data) => secure_json_parse::<ChainCatalog>(&data, MAX_CATALOG_BYTES)
                .map_err(|e| anyhow!("Failed to parse {}: {}", self.catalog_path.display(), e))?,
            Err(e) if e.kind() == ErrorKind::NotFound => ChainCatalog::default(),
            Err(e) => {
                return Err(anyhow!(
                    "Failed reading {}: {}",
                    self.catalog_path.display(),
                    e
                ))
            }
        };
        for (i, chain) in catalog.chains().iter().enumerate() {
            if let Err(e) = validate_chain(chain) {
                warn!("chain #{} ({}) is not launchable: {}", i + 1, chain.description, e);
            }
        }
        Ok(catalog)
    }

    pub fn save_catalog(&self, catalog: &ChainCatalog) -> Result<()> {
        let content = serde_json::to_string_pretty(catalog)
            .map_err(|e| anyhow!("Failed to serialize chains: {}", e))?;
        with_file_lock(&self.catalog_path, || write_atomic(&self.catalog_path, &content))
    }

    /// Increment one chain's usage counter on disk; returns the new count.
    pub fn increment_chain_usage(&self, index: usize) -> Result<u32> {
        with_file_lock(&self.catalog_path, || {
            let mut catalog = self.load_catalog()?;
            let usage = catalog.increment_usage(index)?;
            let content = serde_json::to_string_pretty(&catalog)?;
            write_atomic(&self.catalog_path, &content)?;
            Ok(usage)
        })
    }

    /// Shared instance table used by [`crate::bbs::instance::FileInstanceRegistry`].
    pub fn instances_path(&self) -> PathBuf {
        self.data_dir.join("instances.json")
    }

    /// Number of stored user records.
    pub fn user_count(&self) -> Result<usize> {
        let dir = self.data_dir.join("users");
        let count = fs::read_dir(&dir)
            .with_context(|| format!("listing {}", dir.display()))?
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name();
                let name = name.to_string_lossy();
                !name.starts_with('.') && name.ends_with(".json")
            })
            .count();
        Ok(count)
    }

    fn user_path(&self, username: &str) -> PathBuf {
        self.data_dir
            .join("users")
            .join(format!("{}.json", safe_filename(username)))
    }

    pub fn get_user(&self, username: &str) -> Result<Option<User>> {
        let path = self.user_path(username);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let user: User = secure_json_parse(&content, MAX_USER_BYTES)
                    .map_err(|e| anyhow!("Failed to parse user file {}: {}", path.display(), e))?;
                Ok(Some(user))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow!("Failed reading user {}: {}", username, e)),
        }
    }

    pub fn put_user(&self, user: &User) -> Result<()> {
        let username = validate_user_name(&user.username)
            .map_err(|e| anyhow!("Invalid username: {}", e))?;
        let path = self.user_path(username);
        let content = serde_json::to_string_pretty(user)?;
        with_file_lock(&path, || write_atomic(&path, &content))
    }

    /// Fetch a user record, creating it at `user_level` on first sight, and stamp
    /// the login time.
    pub fn ensure_user(&self, username: &str, user_level: u8) -> Result<User> {
        let mut user = match self.get_user(username)? {
            Some(u) => u,
            None => {
                debug!("creating user record for {}", username);
                User::new(username, user_level)
            }
        };
        user.last_login = Utc::now();
        self.put_user(&user)?;
        Ok(user)
    }

    /// Count one chain run against `username`; returns the new total.
    pub fn record_chain_run(&self, username: &str) -> Result<u32> {
        let path = self.user_path(username);
        with_file_lock(&path, || {
            let mut user = self
                .get_user(username)?
                .ok_or_else(|| anyhow!("Unknown user {}", username))?;
            user.chains_run = user.chains_run.saturating_add(1);
            write_atomic(&path, &serde_json::to_string_pretty(&user)?)?;
            Ok(user.chains_run)
        })
    }

    fn session_temp_dir(&self, id: &SessionId) -> PathBuf {
        self.data_dir.join("temp").join(safe_filename(id.as_str()))
    }

    /// Write the session's `chain.txt` and return its path.
    pub fn create_chain_file(&self, session: &Session, config: &Config) -> Result<PathBuf> {
        let dir = self.session_temp_dir(&session.id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating session temp dir {}", dir.display()))?;
        let path = dir.join(dropfile::CHAIN_FILE_NAME);
        write_atomic(&path, &dropfile::chain_file_contents(session, config))?;
        Ok(path)
    }

    /// Scope for a session's temp directory; the directory is removed when the
    /// returned guard is dropped.
    pub fn session_temp(&self, id: &SessionId) -> SessionTemp {
        SessionTemp {
            storage: self.clone(),
            id: id.clone(),
        }
    }

    /// Remove a session's temp directory (best effort).
    pub fn remove_session_temp(&self, id: &SessionId) {
        let dir = self.session_temp_dir(id);
        if let Err(e) = fs::remove_dir_all(&dir) {
            if e.kind() != ErrorKind::NotFound {
                warn!("failed to remove {}: {}", dir.display(), e);
            }
        }
    }
}

/// Removes a session's temp directory (and its `chain.txt`) on drop.
pub struct SessionTemp {
    storage: Storage,
    id: SessionId,
}

impl Drop for SessionTemp {
    fn drop(&mut self) {
        self.storage.remove_session_temp(&self.id);
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("data");
    dir.join(format!(".{}.lock", base))
}

/// Run `f` while holding an exclusive lock on `path`'s sidecar lock file.
pub(crate) fn with_file_lock<T>(path: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(lock_path(path))
        .with_context(|| format!("opening lock for {}", path.display()))?;
    lock_file.lock_exclusive()?;
    let result = f();
    drop(lock_file);
    result
}

/// Replace `path` with `content` via a unique temp file and rename.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("data.json");
    let mut counter = 0u32;
    let tmp_path = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut tmp) => {
                tmp.write_all(content.as_bytes())?;
                tmp.flush()?;
                let _ = tmp.sync_all();
                break candidate;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
                continue;
            }
            Err(e) => return Err(anyhow!("Failed to create temp file for atomic write: {}", e)),
        }
    };

    fs::rename(&tmp_path, path)?;

    // Persist the rename (best-effort)
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
    Ok(())
}
