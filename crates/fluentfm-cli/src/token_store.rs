//! File-backed token cache shared between CLI runs.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use directories::ProjectDirs;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use fluentfm_core::{AccessToken, TokenCache};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

/// Stored token data.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    expires_at: DateTime<Utc>,
}

type Store = HashMap<String, StoredToken>;

/// Token cache persisted as JSON, one entry per cache key.
///
/// Every access holds an exclusive lock on a sibling `.lock` file so that
/// concurrent invocations do not interleave writes.
#[derive(Debug, Clone)]
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `tokens.json` in the user data directory.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "fluentfm")
            .context("Could not determine data directory")?;
        Ok(dirs.data_dir().join("tokens.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> io::Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.path.with_extension("lock"))?;
        lock_file.lock_exclusive()?;
        Ok(lock_file)
    }

    fn read(&self) -> io::Result<Store> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Store::new()),
            Err(e) => return Err(e),
        };
        match serde_json::from_str(&json) {
            Ok(store) => Ok(store),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable token cache");
                Ok(Store::new())
            }
        }
    }

    fn write(&self, store: &Store) -> io::Result<()> {
        let json = serde_json::to_string_pretty(store)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path)?;

        // an existing file keeps its old mode on open; tighten it before writing
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))?;

        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Run `f` on the live entries under the lock, saving when it reports a
    /// change.
    fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> (T, bool)) -> io::Result<T> {
        let lock_file = self.lock()?;

        let mut store = self.read()?;
        let now = Utc::now();
        let before = store.len();
        store.retain(|_, entry| entry.expires_at > now);
        let pruned = store.len() != before;

        let (value, changed) = f(&mut store);
        if changed || pruned {
            self.write(&store)?;
        }

        lock_file.unlock()?;
        Ok(value)
    }

    fn report<T>(&self, op: &str, fallback: T, result: io::Result<T>) -> T {
        result.unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, op, "token cache unavailable");
            fallback
        })
    }
}

#[async_trait]
impl TokenCache for FileTokenCache {
    async fn has(&self, key: &str) -> bool {
        let result = self.with_store(|store| (store.contains_key(key), false));
        self.report("has", false, result)
    }

    async fn get(&self, key: &str) -> Option<AccessToken> {
        let result = self.with_store(|store| {
            let token = store.get(key).map(|entry| AccessToken::new(entry.token.clone()));
            (token, false)
        });
        self.report("get", None, result)
    }

    async fn put(&self, key: &str, token: &AccessToken, ttl: Duration) -> bool {
        let expires_at = Utc::now() + TimeDelta::from_std(ttl).unwrap_or(TimeDelta::zero());
        let result = self.with_store(|store| {
            store.insert(
                key.to_string(),
                StoredToken {
                    token: token.as_str().to_string(),
                    expires_at,
                },
            );
            (true, true)
        });
        debug!(key, "token stored");
        self.report("put", false, result)
    }

    async fn delete(&self, key: &str) -> bool {
        let result = self.with_store(|store| {
            let removed = store.remove(key).is_some();
            (removed, removed)
        });
        self.report("delete", false, result)
    }
}
