//! User registry: the set of identities that ever talked to the bot.
//!
//! The file backend keeps one decimal id per line, newline-terminated, and is
//! only ever appended to. All writes go through a mutex so the
//! read-check-append sequence cannot interleave and produce duplicates.

use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};

use crate::{domain::UserId, errors::Error, Result};

#[async_trait]
pub trait UserRegistry: Send + Sync {
    /// Idempotent insert. Returns `true` when `user` was not present before.
    async fn record(&self, user: UserId) -> Result<bool>;

    /// Number of distinct stored identities.
    async fn count(&self) -> Result<usize>;

    /// Snapshot of all identities in stored order.
    async fn all_identities(&self) -> Result<Vec<UserId>>;
}

// ============== File backend ==============

pub struct FileRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    // Shares the write lock so a read never sees a half-appended line.
    async fn read_ids(&self) -> Result<Vec<UserId>> {
        let _guard = self.write_lock.lock().await;
        let contents = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage(&self.path, e)),
        };
        Ok(parse_ids(&self.path, &contents))
    }
}

fn parse_ids(path: &Path, contents: &str) -> Vec<UserId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (lineno, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<i64>() {
            Ok(id) => {
                if seen.insert(id) {
                    out.push(UserId(id));
                }
            }
            Err(_) => tracing::warn!(
                path = %path.display(),
                line = lineno + 1,
                "skipping malformed registry entry"
            ),
        }
    }
    out
}

#[async_trait]
impl UserRegistry for FileRegistry {
    async fn record(&self, user: UserId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let contents = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::storage(&self.path, e)),
        };
        if parse_ids(&self.path, &contents).contains(&user) {
            return Ok(false);
        }

        let mut line = String::new();
        // Repair a trailing line written without its terminator.
        if !contents.is_empty() && !contents.ends_with('\n') {
            line.push('\n');
        }
        line.push_str(&user.0.to_string());
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::storage(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Error::storage(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| Error::storage(&self.path, e))?;

        tracing::debug!(user = %user, "registered new user");
        Ok(true)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read_ids().await?.len())
    }

    async fn all_identities(&self) -> Result<Vec<UserId>> {
        self.read_ids().await
    }
}

// ============== In-memory backend ==============

#[derive(Default)]
pub struct MemoryRegistry {
    ids: Mutex<Vec<UserId>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserId>) -> Self {
        let mut ids: Vec<UserId> = Vec::new();
        for u in users {
            if !ids.contains(&u) {
                ids.push(u);
            }
        }
        Self {
            ids: Mutex::new(ids),
        }
    }
}

#[async_trait]
impl UserRegistry for MemoryRegistry {
    async fn record(&self, user: UserId) -> Result<bool> {
        let mut ids = self.ids.lock().await;
        if ids.contains(&user) {
            return Ok(false);
        }
        ids.push(user);
        Ok(true)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.ids.lock().await.len())
    }

    async fn all_identities(&self) -> Result<Vec<UserId>> {
        Ok(self.ids.lock().await.clone())
    }
}
