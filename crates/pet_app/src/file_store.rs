//! JSON-file backed [`KeyValueStore`]: one `<key>.json` file per key.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use pet_core::error::{CoreError, Result as CoreResult};
use pet_core::KeyValueStore;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    staged: Arc<AtomicU64>,
}

impl FileStore {
    /// Opens `dir`, creating it if needed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("unable to create data directory `{}`", dir.display()))?;
        Ok(Self {
            dir,
            staged: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> CoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(CoreError::persistence(key, "key is not a plain file name"));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CoreError::persistence(key, err)),
        }
    }

    async fn set(&self, key: &str, value: String) -> CoreResult<()> {
        let path = self.path_for(key)?;
        // Every write stages to its own file so concurrent writers never share one.
        let n = self.staged.fetch_add(1, Ordering::Relaxed);
        let staging = self.dir.join(format!("{key}.json.{n}.tmp"));
        tokio::fs::write(&staging, value.as_bytes())
            .await
            .map_err(|err| CoreError::persistence(key, err))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|err| CoreError::persistence(key, err))?;
        debug!(key, bytes = value.len(), "value written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trips_values() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path().join("state")).await.expect("open");

        assert_eq!(store.get("tasks").await.unwrap(), None);
        store.set("tasks", "[1]".to_string()).await.unwrap();
        store.set("tasks", "[1,2]".to_string()).await.unwrap();

        assert_eq!(store.get("tasks").await.unwrap().as_deref(), Some("[1,2]"));
        assert!(store.dir().join("tasks.json").exists());
        assert!(!store.dir().join("tasks.json.0.tmp").exists());
        assert!(!store.dir().join("tasks.json.1.tmp").exists());
    }

    #[tokio::test]
    async fn concurrent_writers_stage_separately() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).await.expect("open");

        let writers: Vec<_> = (0..16)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move { store.set("theme", n.to_string()).await })
            })
            .collect();
        for writer in writers {
            writer.await.expect("writer task").expect("write succeeds");
        }

        let stored = store.get("theme").await.unwrap().expect("value written");
        let n: u32 = stored.parse().expect("one whole value");
        assert!(n < 16);

        let mut entries = tokio::fs::read_dir(store.dir()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["theme.json".to_string()]);
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).await.expect("open");
        let err = store.set("../escape", "{}".to_string()).await.unwrap_err();
        assert!(matches!(err, CoreError::Persistence { .. }));
    }
}
