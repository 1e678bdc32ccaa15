//! # State Stores
//!
//! Persistence for batch cursors and collector statistics.
//!
//! ## Description
//! [`JsonFileStore`] writes the whole value as pretty JSON to a temporary
//! sibling file and renames it over the target, so a crash mid-write
//! leaves the previous value intact. A missing file loads as `None`.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[async_trait]
pub trait StateStore<T>: Send + Sync {
    async fn load(&self) -> anyhow::Result<Option<T>>;

    async fn save(&self, value: &T) -> anyhow::Result<()>;
}

pub struct JsonFileStore<T> {
    path: PathBuf,
    _value: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), _value: PhantomData }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<T> StateStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load(&self) -> anyhow::Result<Option<T>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("reading {}", self.path.display())),
        };
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(value))
    }

    async fn save(&self, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore<T> {
    value: Mutex<Option<T>>,
}

impl<T: Clone> MemoryStore<T> {
    pub fn new(initial: Option<T>) -> Self {
        Self { value: Mutex::new(initial) }
    }

    pub fn get(&self) -> Option<T> {
        self.value.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl<T> StateStore<T> for MemoryStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn load(&self) -> anyhow::Result<Option<T>> {
        let guard = self.value.lock().map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        Ok(guard.clone())
    }

    async fn save(&self, value: &T) -> anyhow::Result<()> {
        let mut guard = self.value.lock().map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        *guard = Some(value.clone());
        Ok(())
    }
}
