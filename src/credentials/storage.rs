//! Slot Storage Module
//!
//! Durable key/value slots that survive restarts. All slots are written as
//! one document so a multi-slot change lands in a single atomic rename.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Slot name to value.
pub type Slots = BTreeMap<String, String>;

// == Slot Storage Trait ==
/// Persistence backend for the credential slots.
#[async_trait]
pub trait SlotStorage: Send + Sync {
    /// Reads every persisted slot.
    async fn load(&self) -> Result<Slots>;

    /// Replaces the persisted slots with `slots`.
    async fn save(&self, slots: &Slots) -> Result<()>;
}

// == File Slot Storage ==
/// Stores slots as a JSON object in a single file.
#[derive(Debug, Clone)]
pub struct FileSlotStorage {
    path: PathBuf,
}

impl FileSlotStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SlotStorage for FileSlotStorage {
    async fn load(&self) -> Result<Slots> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Slots::new()),
            Err(err) => return Err(ClientError::storage(err)),
        };

        // A corrupt file means no usable session, not a dead client
        match serde_json::from_str(&text) {
            Ok(slots) => Ok(slots),
            Err(err) => {
                warn!(path = %self.path.display(), "discarding unreadable credential file: {}", err);
                Ok(Slots::new())
            }
        }
    }

    async fn save(&self, slots: &Slots) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(ClientError::storage)?;
            }
        }

        let text = serde_json::to_string_pretty(slots).map_err(ClientError::storage)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, text)
            .await
            .map_err(ClientError::storage)?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(ClientError::storage)?;

        debug!(path = %self.path.display(), slots = slots.len(), "credential slots saved");
        Ok(())
    }
}
