use std::{
    convert::Infallible,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use log::{debug, warn};

use crate::{PersistenceError, Snapshot};

/// Fixed key the board's state is stored under.
pub const STORAGE_KEY: &str = "erlc_cad_full_v2_v1";

/// A snapshot together with the version it was installed at.
#[derive(Debug, Clone)]
pub struct Stamped {
    pub version: u64,
    pub snapshot: Arc<Snapshot>,
}

/// The result of a read-modify-replace cycle.
#[derive(Debug, Clone)]
pub struct Commit<T> {
    pub previous: Arc<Snapshot>,
    pub current: Arc<Snapshot>,
    pub version: u64,
    pub value: T,
}

/// Holds exactly one current snapshot.
///
/// Every replacement bumps a monotonically increasing version, so readers
/// can tell whether the state they computed from is still current.
#[derive(Debug)]
pub struct RecordStore {
    current: RwLock<Stamped>,
}

impl Default for RecordStore {
    fn default() -> Self {
        RecordStore::new(Snapshot::default())
    }
}

impl RecordStore {
    pub fn new(snapshot: Snapshot) -> Self {
        RecordStore {
            current: RwLock::new(Stamped {
                version: 0,
                snapshot: Arc::new(snapshot),
            }),
        }
    }

    pub fn read(&self) -> Arc<Snapshot> {
        self.stamped().snapshot
    }

    pub fn stamped(&self) -> Stamped {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn version(&self) -> u64 {
        self.stamped().version
    }

    /// Swaps in `snapshot` wholesale and returns its version.
    pub fn replace(&self, snapshot: Snapshot) -> u64 {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.version += 1;
        current.snapshot = Arc::new(snapshot);
        current.version
    }

    /// Computes the next snapshot from the current one and installs it,
    /// holding the writer guard for the whole cycle so that concurrent
    /// updates cannot interleave. On error the store is left untouched.
    pub fn update<T, E>(
        &self,
        f: impl FnOnce(&Snapshot) -> Result<(Snapshot, T), E>,
    ) -> Result<Commit<T>, E> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let (next, value) = f(&current.snapshot)?;
        let previous = std::mem::replace(&mut current.snapshot, Arc::new(next));
        current.version += 1;
        Ok(Commit {
            previous,
            current: current.snapshot.clone(),
            version: current.version,
            value,
        })
    }

    /// [`RecordStore::update`] for transforms that cannot fail.
    pub fn apply(&self, f: impl FnOnce(&Snapshot) -> Snapshot) -> Commit<()> {
        match self.update(|snapshot| Ok::<_, Infallible>((f(snapshot), ()))) {
            Ok(commit) => commit,
            Err(never) => match never {},
        }
    }
}

/// The single JSON blob holding a snapshot on disk.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        LocalStorage {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored snapshot; `None` when nothing was stored yet.
    pub async fn try_load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    /// Reads the stored snapshot, falling back to an empty board when the
    /// blob is absent or unreadable.
    pub async fn load(&self) -> Snapshot {
        match self.try_load().await {
            Ok(Some(snapshot)) => {
                debug!("Loaded board from {}", self.path.display());
                snapshot
            }
            Ok(None) => {
                debug!("No stored board at {}, starting empty", self.path.display());
                Snapshot::default()
            }
            Err(err) => {
                warn!(
                    "Discarding unreadable board at {}: {:#}",
                    self.path.display(),
                    anyhow::Error::from(err)
                );
                Snapshot::default()
            }
        }
    }

    /// Writes the snapshot through a sibling temporary file so a crash never
    /// leaves a half-written blob behind.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let raw = serde_json::to_vec(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source: std::io::Error| PersistenceError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&tmp, raw).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}
