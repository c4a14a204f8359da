//! File-backed breaker store.
//!
//! All six states live in one JSON document, which is the only copy: every
//! read goes back to the file, so several processes can share one state
//! file. Reads hold a shared lock and writes an exclusive lock on a sibling
//! `<file>.lock`. The document itself is replaced through a temp file +
//! rename, so a crash mid-write leaves the previous document intact, and the
//! lock cannot live on the document's inode.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tradeguard_risk::{BreakerStore, BreakerType, CircuitBreakerState, RiskResult};

use crate::error::{PersistenceError, PersistenceResult};

const DOCUMENT_VERSION: u32 = 1;

type StateMap = BTreeMap<BreakerType, CircuitBreakerState>;

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    breakers: Vec<CircuitBreakerState>,
}

/// Advisory lock on the store's lock file, released on drop.
struct FileLock {
    file: File,
}

impl FileLock {
    fn open(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
    }

    fn shared(path: &Path) -> io::Result<Self> {
        let file = Self::open(path)?;
        FileExt::lock_shared(&file)?;
        Ok(Self { file })
    }

    fn exclusive(path: &Path) -> io::Result<Self> {
        let file = Self::open(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(?e, "Failed to release breaker state lock");
        }
    }
}

/// Breaker store persisted to a JSON file.
#[derive(Debug)]
pub struct FileBreakerStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileBreakerStore {
    /// Open the store at `path`, checking any existing file.
    ///
    /// Parent directories are created. A missing file is an empty store; a
    /// corrupt one is rejected here rather than on first use.
    pub fn open(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let store = Self {
            lock_path: with_suffix(&path, ".lock"),
            path,
        };

        let breakers = {
            let _lock = FileLock::shared(&store.lock_path)?;
            store.read_states()?.len()
        };

        info!(
            path = %store.path.display(),
            breakers,
            "Opened breaker state file"
        );

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document contents. Caller must hold the lock.
    fn read_states(&self) -> PersistenceResult<StateMap> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => self.parse(&raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StateMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn parse(&self, raw: &str) -> PersistenceResult<StateMap> {
        let corrupt = |reason: String| PersistenceError::Corrupt {
            path: self.path.display().to_string(),
            reason,
        };

        let document: StateDocument =
            serde_json::from_str(raw).map_err(|e| corrupt(e.to_string()))?;

        if document.version != DOCUMENT_VERSION {
            return Err(corrupt(format!(
                "unsupported version {}, expected {DOCUMENT_VERSION}",
                document.version
            )));
        }

        let mut states = StateMap::new();
        for state in document.breakers {
            let breaker = state.breaker_type;
            if states.insert(breaker, state).is_some() {
                return Err(corrupt(format!("duplicate entry for {breaker}")));
            }
        }
        Ok(states)
    }

    /// Replace the document. Caller must hold the exclusive lock.
    fn write_states(&self, states: &StateMap) -> PersistenceResult<()> {
        let document = StateDocument {
            version: DOCUMENT_VERSION,
            breakers: states.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        let tmp_path = with_suffix(&self.path, ".tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), "Breaker state file written");
        Ok(())
    }

    fn modify(
        &self,
        breaker: BreakerType,
        f: &mut dyn FnMut(Option<CircuitBreakerState>) -> CircuitBreakerState,
    ) -> PersistenceResult<CircuitBreakerState> {
        let _lock = FileLock::exclusive(&self.lock_path)?;
        let mut states = self.read_states()?;

        let current = states.get(&breaker).cloned();
        let next = f(current.clone());
        if current.as_ref() != Some(&next) {
            states.insert(breaker, next.clone());
            self.write_states(&states)?;
        }
        Ok(next)
    }
}

/// `path` with `suffix` appended to its file name.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

impl BreakerStore for FileBreakerStore {
    fn get(&self, breaker: BreakerType) -> RiskResult<Option<CircuitBreakerState>> {
        let _lock = FileLock::shared(&self.lock_path).map_err(PersistenceError::from)?;
        Ok(self.read_states()?.remove(&breaker))
    }

    fn set(&self, state: CircuitBreakerState) -> RiskResult<()> {
        let breaker = state.breaker_type;
        self.modify(breaker, &mut |_| state.clone())?;
        Ok(())
    }

    fn get_all(&self) -> RiskResult<Vec<CircuitBreakerState>> {
        let _lock = FileLock::shared(&self.lock_path).map_err(PersistenceError::from)?;
        let mut states = self.read_states()?;
        Ok(BreakerType::ALL
            .iter()
            .filter_map(|t| states.remove(t))
            .collect())
    }

    fn update(
        &self,
        breaker: BreakerType,
        f: &mut dyn FnMut(Option<CircuitBreakerState>) -> CircuitBreakerState,
    ) -> RiskResult<CircuitBreakerState> {
        Ok(self.modify(breaker, f)?)
    }
}
