use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use gtidflow_core::GtidSet;
use tracing::{debug, info, warn};

use crate::error::{StateError, StateResult};
use crate::CheckpointStore;

/// File-backed checkpoint store.
///
/// The file holds the canonical GTID set text and nothing else. Every
/// update rewrites it through a temporary sibling file that is synced and
/// renamed into place, so the file always holds one complete value.
pub struct FileCheckpointStore {
    path: PathBuf,
    current: Mutex<GtidSet>,
}

impl FileCheckpointStore {
    /// Open the store at `path`.
    ///
    /// An existing non-empty file is the position. Otherwise `init_gtidset`
    /// is parsed, adopted and written out immediately.
    pub fn open(path: impl AsRef<Path>, init_gtidset: &str) -> StateResult<Self> {
        let path = path.as_ref().to_path_buf();

        let current = match read_position(&path)? {
            Some(set) => {
                info!(path = %path.display(), gtid_set = %set, "Loaded checkpoint");
                set
            }
            None => {
                let set = GtidSet::parse(init_gtidset)?;
                if set.is_empty() {
                    return Err(StateError::NoInitialPosition(path.display().to_string()));
                }

                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                write_atomic(&path, &set.to_string())?;
                info!(path = %path.display(), gtid_set = %set, "Initialized checkpoint");
                set
            }
        };

        Ok(Self {
            path,
            current: Mutex::new(current),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a checkpoint file without creating it.
    pub fn peek(path: impl AsRef<Path>) -> StateResult<Option<GtidSet>> {
        read_position(path.as_ref())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn update(&self, transaction_id: &str) -> StateResult<()> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        let mut next = current.clone();
        next.update(transaction_id)?;
        write_atomic(&self.path, &next.to_string())?;

        debug!(gtid = transaction_id, "Checkpoint persisted");
        *current = next;
        Ok(())
    }

    fn read(&self) -> StateResult<GtidSet> {
        let _guard = self.current.lock().unwrap_or_else(|e| e.into_inner());

        read_position(&self.path)?.ok_or_else(|| StateError::Corrupt {
            path: self.path.display().to_string(),
            source: gtidflow_core::Error::InvalidGtid {
                input: String::new(),
                reason: "checkpoint file is empty".into(),
            },
        })
    }
}

/// Parse the stored position; `None` when the file is absent or blank.
fn read_position(path: &Path) -> StateResult<Option<GtidSet>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if content.trim().is_empty() {
        return Ok(None);
    }

    GtidSet::parse(&content)
        .map(Some)
        .map_err(|source| StateError::Corrupt {
            path: path.display().to_string(),
            source,
        })
}

fn write_atomic(path: &Path, content: &str) -> StateResult<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let written = write_synced(&temp_path, content).and_then(|()| fs::rename(&temp_path, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    sync_parent(path);
    Ok(())
}

/// The rename is durable only once the directory entry is synced.
#[cfg(unix)]
fn sync_parent(path: &Path) {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        warn!(path = %parent.display(), error = %e, "Failed to sync checkpoint directory");
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

fn write_synced(path: &Path, content: &str) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()
}
