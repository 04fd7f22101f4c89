//! Journal and snapshot persistence for the memory store.
//!
//! Layout inside the data directory:
//!
//! - `foodshare.journal`: append-only frames, each a little-endian `u32`
//!   length followed by the MessagePack-encoded [`JournalEntry`] list of one
//!   commit.
//! - `foodshare.snapshot`: the full [`Tables`] image, replaced atomically.
//!
//! Recovery loads the snapshot and replays the journal on top of it.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::domain::{Event, Location, Reservation, UserRecord};

use super::tables::Tables;
use super::{StoreError, StoreResult};

pub(crate) const JOURNAL_FILE: &str = "foodshare.journal";
pub(crate) const SNAPSHOT_FILE: &str = "foodshare.snapshot";
const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// Journal Entry Types
// ============================================================================

/// One row write. A commit is journaled as one frame holding all of its
/// entries, so recovery sees either the whole commit or none of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalEntry {
    User(UserRecord),
    Event(Event),
    Reservation(Reservation),
    Location(Location),
}

// ============================================================================
// Store Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub tables: Tables,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: DateTime<Utc>,
    pub row_count: usize,
}

impl StoreSnapshot {
    pub fn new(tables: Tables) -> Self {
        let row_count = tables.row_count();

        Self {
            version: SNAPSHOT_VERSION,
            tables,
            metadata: SnapshotMetadata {
                created_at: Utc::now(),
                row_count,
            },
        }
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every append.
    Sync,
    /// Flush to the OS after every append.
    #[default]
    Async,
    /// Keep nothing on disk.
    None,
}

impl FromStr for DurabilityMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            "none" | "off" => Ok(Self::None),
            other => Err(format!(
                "DURABILITY must be one of: sync, async, none (got {other})"
            )),
        }
    }
}

// ============================================================================
// Journal
// ============================================================================

/// Length prefix in front of every frame.
const FRAME_HEADER_LEN: u64 = 4;
/// Largest frame replay will allocate for.
const MAX_FRAME_LEN: u64 = 64 * 1024 * 1024;

pub struct Journal {
    path: PathBuf,
    file: Option<File>,
    mode: DurabilityMode,
    /// Bytes known to end on a frame boundary.
    valid_len: u64,
    commits_since_checkpoint: usize,
}

impl Journal {
    pub fn open<P: AsRef<Path>>(path: P, mode: DurabilityMode) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let file = if mode == DurabilityMode::None {
            None
        } else {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| StoreError::persistence(format!("failed to open journal: {e}")))?;
            Some(file)
        };

        let valid_len = match &file {
            Some(file) => file
                .metadata()
                .map_err(|e| StoreError::persistence(format!("failed to stat journal: {e}")))?
                .len(),
            None => 0,
        };

        Ok(Self {
            path,
            file,
            mode,
            valid_len,
            commits_since_checkpoint: 0,
        })
    }

    /// Writes one commit as a single frame. A failed write is cut back off so
    /// the next frame still starts on a boundary.
    pub fn append(&mut self, commit: &[JournalEntry]) -> StoreResult<()> {
        if self.file.is_none() {
            return Ok(());
        }

        let payload = rmp_serde::to_vec(commit).map_err(|e| {
            StoreError::persistence(format!("failed to encode journal entry: {e}"))
        })?;
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|len| u64::from(*len) <= MAX_FRAME_LEN)
            .ok_or_else(|| StoreError::persistence("journal commit is too large"))?;

        let mut frame = Vec::with_capacity(payload.len() + FRAME_HEADER_LEN as usize);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);

        if let Err(err) = self.write_frame(&frame) {
            if let Err(cut_err) = self.cut(self.valid_len) {
                warn!(error = %cut_err, "failed to roll back partial journal write");
            }
            return Err(err);
        }

        self.valid_len += frame.len() as u64;
        self.commits_since_checkpoint += 1;
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> StoreResult<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };

        file.write_all(frame)
            .and_then(|()| file.flush())
            .map_err(|e| StoreError::persistence(format!("failed to write journal: {e}")))?;

        if self.mode == DurabilityMode::Sync {
            file.sync_data()
                .map_err(|e| StoreError::persistence(format!("failed to sync journal: {e}")))?;
        }
        Ok(())
    }

    /// Every complete commit in order. A torn trailing frame ends the read and
    /// is cut off the file, so later appends land on a frame boundary.
    pub fn replay(&mut self) -> StoreResult<Vec<Vec<JournalEntry>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .map_err(|e| StoreError::persistence(format!("failed to open journal: {e}")))?;
        let file_len = file
            .metadata()
            .map_err(|e| StoreError::persistence(format!("failed to stat journal: {e}")))?
            .len();
        let mut reader = BufReader::new(file);
        let mut commits = Vec::new();
        let mut offset = 0u64;

        while offset < file_len {
            if file_len - offset < FRAME_HEADER_LEN {
                break;
            }

            let mut len_bytes = [0u8; FRAME_HEADER_LEN as usize];
            reader.read_exact(&mut len_bytes).map_err(|e| {
                StoreError::persistence(format!("failed to read journal frame length: {e}"))
            })?;
            let len = u64::from(u32::from_le_bytes(len_bytes));

            if file_len - offset - FRAME_HEADER_LEN < len {
                break;
            }
            if len > MAX_FRAME_LEN {
                return Err(StoreError::persistence(format!(
                    "journal frame at offset {offset} claims {len} bytes"
                )));
            }

            let mut payload = vec![0u8; len as usize];
            reader.read_exact(&mut payload).map_err(|e| {
                StoreError::persistence(format!("failed to read journal frame: {e}"))
            })?;
            let commit: Vec<JournalEntry> = rmp_serde::from_slice(&payload).map_err(|e| {
                StoreError::persistence(format!("failed to decode journal entry: {e}"))
            })?;

            commits.push(commit);
            offset += FRAME_HEADER_LEN + len;
        }

        if offset < file_len {
            warn!(
                recovered = commits.len(),
                dropped_bytes = file_len - offset,
                "journal ends with a torn frame, cutting it off"
            );
            self.cut(offset)?;
        }

        self.valid_len = offset;
        self.commits_since_checkpoint = commits.len();
        Ok(commits)
    }

    fn cut(&mut self, len: u64) -> StoreResult<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };

        file.set_len(len)
            .and_then(|()| file.sync_data())
            .map_err(|e| StoreError::persistence(format!("failed to cut journal: {e}")))
    }

    pub fn truncate(&mut self) -> StoreResult<()> {
        if self.file.is_none() {
            return Ok(());
        }

        self.cut(0)?;
        self.valid_len = 0;
        self.commits_since_checkpoint = 0;
        Ok(())
    }

    pub fn commits_since_checkpoint(&self) -> usize {
        self.commits_since_checkpoint
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Writes to a temp file in the same directory, then renames over the target.
    pub fn save(&self, snapshot: &StoreSnapshot) -> StoreResult<()> {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let encoded = rmp_serde::to_vec(snapshot)
            .map_err(|e| StoreError::persistence(format!("failed to encode snapshot: {e}")))?;

        let mut temp = NamedTempFile::new_in(&dir)
            .map_err(|e| StoreError::persistence(format!("failed to create temp file: {e}")))?;
        temp.write_all(&encoded)
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| StoreError::persistence(format!("failed to write snapshot: {e}")))?;
        temp.persist(&self.path)
            .map_err(|e| StoreError::persistence(format!("failed to install snapshot: {e}")))?;

        Ok(())
    }

    pub fn load(&self) -> StoreResult<Option<StoreSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = fs::read(&self.path)
            .map_err(|e| StoreError::persistence(format!("failed to read snapshot: {e}")))?;
        let snapshot: StoreSnapshot = rmp_serde::from_slice(&data)
            .map_err(|e| StoreError::persistence(format!("failed to decode snapshot: {e}")))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::persistence(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        Ok(Some(snapshot))
    }
}

// ============================================================================
// Persistence Manager
// ============================================================================

pub struct PersistenceManager {
    journal: Journal,
    snapshot: SnapshotManager,
    mode: DurabilityMode,
    checkpoint_every: usize,
}

impl PersistenceManager {
    pub fn open<P: AsRef<Path>>(
        data_dir: P,
        mode: DurabilityMode,
        checkpoint_every: usize,
    ) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).map_err(|e| {
            StoreError::persistence(format!(
                "failed to create data directory {}: {e}",
                data_dir.display()
            ))
        })?;

        Ok(Self {
            journal: Journal::open(data_dir.join(JOURNAL_FILE), mode)?,
            snapshot: SnapshotManager::new(data_dir.join(SNAPSHOT_FILE)),
            mode,
            checkpoint_every: checkpoint_every.max(1),
        })
    }

    pub fn log(&mut self, commit: &[JournalEntry]) -> StoreResult<()> {
        self.journal.append(commit)
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.mode != DurabilityMode::None
            && self.journal.commits_since_checkpoint() >= self.checkpoint_every
    }

    pub fn checkpoint(&mut self, tables: &Tables) -> StoreResult<()> {
        if self.mode == DurabilityMode::None {
            return Ok(());
        }

        let snapshot = StoreSnapshot::new(tables.clone());
        let rows = snapshot.metadata.row_count;
        self.snapshot.save(&snapshot)?;
        self.journal.truncate()?;

        debug!(rows, "checkpoint written");
        Ok(())
    }

    /// Snapshot plus replayed journal. `None` when nothing was ever written.
    /// Must run before the first `log` so a torn tail is cut off first.
    pub fn recover(&mut self) -> StoreResult<Option<Tables>> {
        let snapshot = self.snapshot.load()?;
        let commits = self.journal.replay()?;

        if snapshot.is_none() && commits.is_empty() {
            return Ok(None);
        }

        let mut tables = snapshot.map(|snapshot| snapshot.tables).unwrap_or_default();
        let replayed = commits.len();
        for entry in commits.into_iter().flatten() {
            tables.apply(entry);
        }

        info!(rows = tables.row_count(), replayed, "store recovered");
        Ok(Some(tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Location, location::slugify};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn location(name: &str) -> Location {
        Location {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slugify(name),
            lat: 42.35,
            lng: -71.1,
            kind: "building".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn journal_replays_after_reopen() {
        let dir = TempDir::new().unwrap();
        let first = location("Marsh Chapel");

        {
            let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();
            manager.log(&[JournalEntry::Location(first.clone())]).unwrap();
        }

        let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();
        let tables = manager.recover().unwrap().unwrap();
        assert_eq!(tables.locations.get(&first.id), Some(&first));
    }

    #[test]
    fn checkpoint_truncates_journal_and_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Async, 2).unwrap();
        let mut tables = Tables::default();

        for name in ["GSU", "CDS"] {
            let entry = JournalEntry::Location(location(name));
            manager.log(std::slice::from_ref(&entry)).unwrap();
            tables.apply(entry);
        }
        assert!(manager.needs_checkpoint());

        manager.checkpoint(&tables).unwrap();
        assert!(!manager.needs_checkpoint());
        assert_eq!(fs::metadata(dir.path().join(JOURNAL_FILE)).unwrap().len(), 0);

        let recovered = manager.recover().unwrap().unwrap();
        assert_eq!(recovered, tables);
    }

    fn append_raw(dir: &Path, bytes: &[u8]) {
        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.join(JOURNAL_FILE))
            .unwrap();
        file.write_all(bytes).unwrap();
    }

    #[test]
    fn torn_trailing_frame_is_ignored() {
        let dir = TempDir::new().unwrap();
        let kept = location("Warren Towers");

        {
            let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();
            manager.log(&[JournalEntry::Location(kept.clone())]).unwrap();
        }

        let mut torn = 64u32.to_le_bytes().to_vec();
        torn.extend_from_slice(&[0xAB; 10]);
        append_raw(dir.path(), &torn);

        let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();
        let tables = manager.recover().unwrap().unwrap();
        assert_eq!(tables.locations.len(), 1);
        assert!(tables.locations.contains_key(&kept.id));
    }

    #[test]
    fn writes_after_a_torn_tail_survive_the_next_restart() {
        let dir = TempDir::new().unwrap();
        let first = location("Marsh Plaza");
        let later = [location("Kenmore Square"), location("Agganis Arena")];

        {
            let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();
            manager.log(&[JournalEntry::Location(first.clone())]).unwrap();
        }

        let mut torn = 64u32.to_le_bytes().to_vec();
        torn.extend_from_slice(&[0xAB; 10]);
        append_raw(dir.path(), &torn);

        {
            let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();
            manager.recover().unwrap();
            for location in &later {
                manager.log(&[JournalEntry::Location(location.clone())]).unwrap();
            }
        }

        let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();
        let tables = manager.recover().unwrap().unwrap();
        assert_eq!(tables.locations.len(), 3);
        for location in later.iter().chain([&first]) {
            assert!(tables.locations.contains_key(&location.id));
        }
    }

    #[test]
    fn huge_torn_length_prefix_is_cut_without_allocating() {
        let dir = TempDir::new().unwrap();
        let kept = location("Nickerson Field");

        {
            let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();
            manager.log(&[JournalEntry::Location(kept.clone())]).unwrap();
        }
        let intact_len = fs::metadata(dir.path().join(JOURNAL_FILE)).unwrap().len();

        let mut torn = u32::MAX.to_le_bytes().to_vec();
        torn.extend_from_slice(&[0x01; 3]);
        append_raw(dir.path(), &torn);

        let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();
        let tables = manager.recover().unwrap().unwrap();
        assert!(tables.locations.contains_key(&kept.id));
        assert_eq!(
            fs::metadata(dir.path().join(JOURNAL_FILE)).unwrap().len(),
            intact_len
        );
    }

    #[test]
    fn a_commit_torn_midway_is_dropped_whole() {
        let dir = TempDir::new().unwrap();
        let first = location("Myles Standish Hall");
        let pair = [location("West Campus"), location("East Campus")];

        {
            let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();
            manager.log(&[JournalEntry::Location(first.clone())]).unwrap();
            manager
                .log(&pair.clone().map(JournalEntry::Location))
                .unwrap();
        }

        let path = dir.path().join(JOURNAL_FILE);
        let len = fs::metadata(&path).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len - 6)
            .unwrap();

        let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Sync, 100).unwrap();
        let tables = manager.recover().unwrap().unwrap();
        assert_eq!(tables.locations.len(), 1);
        assert!(tables.locations.contains_key(&first.id));
    }

    #[test]
    fn empty_directory_recovers_nothing() {
        let dir = TempDir::new().unwrap();
        let mut manager = PersistenceManager::open(dir.path(), DurabilityMode::Async, 10).unwrap();
        assert!(manager.recover().unwrap().is_none());
    }

    #[test]
    fn durability_parses_from_env_values() {
        assert_eq!("SYNC".parse::<DurabilityMode>(), Ok(DurabilityMode::Sync));
        assert_eq!("off".parse::<DurabilityMode>(), Ok(DurabilityMode::None));
        assert!("eventually".parse::<DurabilityMode>().is_err());
    }
}
