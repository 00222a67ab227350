use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::codec;
use crate::directory::DirectoryTree;
use crate::error::{PakError, Result};
use crate::hasher;
use crate::index::PakIndex;
use crate::pak::Entry;
use crate::pakfile::{PakState, check_md5};

/// Where the bytes of a virtual entry come from.
pub trait PayloadSource: Send {
    fn len(&self) -> io::Result<u64>;

    fn read_all(&self) -> io::Result<Vec<u8>>;
}

impl PayloadSource for Vec<u8> {
    fn len(&self) -> io::Result<u64> {
        Ok(Vec::len(self) as u64)
    }

    fn read_all(&self) -> io::Result<Vec<u8>> {
        Ok(self.clone())
    }
}

/// A loose file on disk, read on every unpack.
impl PayloadSource for PathBuf {
    fn len(&self) -> io::Result<u64> {
        Ok(fs::metadata(self)?.len())
    }

    fn read_all(&self) -> io::Result<Vec<u8>> {
        fs::read(self)
    }
}

/// One row of a parsed manifest.
pub struct ManifestEntry {
    pub name: String,
    pub create_time: i64,
    pub modify_time: i64,
    /// All zeros when unknown; unpacking then skips verification.
    pub md5: [u8; 16],
    pub source: Box<dyn PayloadSource>,
}

impl ManifestEntry {
    pub fn new(name: impl Into<String>, source: Box<dyn PayloadSource>) -> Self {
        Self {
            name: name.into(),
            create_time: 0,
            modify_time: 0,
            md5: [0; 16],
            source,
        }
    }

    /// An in-memory payload with its hash already computed.
    pub fn in_memory(name: impl Into<String>, data: Vec<u8>) -> Self {
        let md5 = hasher::md5_hash(&data);
        Self::new(name, Box::new(data)).with_md5(md5)
    }

    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(name, Box::new(path.into()))
    }

    pub fn with_md5(mut self, md5: [u8; 16]) -> Self {
        self.md5 = md5;
        self
    }

    pub fn with_times(mut self, create_time: i64, modify_time: i64) -> Self {
        self.create_time = create_time;
        self.modify_time = modify_time;
        self
    }
}

impl std::fmt::Debug for ManifestEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestEntry")
            .field("name", &self.name)
            .field("md5", &hasher::md5_hex(&self.md5))
            .finish_non_exhaustive()
    }
}

/// An archive assembled from a manifest instead of a pak store.
///
/// Offsets are synthetic: each entry starts where the previous one ended and
/// padding is always zero. Nothing is persisted on close.
pub struct VirtualPak {
    state: PakState,
    index: PakIndex,
    sources: HashMap<String, Box<dyn PayloadSource>>,
    next_offset: u64,
    tree: Option<DirectoryTree>,
}

impl std::fmt::Debug for VirtualPak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualPak")
            .field("state", &self.state)
            .field("files", &self.index.len())
            .field("next_offset", &self.next_offset)
            .finish()
    }
}

impl Default for VirtualPak {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualPak {
    pub fn new() -> Self {
        Self {
            state: PakState::Closed,
            index: PakIndex::new(),
            sources: HashMap::new(),
            next_offset: 0,
            tree: None,
        }
    }

    pub fn from_manifest(manifest: impl IntoIterator<Item = ManifestEntry>) -> Result<Self> {
        let mut pak = Self::new();
        pak.open(manifest)?;
        Ok(pak)
    }

    pub fn open(&mut self, manifest: impl IntoIterator<Item = ManifestEntry>) -> Result<()> {
        self.expect_state(PakState::Closed)?;
        self.state = PakState::Opening;
        if let Err(e) = self.load(manifest) {
            self.reset();
            return Err(e);
        }
        self.state = PakState::Ready;
        tracing::debug!(files = self.index.len(), "opened virtual pak");
        Ok(())
    }

    fn load(&mut self, manifest: impl IntoIterator<Item = ManifestEntry>) -> Result<()> {
        for item in manifest {
            let size = item.source.len()?;
            self.insert(&item.name, item.source, size, item.md5, item.create_time, item.modify_time)?;
        }
        Ok(())
    }

    fn insert(
        &mut self,
        name: &str,
        source: Box<dyn PayloadSource>,
        size: u64,
        md5: [u8; 16],
        create_time: i64,
        modify_time: i64,
    ) -> Result<Entry> {
        codec::entry::check_name(name)?;
        let entry = Entry::new(name, self.next_offset, size, 0)
            .with_md5(md5)
            .with_times(create_time, modify_time);
        self.index.add(entry.clone())?;
        self.sources.insert(name.to_string(), source);
        self.next_offset += size;
        self.tree = None;
        Ok(entry)
    }

    /// Drops every entry. Closing a closed pak does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.state == PakState::Closed {
            return Ok(());
        }
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.index.clear();
        self.sources.clear();
        self.next_offset = 0;
        self.tree = None;
        self.state = PakState::Closed;
    }

    pub fn state(&self) -> PakState {
        self.state
    }

    pub fn list(&self) -> Result<Vec<&Entry>> {
        self.expect_state(PakState::Ready)?;
        Ok(self.index.list())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    pub fn entry(&self, name: &str) -> Result<&Entry> {
        self.expect_state(PakState::Ready)?;
        self.index
            .get(name)
            .ok_or_else(|| PakError::EntryNotFound(name.to_string()))
    }

    pub fn directory_tree(&mut self) -> Result<&DirectoryTree> {
        self.expect_state(PakState::Ready)?;
        Ok(self.tree.get_or_insert_with(|| DirectoryTree::build(&self.index)))
    }

    /// Adds an in-memory payload.
    pub fn pack(&mut self, name: &str, payload: &[u8], create_time: i64, modify_time: i64) -> Result<Entry> {
        self.expect_state(PakState::Ready)?;
        if self.index.contains(name) {
            return Err(PakError::DuplicateName(name.to_string()));
        }
        let md5 = hasher::md5_hash(payload);
        let size = payload.len() as u64;
        self.insert(name, Box::new(payload.to_vec()), size, md5, create_time, modify_time)
    }

    pub fn unpack(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self.entry(name)?;
        let source = self
            .sources
            .get(name)
            .ok_or_else(|| PakError::EntryNotFound(name.to_string()))?;

        let data = source.read_all()?;
        if data.len() as u64 != entry.size() {
            return Err(PakError::Truncated {
                what: "entry payload",
                expected: entry.size(),
                found: data.len() as u64,
            });
        }

        check_md5(entry, hasher::md5_hash(&data))?;
        Ok(data)
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.expect_state(PakState::Ready)?;
        let slot = self.index.remove(name)?;
        // no free list here, the synthetic range is simply gone
        self.index.take_free_slot(slot);
        self.sources.remove(name);
        self.tree = None;
        Ok(())
    }

    fn expect_state(&self, expected: PakState) -> Result<()> {
        if self.state != expected {
            return Err(PakError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }
}
