use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::Path;

use crate::codec;
use crate::directory::DirectoryTree;
use crate::error::{PakError, Result};
use crate::hasher::{self, ContentHasher};
use crate::index::PakIndex;
use crate::pak::{Entry, FormatDescriptor, PakType};
use crate::progress::{Progress, ProgressHandler, ProgressPhase};
use crate::read;
use crate::store::PakStore;
use crate::write;

pub const DEFAULT_BLOCK_SIZE: u32 = 512;

const COPY_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PakState {
    Closed,
    Opening,
    Ready,
}

/// Bytes needed after `end` to reach the next multiple of `block_size`.
#[inline]
pub fn padding_for(end: u64, block_size: u64) -> u64 {
    (block_size - end % block_size) % block_size
}

pub struct PakFileBuilder {
    descriptor: FormatDescriptor,
    block_size: u32,
    progress: Option<ProgressHandler>,
}

impl Default for PakFileBuilder {
    fn default() -> Self {
        Self {
            descriptor: FormatDescriptor::classic().clone(),
            block_size: DEFAULT_BLOCK_SIZE,
            progress: None,
        }
    }
}

impl PakFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor(mut self, descriptor: FormatDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn on_progress<F>(mut self, on_progress: F) -> Self
    where
        F: FnMut(ProgressPhase, usize, usize) + Send + 'static,
    {
        self.progress = Some(Box::new(on_progress));
        self
    }

    fn build<S: PakStore>(self) -> (PakFile<S>, FormatDescriptor) {
        let mut pak = PakFile::new();
        pak.block_size = self.block_size as u64;
        pak.progress.set(self.progress);
        (pak, self.descriptor)
    }

    pub fn open<S: PakStore>(self, store: S) -> Result<PakFile<S>> {
        let (mut pak, descriptor) = self.build();
        pak.open(store, descriptor)?;
        Ok(pak)
    }

    pub fn create<S: PakStore>(self, store: S) -> Result<PakFile<S>> {
        let (mut pak, descriptor) = self.build();
        pak.create(store, descriptor)?;
        Ok(pak)
    }

    pub fn open_path(self, path: impl AsRef<Path>) -> Result<PakFile<File>> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| PakError::IO(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e))))?;
        self.open(file)
    }

    pub fn create_path(self, path: impl AsRef<Path>) -> Result<PakFile<File>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        self.create(file)
    }
}

/// Where a payload of a given size will be written.
struct Allocation {
    /// Deleted slot consumed by the write.
    slot: Option<usize>,
    offset: u64,
    padding: u64,
    /// First byte after payload and padding.
    end: u64,
    /// Unused tail of the consumed slot, kept on the free list.
    remainder: Option<Entry>,
    /// Span skipped to get past the FAT still on disk, freed on close.
    fat_gap: Option<Entry>,
}

/// A physical pak file opened for reading and writing.
///
/// Layout: header at offset 0 (reserved up to the first block boundary), the
/// block-aligned payload region, then the FAT up to the end of the store.
pub struct PakFile<S> {
    descriptor: FormatDescriptor,
    block_size: u64,
    state: PakState,
    store: Option<S>,
    index: PakIndex,
    payload_end: u64,
    /// FAT written by the previous close. Appends go after it until the next close.
    stored_fat: Option<Range<u64>>,
    fat_gap: Option<Entry>,
    dirty: bool,
    tree: Option<DirectoryTree>,
    progress: Progress,
}

impl<S: PakStore> Default for PakFile<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PakStore> PakFile<S> {
    /// A closed engine using the classic descriptor and the default block size.
    pub fn new() -> Self {
        Self {
            descriptor: FormatDescriptor::classic().clone(),
            block_size: DEFAULT_BLOCK_SIZE as u64,
            state: PakState::Closed,
            store: None,
            index: PakIndex::new(),
            payload_end: 0,
            stored_fat: None,
            fat_gap: None,
            dirty: false,
            tree: None,
            progress: Progress::default(),
        }
    }

    pub fn set_progress_handler<F>(&mut self, on_progress: F)
    where
        F: FnMut(ProgressPhase, usize, usize) + Send + 'static,
    {
        self.progress.set(Some(Box::new(on_progress)));
    }

    pub fn open(&mut self, mut store: S, descriptor: FormatDescriptor) -> Result<()> {
        self.expect_state(PakState::Closed)?;
        descriptor.validate()?;

        self.state = PakState::Opening;
        self.progress.report(ProgressPhase::OpeningFile, 0, 1);

        let progress = &mut self.progress;
        let loaded = match read::read_archive(&mut store, &descriptor, |phase, step, max| {
            progress.report(phase, step, max)
        }) {
            Ok(loaded) => loaded,
            Err(e) => {
                self.state = PakState::Closed;
                return Err(e);
            }
        };

        let header_end = self.header_region_end(&descriptor);
        let payload_end = loaded.index.payload_end().unwrap_or(0).max(header_end);
        if payload_end > loaded.fat_offset {
            tracing::warn!(payload_end, fat_offset = loaded.fat_offset, "payload region overlaps the FAT");
        }

        self.progress.report(ProgressPhase::GeneratingDirectories, 0, 1);
        self.tree = Some(DirectoryTree::build(&loaded.index));
        self.progress.report(ProgressPhase::GeneratingDirectories, 1, 1);

        self.descriptor = descriptor;
        self.index = loaded.index;
        self.payload_end = payload_end;
        self.stored_fat = (loaded.fat_end > loaded.fat_offset).then_some(loaded.fat_offset..loaded.fat_end);
        self.fat_gap = None;
        self.store = Some(store);
        self.dirty = false;
        self.state = PakState::Ready;
        self.progress.report(ProgressPhase::OpeningFile, 1, 1);

        tracing::debug!(
            descriptor = %self.descriptor.name,
            files = self.index.len(),
            deleted = self.index.deleted().len(),
            payload_end,
            "opened pak"
        );
        Ok(())
    }

    /// Starts a new, empty archive on `store`. Nothing is written until [`PakFile::close`].
    pub fn create(&mut self, store: S, descriptor: FormatDescriptor) -> Result<()> {
        self.expect_state(PakState::Closed)?;
        descriptor.validate()?;

        self.payload_end = self.header_region_end(&descriptor);
        self.descriptor = descriptor;
        self.index = PakIndex::new();
        self.stored_fat = None;
        self.fat_gap = None;
        self.tree = None;
        self.store = Some(store);
        self.dirty = true;
        self.state = PakState::Ready;
        Ok(())
    }

    /// Writes FAT and header if anything changed. Closing a closed pak does nothing.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            PakState::Closed => return Ok(()),
            PakState::Opening => return self.expect_state(PakState::Ready),
            PakState::Ready => {}
        }

        if let Some(gap) = self.fat_gap.take() {
            self.index.push_deleted(gap);
        }
        let state = self.state;
        let store = self.store.as_mut().ok_or(PakError::InvalidState {
            expected: PakState::Ready,
            actual: state,
        })?;
        if self.dirty {
            let progress = &mut self.progress;
            write::write_archive(store, &self.descriptor, &self.index, self.payload_end, |phase, step, max| {
                progress.report(phase, step, max)
            })?;
        }

        self.progress.report(ProgressPhase::ClosingFile, 0, 1);
        store.flush()?;
        self.progress.report(ProgressPhase::ClosingFile, 1, 1);

        tracing::debug!(files = self.index.len(), dirty = self.dirty, "closed pak");
        self.index.clear();
        self.stored_fat = None;
        self.tree = None;
        self.dirty = false;
        self.state = PakState::Closed;
        Ok(())
    }

    /// Hands back the backing store.
    pub fn into_inner(self) -> Option<S> {
        self.store
    }

    pub fn state(&self) -> PakState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn descriptor(&self) -> &FormatDescriptor {
        &self.descriptor
    }

    pub fn pak_type(&self) -> PakType {
        PakType::for_descriptor(&self.descriptor)
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// First byte after the last payload slot.
    pub fn payload_end(&self) -> u64 {
        self.payload_end
    }

    pub fn index(&self) -> Result<&PakIndex> {
        self.expect_state(PakState::Ready)?;
        Ok(&self.index)
    }

    /// Active entries sorted by name.
    pub fn list(&self) -> Result<Vec<&Entry>> {
        self.expect_state(PakState::Ready)?;
        Ok(self.index.list())
    }

    /// Active entries in FAT order.
    pub fn list_in_order(&self) -> Result<Vec<&Entry>> {
        self.expect_state(PakState::Ready)?;
        Ok(self.index.list_in_order().collect())
    }

    pub fn deleted_entries(&self) -> Result<&[Entry]> {
        self.expect_state(PakState::Ready)?;
        Ok(self.index.deleted())
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

    pub fn pack(&mut self, name: &str, payload: &[u8], create_time: i64, modify_time: i64) -> Result<Entry> {
        self.expect_state(PakState::Ready)?;
        codec::entry::check_name(name)?;
        if self.index.contains(name) {
            return Err(PakError::DuplicateName(name.to_string()));
        }

        let size = payload.len() as u64;
        let md5 = hasher::md5_hash(payload);
        let allocation = self.allocate(size);
        self.write_payload(allocation.offset, payload, allocation.padding)?;

        let entry = Entry::new(name, allocation.offset, size, allocation.padding as u32)
            .with_md5(md5)
            .with_times(create_time, modify_time);
        self.commit(allocation);
        self.index.add(entry.clone())?;
        self.touch();

        tracing::debug!(name, offset = entry.offset(), size, "packed entry");
        Ok(entry)
    }

    pub fn unpack(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.unpack_to(name, &mut data)?;
        Ok(data)
    }

    /// Streams an entry into `writer`, checking its hash once everything has been copied.
    pub fn unpack_to<W>(&mut self, name: &str, writer: &mut W) -> Result<u64>
    where
        W: Write + ?Sized,
    {
        let entry = self.entry(name)?.clone();
        let store = self.store_mut()?;
        store.seek(SeekFrom::Start(entry.offset()))?;

        let mut reader = store.take(entry.size());
        let mut hasher = ContentHasher::new();
        let mut buf = vec![0; COPY_CHUNK.min(entry.size() as usize)];
        let mut copied = 0;
        while copied < entry.size() {
            let read = reader.read(&mut buf)?;
            if read == 0 {
                return Err(PakError::Truncated {
                    what: "entry payload",
                    expected: entry.size(),
                    found: copied,
                });
            }
            hasher.update(&buf[..read]);
            writer.write_all(&buf[..read])?;
            copied += read as u64;
        }

        check_md5(&entry, hasher.finish())?;
        Ok(copied)
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.expect_state(PakState::Ready)?;
        self.index.remove(name)?;
        self.touch();
        tracing::debug!(name, "deleted entry");
        Ok(())
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        self.expect_state(PakState::Ready)?;
        codec::entry::check_name(new_name)?;
        self.index.rename(old_name, new_name)?;
        self.touch();
        Ok(())
    }

    /// Replaces the payload of an existing entry, in place when it still fits.
    pub fn replace(&mut self, name: &str, payload: &[u8], modify_time: i64) -> Result<Entry> {
        let old = self.entry(name)?.clone();
        let size = payload.len() as u64;

        let allocation = if size + padding_for(old.offset() + size, self.block_size) <= old.capacity() {
            self.allocate_in(None, old.offset(), size, Some(old.end()))
        } else {
            self.allocate(size)
        };
        self.write_payload(allocation.offset, payload, allocation.padding)?;

        let in_place = allocation.offset == old.offset();
        let (offset, padding) = (allocation.offset, allocation.padding as u32);
        self.commit(allocation);
        if !in_place {
            self.index.push_deleted(old.clone().with_md5([0; 16]));
        }

        self.index.adjust_total_size(old.size(), size);
        let entry = self
            .index
            .get_mut(name)
            .ok_or_else(|| PakError::EntryNotFound(name.to_string()))?;
        entry.offset = offset;
        entry.size = size;
        entry.size_duplicate = size;
        entry.padding_size = padding;
        entry.md5 = hasher::md5_hash(payload);
        entry.modify_time = modify_time;
        let entry = entry.clone();
        self.touch();

        tracing::debug!(name, in_place, offset, size, "replaced entry");
        Ok(entry)
    }

    pub fn set_times(&mut self, name: &str, create_time: i64, modify_time: i64) -> Result<()> {
        self.expect_state(PakState::Ready)?;
        let entry = self
            .index
            .get_mut(name)
            .ok_or_else(|| PakError::EntryNotFound(name.to_string()))?;
        entry.create_time = create_time;
        entry.modify_time = modify_time;
        self.dirty = true;
        Ok(())
    }

    /// Re-hashes every active entry and returns the names that no longer match.
    pub fn verify(&mut self) -> Result<Vec<String>> {
        self.expect_state(PakState::Ready)?;
        let names: Vec<String> = self.index.list().iter().map(|e| e.name().to_string()).collect();

        let mut mismatched = Vec::new();
        for name in names {
            match self.unpack_to(&name, &mut std::io::sink()) {
                Ok(_) => {}
                Err(PakError::HashMismatch { expected, actual, .. }) => {
                    tracing::warn!(%name, %expected, %actual, "content hash mismatch");
                    mismatched.push(name);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(mismatched)
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

    fn store_mut(&mut self) -> Result<&mut S> {
        let actual = self.state;
        self.store.as_mut().ok_or(PakError::InvalidState {
            expected: PakState::Ready,
            actual,
        })
    }

    fn header_region_end(&self, descriptor: &FormatDescriptor) -> u64 {
        let header_len = descriptor.header_len() as u64;
        header_len + padding_for(header_len, self.block_size)
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.tree = None;
    }

    /// First-fit over the free list, else the end of the payload region.
    fn allocate(&self, size: u64) -> Allocation {
        if let Some(slot) = self.index.find_free_slot(size, self.block_size) {
            let freed = &self.index.deleted()[slot];
            return self.allocate_in(Some(slot), freed.offset(), size, Some(freed.end()));
        }

        // keep the FAT of the last close intact until the next one
        if let Some(fat) = &self.stored_fat
            && self.payload_end < fat.end
        {
            let start = fat.end + padding_for(fat.end, self.block_size);
            let mut allocation = self.allocate_in(None, start, size, None);
            allocation.fat_gap = Some(Entry::new("", self.payload_end, start - self.payload_end, 0));
            return allocation;
        }
        self.allocate_in(None, self.payload_end, size, None)
    }

    /// Callers make sure a slot ending at `slot_end` has room for the aligned padding.
    fn allocate_in(&self, slot: Option<usize>, offset: u64, size: u64, slot_end: Option<u64>) -> Allocation {
        let padding = padding_for(offset + size, self.block_size);
        let end = offset + size + padding;
        let remainder = slot_end
            .filter(|slot_end| end < *slot_end)
            .map(|slot_end| Entry::new("", end, slot_end - end, 0));
        Allocation {
            slot,
            offset,
            padding,
            end,
            remainder,
            fat_gap: None,
        }
    }

    fn write_payload(&mut self, offset: u64, payload: &[u8], padding: u64) -> Result<()> {
        let store = self.store_mut()?;
        store.write_all_at(offset, payload)?;
        store.write_all(&vec![0; padding as usize])?;
        Ok(())
    }

    fn commit(&mut self, allocation: Allocation) {
        if let Some(slot) = allocation.slot {
            self.index.take_free_slot(slot);
            tracing::debug!(offset = allocation.offset, "reused deleted slot");
        }
        if let Some(remainder) = allocation.remainder {
            self.index.push_deleted(remainder);
        }
        if let Some(gap) = allocation.fat_gap {
            tracing::debug!(offset = gap.offset(), size = gap.size(), "appending past the stored FAT");
            self.stored_fat = None;
            self.fat_gap = Some(gap);
        }
        self.payload_end = self.payload_end.max(allocation.end);
    }
}

/// Skipped when the stored hash is all zeros.
pub(crate) fn check_md5(entry: &Entry, actual: [u8; 16]) -> Result<()> {
    if entry.has_md5() && *entry.md5() != actual {
        return Err(PakError::HashMismatch {
            name: entry.name().to_string(),
            expected: hasher::md5_hex(entry.md5()),
            actual: hasher::md5_hex(&actual),
        });
    }
    Ok(())
}
