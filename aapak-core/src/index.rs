use indexmap::IndexMap;

use crate::error::{PakError, Result};
use crate::pak::Entry;
use crate::pakfile::padding_for;

/// Where an entry currently lives inside a [`PakIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryLocation {
    Active(usize),
    Deleted(usize),
}

/// In-memory FAT: active entries keyed by name, plus the free list of deleted slots.
#[derive(Debug, Clone, Default)]
pub struct PakIndex {
    active: IndexMap<String, Entry>,
    deleted: Vec<Entry>,
    total_size: u64,
}

impl PakIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: Entry) -> Result<usize> {
        if self.active.contains_key(entry.name()) {
            return Err(PakError::DuplicateName(entry.name));
        }
        self.total_size += entry.size();
        let (index, _) = self.active.insert_full(entry.name.clone(), entry);
        Ok(index)
    }

    /// Moves an active entry to the free list and returns its deleted index.
    pub fn remove(&mut self, name: &str) -> Result<usize> {
        let mut entry = self
            .active
            .shift_remove(name)
            .ok_or_else(|| PakError::EntryNotFound(name.to_string()))?;
        self.total_size -= entry.size();
        entry.md5 = [0; 16];
        Ok(self.push_deleted(entry))
    }

    pub fn push_deleted(&mut self, entry: Entry) -> usize {
        self.deleted.push(entry);
        self.deleted.len() - 1
    }

    /// First deleted slot that holds `size` bytes plus the padding up to the next `block_size` boundary.
    pub fn find_free_slot(&self, size: u64, block_size: u64) -> Option<usize> {
        self.deleted.iter().position(|entry| {
            let end = entry.offset() + size;
            entry.capacity() >= size + padding_for(end, block_size)
        })
    }

    pub fn take_free_slot(&mut self, index: usize) -> Option<Entry> {
        (index < self.deleted.len()).then(|| self.deleted.remove(index))
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        if self.active.contains_key(new_name) {
            return Err(PakError::DuplicateName(new_name.to_string()));
        }
        let index = self
            .active
            .get_index_of(old_name)
            .ok_or_else(|| PakError::EntryNotFound(old_name.to_string()))?;
        let (_, mut entry) = self
            .active
            .shift_remove_index(index)
            .ok_or_else(|| PakError::EntryNotFound(old_name.to_string()))?;
        entry.name = new_name.to_string();
        let (new_index, _) = self.active.insert_full(new_name.to_string(), entry);
        self.active.move_index(new_index, index);
        Ok(())
    }

    /// Mutable access for in-place updates. The name must not be changed through it.
    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.active.get_mut(name)
    }

    pub(crate) fn adjust_total_size(&mut self, old_size: u64, new_size: u64) {
        self.total_size = self.total_size - old_size + new_size;
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.active.get(name)
    }

    pub fn get_index(&self, index: usize) -> Option<&Entry> {
        self.active.get_index(index).map(|(_, entry)| entry)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.active.contains_key(name)
    }

    pub fn locate(&self, name: &str) -> Option<EntryLocation> {
        if let Some(index) = self.active.get_index_of(name) {
            return Some(EntryLocation::Active(index));
        }
        self.deleted
            .iter()
            .position(|entry| entry.name() == name)
            .map(EntryLocation::Deleted)
    }

    /// Active entries sorted by name.
    pub fn list(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.active.values().collect();
        entries.sort();
        entries
    }

    /// Active entries in insertion order.
    pub fn list_in_order(&self) -> impl Iterator<Item = &Entry> {
        self.active.values()
    }

    pub fn deleted(&self) -> &[Entry] {
        &self.deleted
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Sum of the active payload sizes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// End of the highest slot, active or deleted.
    pub fn payload_end(&self) -> Option<u64> {
        self.active.values().chain(&self.deleted).map(Entry::end).max()
    }

    /// Records in the order they are stored in the FAT.
    pub fn fat_order(&self, invert: bool) -> Box<dyn Iterator<Item = &Entry> + '_> {
        if invert {
            Box::new(self.deleted.iter().chain(self.active.values()))
        } else {
            Box::new(self.active.values().chain(self.deleted.iter()))
        }
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.deleted.clear();
        self.total_size = 0;
    }
}
