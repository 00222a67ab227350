use crate::codec;
use crate::error::{PakError, Result};
use crate::index::PakIndex;
use crate::pak::{FormatDescriptor, PakHeader};
use crate::progress::ProgressPhase;
use crate::store::PakStore;

/// Header and FAT as found in a store.
#[derive(Debug)]
pub struct LoadedArchive {
    pub header: PakHeader,
    pub index: PakIndex,
    /// Where the FAT starts; everything before it is header and payload region.
    pub fat_offset: u64,
    /// First byte after the FAT, the store length when read.
    pub fat_end: u64,
}

pub fn read_header<S>(store: &mut S, descriptor: &FormatDescriptor) -> Result<PakHeader>
where
    S: PakStore + ?Sized,
{
    let store_len = store.len()?;
    let header_len = descriptor.header_len();
    if store_len < header_len as u64 {
        return Err(PakError::Truncated {
            what: "header",
            expected: header_len as u64,
            found: store_len,
        });
    }

    let mut raw = vec![0; header_len];
    store.read_exact_at(0, &mut raw)?;
    codec::header::decode(descriptor, &raw)
}

/// Reads the header at the start of the store and the FAT at its tail.
pub fn read_archive<S, F>(store: &mut S, descriptor: &FormatDescriptor, mut on_progress: F) -> Result<LoadedArchive>
where
    S: PakStore + ?Sized,
    F: FnMut(ProgressPhase, usize, usize),
{
    on_progress(ProgressPhase::ReadingHeader, 0, 1);
    let header = read_header(store, descriptor)?;
    on_progress(ProgressPhase::ReadingHeader, 1, 1);

    let store_len = store.len()?;
    let record_len = descriptor.record_len() as u64;
    let total = header.total_records();
    let fat_len = total * record_len;
    let min_len = descriptor.header_len() as u64 + fat_len;
    if store_len < min_len {
        return Err(PakError::Truncated {
            what: "FAT",
            expected: min_len,
            found: store_len,
        });
    }
    let fat_offset = store_len - fat_len;

    let mut fat = vec![0; fat_len as usize];
    store.read_exact_at(fat_offset, &mut fat)?;

    let total = total as usize;
    let active_first = !descriptor.invert_file_counter;
    let first_count = if active_first {
        header.file_count() as usize
    } else {
        header.extra_file_count() as usize
    };

    let mut index = PakIndex::new();
    on_progress(ProgressPhase::ReadingFAT, 0, total);
    for (i, raw) in fat.chunks_exact(record_len as usize).enumerate() {
        let entry = codec::entry::decode(descriptor, raw)?;
        tracing::trace!(name = entry.name(), offset = entry.offset(), size = entry.size(), "FAT record {i}");
        let is_active = (i < first_count) == active_first;
        if is_active {
            index.add(entry)?;
        } else {
            index.push_deleted(entry);
        }
        on_progress(ProgressPhase::ReadingFAT, i + 1, total);
    }

    tracing::debug!(
        files = header.file_count(),
        extra_files = header.extra_file_count(),
        fat_offset,
        "read pak archive"
    );

    Ok(LoadedArchive {
        header,
        index,
        fat_offset,
        fat_end: store_len,
    })
}
