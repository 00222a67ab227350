use crate::codec;
use crate::error::Result;
use crate::index::PakIndex;
use crate::pak::{Entry, FormatDescriptor, PakHeader};
use crate::progress::ProgressPhase;
use crate::store::PakStore;

/// Writes the FAT at `fat_offset`, the header at the start of the store,
/// and cuts the store off after the FAT. Returns the new store length.
pub fn write_archive<S, F>(
    store: &mut S,
    descriptor: &FormatDescriptor,
    index: &PakIndex,
    fat_offset: u64,
    mut on_progress: F,
) -> Result<u64>
where
    S: PakStore + ?Sized,
    F: FnMut(ProgressPhase, usize, usize),
{
    // Layouts without an extra counter cannot keep deleted slots.
    let deleted = if descriptor.tracks_deleted() {
        index.deleted().len()
    } else {
        0
    };
    let header = PakHeader::new(index.len() as u32, deleted as u32);
    let total = header.total_records() as usize;

    let mut fat = Vec::with_capacity(total * descriptor.record_len());
    on_progress(ProgressPhase::WritingFAT, 0, total);
    let records: Box<dyn Iterator<Item = &Entry>> = if descriptor.tracks_deleted() {
        index.fat_order(descriptor.invert_file_counter)
    } else {
        Box::new(index.list_in_order())
    };
    for (i, entry) in records.enumerate() {
        fat.extend(codec::entry::encode(descriptor, entry)?);
        on_progress(ProgressPhase::WritingFAT, i + 1, total);
    }
    store.write_all_at(fat_offset, &fat)?;

    on_progress(ProgressPhase::WritingHeader, 0, 1);
    let raw_header = codec::header::encode(descriptor, &header)?;
    store.write_all_at(0, &raw_header)?;
    on_progress(ProgressPhase::WritingHeader, 1, 1);

    let end = fat_offset + fat.len() as u64;
    store.set_len(end)?;
    store.flush()?;

    tracing::debug!(
        files = header.file_count(),
        extra_files = header.extra_file_count(),
        fat_offset,
        "wrote pak archive"
    );

    Ok(end)
}
