/// Decoded header counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PakHeader {
    pub(crate) file_count: u32,
    pub(crate) extra_file_count: u32,
}

impl PakHeader {
    pub fn new(file_count: u32, extra_file_count: u32) -> Self {
        Self {
            file_count,
            extra_file_count,
        }
    }

    #[inline]
    pub fn file_count(&self) -> u32 {
        self.file_count
    }

    /// Deleted entries still recorded in the FAT.
    #[inline]
    pub fn extra_file_count(&self) -> u32 {
        self.extra_file_count
    }

    /// Number of FAT records following the payload region.
    #[inline]
    pub fn total_records(&self) -> u64 {
        self.file_count as u64 + self.extra_file_count as u64
    }
}
