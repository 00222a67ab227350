pub mod cipher;
pub mod descriptor;
pub mod entry;
pub mod header;

pub use descriptor::*;
pub use entry::*;
pub use header::*;

/// Kind of archive behind an [`crate::archive::Archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PakType {
    /// Physical pak driven by a custom format descriptor.
    Reader,
    /// Physical pak using the classic descriptor.
    Classic,
    /// Virtual pak assembled from an external manifest.
    Csv,
}

impl PakType {
    pub fn for_descriptor(descriptor: &FormatDescriptor) -> Self {
        if descriptor.is_default() {
            PakType::Classic
        } else {
            PakType::Reader
        }
    }
}
