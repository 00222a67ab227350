pub mod archive;
pub mod codec;
pub mod directory;
pub mod error;
pub mod extract;
pub mod hasher;
pub mod index;
pub mod pak;
pub mod pakfile;
pub mod progress;
pub mod read;
pub mod store;
pub mod virtual_pak;
pub mod write;

mod serde_util;

pub use archive::{Archive, PakType};
pub use error::{ErrorKind, PakError, Result};
pub use pak::{Entry, FormatDescriptor};
pub use pakfile::{PakFile, PakFileBuilder, PakState};
pub use progress::ProgressPhase;
pub use virtual_pak::{ManifestEntry, VirtualPak};
