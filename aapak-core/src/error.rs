pub type Result<T> = std::result::Result<T, PakError>;

/// Coarse classification of [`PakError`], used by callers that only care
/// about which class of failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Crypto,
    Integrity,
    Conflict,
    NotFound,
    InvalidState,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum PakError {
    #[error("Upstream IO Error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Invalid Pak file magic: expected {expected:X?}, found {found:X?}")]
    InvalidMagic { expected: [u8; 4], found: [u8; 4] },
    #[error("Truncated {what}: expected {expected} bytes, found {found}")]
    Truncated {
        what: &'static str,
        expected: u64,
        found: u64,
    },
    #[error("Invalid format descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Invalid format descriptor json: {0}")]
    InvalidDescriptorJson(#[from] serde_json::Error),
    #[error("Header filler byte at {position} must be zero, found 0x{value:02X}")]
    NonZeroFiller { position: usize, value: u8 },
    #[error("Invalid file name (NUL byte or not UTF-8): {0:X?}")]
    InvalidFileName(Vec<u8>),
    #[error("File name `{name}` is longer than {max} bytes")]
    FileNameTooLong { name: String, max: usize },
    #[error("Entry name `{0}` does not map to a path inside the output directory")]
    UnsafePath(String),

    #[error("Invalid encryption key length: expected {expected}, found {found}")]
    InvalidKeyLength { expected: usize, found: usize },

    #[error("Content hash mismatch for `{name}`: expected {expected}, computed {actual}")]
    HashMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Entry `{0}` already exists")]
    DuplicateName(String),
    #[error("Entry `{0}` not found")]
    EntryNotFound(String),

    #[error("Invalid archive state: expected {expected:?}, currently {actual:?}")]
    InvalidState {
        expected: crate::pakfile::PakState,
        actual: crate::pakfile::PakState,
    },
}

impl PakError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PakError::IO(_) => ErrorKind::Io,
            PakError::InvalidMagic { .. }
            | PakError::Truncated { .. }
            | PakError::InvalidDescriptor(_)
            | PakError::InvalidDescriptorJson(_)
            | PakError::NonZeroFiller { .. }
            | PakError::InvalidFileName(_)
            | PakError::FileNameTooLong { .. }
            | PakError::UnsafePath(_) => ErrorKind::Format,
            PakError::InvalidKeyLength { .. } => ErrorKind::Crypto,
            PakError::HashMismatch { .. } => ErrorKind::Integrity,
            PakError::DuplicateName(_) => ErrorKind::Conflict,
            PakError::EntryNotFound(_) => ErrorKind::NotFound,
            PakError::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }
}
