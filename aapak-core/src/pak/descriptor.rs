use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{PakError, Result};

use super::cipher;

/// AES-128 key used by the classic format for header and FAT data.
pub const CLASSIC_KEY: [u8; 16] = [
    0x32, 0x1F, 0x2A, 0xEE, 0xAA, 0x58, 0x4A, 0xB4, 0x9A, 0x6C, 0x9E, 0x09, 0xD5, 0x9E, 0x9C, 0x6F,
];

/// Header identification bytes of the classic format ("WIBO").
pub const CLASSIC_MAGIC: [u8; 4] = [0x57, 0x49, 0x42, 0x4F];

/// Width of the fixed, NUL-padded file name field in a FAT record.
pub const FILE_NAME_LEN: usize = 0x108;

static CLASSIC: LazyLock<FormatDescriptor> = LazyLock::new(|| {
    use EntryElement::*;
    use HeaderElement::*;

    FormatDescriptor {
        name: "Default".to_string(),
        is_default: true,
        key: CLASSIC_KEY.to_vec(),
        magic: CLASSIC_MAGIC,
        header_layout: vec![
            Header,
            NullByte,
            NullByte,
            NullByte,
            NullByte,
            FilesCount,
            ExtraFilesCount,
            NullByte,
            NullByte,
            NullByte,
            NullByte,
        ],
        invert_file_counter: false,
        entry_layout: vec![
            FileName,
            Offset,
            Size,
            SizeDuplicate,
            PaddingSize,
            ContentHash,
            Filler1,
            CreateTime,
            ModifyTime,
            Filler2,
        ],
        default_filler1: 0,
        default_filler2: 0,
    }
});

/// Possible elements of a pak header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderElement {
    /// Any byte is accepted, written back as zero.
    AnyByte,
    /// Byte must be zero.
    NullByte,
    /// The 4 magic bytes.
    Header,
    /// u32 active file count.
    FilesCount,
    /// u32 extra (deleted) file count.
    ExtraFilesCount,
}

impl HeaderElement {
    pub const fn width(self) -> usize {
        match self {
            HeaderElement::AnyByte | HeaderElement::NullByte => 1,
            HeaderElement::Header | HeaderElement::FilesCount | HeaderElement::ExtraFilesCount => 4,
        }
    }
}

/// Possible elements of a FAT record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryElement {
    FileName,
    Offset,
    Size,
    SizeDuplicate,
    PaddingSize,
    ContentHash,
    Filler1,
    CreateTime,
    ModifyTime,
    Filler2,
}

impl EntryElement {
    pub const fn width(self) -> usize {
        match self {
            EntryElement::FileName => FILE_NAME_LEN,
            EntryElement::Offset
            | EntryElement::Size
            | EntryElement::SizeDuplicate
            | EntryElement::CreateTime
            | EntryElement::ModifyTime
            | EntryElement::Filler2 => 8,
            EntryElement::PaddingSize | EntryElement::Filler1 => 4,
            EntryElement::ContentHash => 16,
        }
    }
}

/// Describes how the header and the FAT records of one pak generation are laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub name: String,
    #[serde(skip)]
    is_default: bool,
    pub key: Vec<u8>,
    pub magic: [u8; 4],
    pub header_layout: Vec<HeaderElement>,
    /// Deleted entries are counted (and stored in the FAT) before active ones.
    #[serde(default)]
    pub invert_file_counter: bool,
    pub entry_layout: Vec<EntryElement>,
    #[serde(default)]
    pub default_filler1: u32,
    #[serde(default)]
    pub default_filler2: u64,
}

impl FormatDescriptor {
    /// The classic layout, shared by the whole process.
    pub fn classic() -> &'static FormatDescriptor {
        &CLASSIC
    }

    /// An empty shell to be filled in for a custom pak generation.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: false,
            key: Vec::new(),
            magic: [0; 4],
            header_layout: Vec::new(),
            invert_file_counter: false,
            entry_layout: Vec::new(),
            default_filler1: 0,
            default_filler2: 0,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let this: Self = serde_json::from_str(json)?;
        this.validate()?;
        Ok(this)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[inline]
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn validate(&self) -> Result<()> {
        let count_header = |element| self.header_layout.iter().filter(|e| **e == element).count();

        if count_header(HeaderElement::Header) != 1 {
            return Err(self.invalid("header layout needs exactly one Header element"));
        }
        if count_header(HeaderElement::FilesCount) != 1 {
            return Err(self.invalid("header layout needs exactly one FilesCount element"));
        }
        match count_header(HeaderElement::ExtraFilesCount) {
            0 if self.invert_file_counter => {
                return Err(self.invalid("an inverted file counter needs an ExtraFilesCount element"));
            }
            0 | 1 => {}
            _ => return Err(self.invalid("header layout has more than one ExtraFilesCount element")),
        }

        for required in [EntryElement::FileName, EntryElement::Offset, EntryElement::Size] {
            if !self.entry_layout.contains(&required) {
                return Err(self.invalid(&format!("entry layout is missing {required:?}")));
            }
        }
        for (i, element) in self.entry_layout.iter().enumerate() {
            if self.entry_layout[..i].contains(element) {
                return Err(self.invalid(&format!("entry layout repeats {element:?}")));
            }
        }

        Ok(())
    }

    /// Whether deleted entries can be persisted by this layout.
    pub fn tracks_deleted(&self) -> bool {
        self.header_layout.contains(&HeaderElement::ExtraFilesCount)
    }

    pub fn has_entry_element(&self, element: EntryElement) -> bool {
        self.entry_layout.contains(&element)
    }

    /// Number of clear bytes before the encrypted part of the header, magic included.
    pub(crate) fn header_clear_len(&self) -> usize {
        let mut len = 0;
        for element in &self.header_layout {
            len += element.width();
            if *element == HeaderElement::Header {
                break;
            }
        }
        len
    }

    /// Plain width of the elements following the magic.
    pub(crate) fn header_tail_len(&self) -> usize {
        let total: usize = self.header_layout.iter().map(|e| e.width()).sum();
        total - self.header_clear_len()
    }

    /// Encoded header size in bytes.
    pub fn header_len(&self) -> usize {
        self.header_clear_len() + cipher::padded_len(self.header_tail_len())
    }

    /// Encoded size of one FAT record in bytes.
    pub fn record_len(&self) -> usize {
        cipher::padded_len(self.entry_layout.iter().map(|e| e.width()).sum())
    }

    fn invalid(&self, reason: &str) -> PakError {
        PakError::InvalidDescriptor(format!("{}: {}", self.name, reason))
    }
}

impl Default for FormatDescriptor {
    fn default() -> Self {
        Self::classic().clone()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    use super::*;

    #[test]
    fn classic_is_valid() {
        let classic = FormatDescriptor::classic();
        classic.validate().unwrap();
        assert!(classic.is_default());
        assert_eq!(classic.header_len(), 20);
        assert_eq!(classic.record_len(), 0x150);
    }

    #[test]
    fn rejects_missing_file_name() {
        let mut descriptor = FormatDescriptor::classic().clone();
        descriptor.entry_layout.retain(|e| *e != EntryElement::FileName);
        let err = descriptor.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn rejects_duplicate_counter() {
        let mut descriptor = FormatDescriptor::classic().clone();
        descriptor.header_layout.push(HeaderElement::FilesCount);
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn inverted_counter_needs_extra_count() {
        let mut descriptor = FormatDescriptor::classic().clone();
        descriptor.header_layout.retain(|e| *e != HeaderElement::ExtraFilesCount);
        descriptor.validate().unwrap();
        descriptor.invert_file_counter = true;
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn json_round_trip_drops_default_flag() {
        let json = FormatDescriptor::classic().to_json().unwrap();
        let loaded = FormatDescriptor::from_json(&json).unwrap();
        assert!(!loaded.is_default());
        assert_eq!(loaded.entry_layout, FormatDescriptor::classic().entry_layout);
        assert_eq!(loaded.key, CLASSIC_KEY.to_vec());
    }

    #[test]
    fn empty_shell_fails_validation() {
        let descriptor = FormatDescriptor::empty("custom");
        assert!(descriptor.validate().is_err());
    }
}
