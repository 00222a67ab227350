use std::io::{Cursor, Read, Write};

use byteorder::{LE, ReadBytesExt, WriteBytesExt};

use crate::error::{PakError, Result};
use crate::pak::{Entry, EntryElement, FILE_NAME_LEN, FormatDescriptor, cipher};

pub fn decode(descriptor: &FormatDescriptor, raw: &[u8]) -> Result<Entry> {
    let record_len = descriptor.record_len();
    if raw.len() < record_len {
        return Err(PakError::Truncated {
            what: "FAT record",
            expected: record_len as u64,
            found: raw.len() as u64,
        });
    }

    let plain = cipher::decrypt(&descriptor.key, &raw[..record_len])?;
    let mut reader = Cursor::new(&plain[..]);
    let mut entry = Entry::default();
    let mut has_size_duplicate = false;
    for element in &descriptor.entry_layout {
        decode_element(*element, &mut reader, &mut entry)?;
        has_size_duplicate |= *element == EntryElement::SizeDuplicate;
    }
    if !has_size_duplicate {
        entry.size_duplicate = entry.size;
    }

    Ok(entry)
}

fn decode_element<R>(element: EntryElement, reader: &mut R, entry: &mut Entry) -> Result<()>
where
    R: Read,
{
    match element {
        EntryElement::FileName => {
            let mut buf = [0; FILE_NAME_LEN];
            reader.read_exact(&mut buf)?;
            let end = buf.iter().position(|b| *b == 0).unwrap_or(FILE_NAME_LEN);
            entry.name =
                String::from_utf8(buf[..end].to_vec()).map_err(|e| PakError::InvalidFileName(e.into_bytes()))?;
        }
        EntryElement::Offset => entry.offset = reader.read_u64::<LE>()?,
        EntryElement::Size => entry.size = reader.read_u64::<LE>()?,
        EntryElement::SizeDuplicate => entry.size_duplicate = reader.read_u64::<LE>()?,
        EntryElement::PaddingSize => entry.padding_size = reader.read_u32::<LE>()?,
        EntryElement::ContentHash => reader.read_exact(&mut entry.md5)?,
        EntryElement::Filler1 => entry.filler1 = Some(reader.read_u32::<LE>()?),
        EntryElement::CreateTime => entry.create_time = reader.read_i64::<LE>()?,
        EntryElement::ModifyTime => entry.modify_time = reader.read_i64::<LE>()?,
        EntryElement::Filler2 => entry.filler2 = Some(reader.read_u64::<LE>()?),
    }
    Ok(())
}

pub fn encode(descriptor: &FormatDescriptor, entry: &Entry) -> Result<Vec<u8>> {
    let mut plain = Vec::with_capacity(descriptor.record_len());
    for element in &descriptor.entry_layout {
        encode_element(*element, descriptor, entry, &mut plain)?;
    }
    cipher::encrypt(&descriptor.key, &plain)
}

fn encode_element<W>(element: EntryElement, descriptor: &FormatDescriptor, entry: &Entry, writer: &mut W) -> Result<()>
where
    W: Write,
{
    match element {
        EntryElement::FileName => {
            check_name(&entry.name)?;
            let mut buf = [0; FILE_NAME_LEN];
            buf[..entry.name.len()].copy_from_slice(entry.name.as_bytes());
            writer.write_all(&buf)?;
        }
        EntryElement::Offset => writer.write_u64::<LE>(entry.offset)?,
        EntryElement::Size => writer.write_u64::<LE>(entry.size)?,
        EntryElement::SizeDuplicate => writer.write_u64::<LE>(entry.size_duplicate)?,
        EntryElement::PaddingSize => writer.write_u32::<LE>(entry.padding_size)?,
        EntryElement::ContentHash => writer.write_all(&entry.md5)?,
        EntryElement::Filler1 => writer.write_u32::<LE>(entry.filler1.unwrap_or(descriptor.default_filler1))?,
        EntryElement::CreateTime => writer.write_i64::<LE>(entry.create_time)?,
        EntryElement::ModifyTime => writer.write_i64::<LE>(entry.modify_time)?,
        EntryElement::Filler2 => writer.write_u64::<LE>(entry.filler2.unwrap_or(descriptor.default_filler2))?,
    }
    Ok(())
}

/// Names are stored NUL-terminated in a fixed field, so they must leave room for the terminator.
pub fn check_name(name: &str) -> Result<()> {
    if name.contains('\0') {
        return Err(PakError::InvalidFileName(name.as_bytes().to_vec()));
    }
    if name.len() >= FILE_NAME_LEN {
        return Err(PakError::FileNameTooLong {
            name: name.to_string(),
            max: FILE_NAME_LEN - 1,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    use super::*;

    fn sample_entry() -> Entry {
        Entry {
            name: "game/db/items.sqlite".to_string(),
            offset: 0x1_0000_0200,
            size: 123_456,
            size_duplicate: 123_456,
            padding_size: 448,
            md5: [0x11; 16],
            filler1: Some(0x8000_0000),
            filler2: Some(0),
            create_time: 132_537_600_000_000_000,
            modify_time: 132_537_600_100_000_000,
        }
    }

    #[test]
    fn test_round_trip() {
        let descriptor = FormatDescriptor::classic();
        let entry = sample_entry();
        let raw = encode(descriptor, &entry).unwrap();
        assert_eq!(raw.len(), 0x150);
        assert_eq!(decode(descriptor, &raw).unwrap(), entry);
    }

    #[test]
    fn test_record_is_encrypted() {
        let raw = encode(FormatDescriptor::classic(), &sample_entry()).unwrap();
        assert!(!raw.windows(4).any(|w| w == b"game"));
    }

    #[test]
    fn test_default_fillers() {
        let mut descriptor = FormatDescriptor::classic().clone();
        descriptor.default_filler1 = 0x8000_0000;
        descriptor.default_filler2 = 42;
        let entry = sample_entry().with_fillers(None, None);
        let decoded = decode(&descriptor, &encode(&descriptor, &entry).unwrap()).unwrap();
        assert_eq!(decoded.filler1(), Some(0x8000_0000));
        assert_eq!(decoded.filler2(), Some(42));
    }

    #[test]
    fn test_custom_order() {
        let mut descriptor = FormatDescriptor::classic().clone();
        descriptor.entry_layout = vec![
            EntryElement::Size,
            EntryElement::ContentHash,
            EntryElement::Offset,
            EntryElement::FileName,
            EntryElement::PaddingSize,
        ];
        descriptor.validate().unwrap();
        assert_eq!(descriptor.record_len(), 304);

        let entry = sample_entry();
        let decoded = decode(&descriptor, &encode(&descriptor, &entry).unwrap()).unwrap();
        assert_eq!(decoded.name(), entry.name());
        assert_eq!(decoded.offset(), entry.offset());
        assert_eq!(decoded.size_duplicate(), entry.size());
        assert_eq!(decoded.md5(), entry.md5());
        assert_eq!(decoded.filler1(), None);
        assert_eq!(decoded.create_time(), 0);
    }

    #[test]
    fn test_truncated() {
        let descriptor = FormatDescriptor::classic();
        let raw = encode(descriptor, &sample_entry()).unwrap();
        let err = decode(descriptor, &raw[..0x140]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_name_too_long() {
        let entry = Entry::new("x".repeat(FILE_NAME_LEN), 0, 0, 0);
        let err = encode(FormatDescriptor::classic(), &entry).unwrap_err();
        assert!(matches!(err, PakError::FileNameTooLong { max: 263, .. }));
    }

    #[test]
    fn test_name_with_nul() {
        let entry = Entry::new("a\0b.dat", 0, 0, 0);
        let err = encode(FormatDescriptor::classic(), &entry).unwrap_err();
        assert!(matches!(&err, PakError::InvalidFileName(bytes) if bytes == b"a\0b.dat"));
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}
