use byteorder::{ByteOrder, LE, WriteBytesExt};

use crate::error::{PakError, Result};
use crate::pak::{FormatDescriptor, HeaderElement, PakHeader, cipher};

/// Which counter a header slot holds once `invert_file_counter` is applied.
fn counter_slot(descriptor: &FormatDescriptor, element: HeaderElement) -> Option<bool> {
    let is_files = match element {
        HeaderElement::FilesCount => true,
        HeaderElement::ExtraFilesCount => false,
        _ => return None,
    };
    Some(is_files != descriptor.invert_file_counter)
}

pub fn decode(descriptor: &FormatDescriptor, raw: &[u8]) -> Result<PakHeader> {
    descriptor.validate()?;
    let header_len = descriptor.header_len();
    if raw.len() < header_len {
        return Err(PakError::Truncated {
            what: "header",
            expected: header_len as u64,
            found: raw.len() as u64,
        });
    }

    let clear_len = descriptor.header_clear_len();
    let magic_at = clear_len - HeaderElement::Header.width();
    let mut found = [0; 4];
    found.copy_from_slice(&raw[magic_at..clear_len]);
    if found != descriptor.magic {
        return Err(PakError::InvalidMagic {
            expected: descriptor.magic,
            found,
        });
    }

    let mut plain = raw[..clear_len].to_vec();
    plain.extend(cipher::decrypt(&descriptor.key, &raw[clear_len..header_len])?);

    let mut header = PakHeader::default();
    let mut pos = 0;
    for element in &descriptor.header_layout {
        let bytes = &plain[pos..pos + element.width()];
        match element {
            HeaderElement::AnyByte | HeaderElement::Header => {}
            HeaderElement::NullByte => {
                if bytes[0] != 0 {
                    return Err(PakError::NonZeroFiller {
                        position: pos,
                        value: bytes[0],
                    });
                }
            }
            HeaderElement::FilesCount | HeaderElement::ExtraFilesCount => {
                let value = LE::read_u32(bytes);
                match counter_slot(descriptor, *element) {
                    Some(true) => header.file_count = value,
                    _ => header.extra_file_count = value,
                }
            }
        }
        pos += element.width();
    }

    Ok(header)
}

pub fn encode(descriptor: &FormatDescriptor, header: &PakHeader) -> Result<Vec<u8>> {
    descriptor.validate()?;
    let mut plain = Vec::with_capacity(descriptor.header_len());
    for element in &descriptor.header_layout {
        match element {
            HeaderElement::AnyByte | HeaderElement::NullByte => plain.push(0),
            HeaderElement::Header => plain.extend_from_slice(&descriptor.magic),
            HeaderElement::FilesCount | HeaderElement::ExtraFilesCount => {
                let value = match counter_slot(descriptor, *element) {
                    Some(true) => header.file_count,
                    _ => header.extra_file_count,
                };
                plain.write_u32::<LE>(value)?;
            }
        }
    }

    let clear_len = descriptor.header_clear_len();
    let mut raw = plain[..clear_len].to_vec();
    raw.extend(cipher::encrypt(&descriptor.key, &plain[clear_len..])?);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::pak::CLASSIC_MAGIC;

    use super::*;

    #[test]
    fn test_round_trip() {
        let descriptor = FormatDescriptor::classic();
        for (files, extra) in [(0, 0), (1, 0), (1234, 56), (u32::MAX, 7)] {
            let raw = encode(descriptor, &PakHeader::new(files, extra)).unwrap();
            assert_eq!(raw.len(), descriptor.header_len());
            assert_eq!(&raw[..4], &CLASSIC_MAGIC);
            let header = decode(descriptor, &raw).unwrap();
            assert_eq!(header, PakHeader::new(files, extra));
        }
    }

    #[test]
    fn test_counters_are_encrypted() {
        let raw = encode(FormatDescriptor::classic(), &PakHeader::new(3, 0)).unwrap();
        assert_ne!(&raw[8..12], &3u32.to_le_bytes());
    }

    #[test]
    fn test_inverted_counter() {
        let mut descriptor = FormatDescriptor::classic().clone();
        descriptor.invert_file_counter = true;
        let raw = encode(&descriptor, &PakHeader::new(10, 2)).unwrap();
        assert_eq!(decode(&descriptor, &raw).unwrap(), PakHeader::new(10, 2));

        // the classic reading sees the counters swapped
        let classic = decode(FormatDescriptor::classic(), &raw).unwrap();
        assert_eq!(classic, PakHeader::new(2, 10));
    }

    #[test]
    fn test_custom_layout_with_prefix() {
        let mut descriptor = FormatDescriptor::empty("prefixed");
        descriptor.key = crate::pak::CLASSIC_KEY.to_vec();
        descriptor.magic = *b"TEST";
        descriptor.header_layout = vec![
            HeaderElement::AnyByte,
            HeaderElement::Header,
            HeaderElement::ExtraFilesCount,
            HeaderElement::FilesCount,
        ];
        descriptor.entry_layout = FormatDescriptor::classic().entry_layout.clone();
        descriptor.validate().unwrap();

        assert_eq!(descriptor.header_len(), 5 + 16);
        let raw = encode(&descriptor, &PakHeader::new(4, 9)).unwrap();
        assert_eq!(&raw[1..5], b"TEST");
        assert_eq!(decode(&descriptor, &raw).unwrap(), PakHeader::new(4, 9));
    }

    #[test]
    fn test_bad_magic() {
        let descriptor = FormatDescriptor::classic();
        let mut raw = encode(descriptor, &PakHeader::new(1, 1)).unwrap();
        raw[..4].copy_from_slice(&[0, 0, 0, 0]);
        let err = decode(descriptor, &raw).unwrap_err();
        assert!(matches!(err, PakError::InvalidMagic { found: [0, 0, 0, 0], .. }));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_truncated() {
        let descriptor = FormatDescriptor::classic();
        let raw = encode(descriptor, &PakHeader::new(1, 1)).unwrap();
        let err = decode(descriptor, &raw[..10]).unwrap_err();
        assert!(matches!(err, PakError::Truncated { what: "header", .. }));
    }

    #[test]
    fn test_unvalidated_descriptor() {
        let descriptor = FormatDescriptor::empty("blank");
        let err = decode(&descriptor, &[0; 32]).unwrap_err();
        assert!(matches!(err, PakError::InvalidDescriptor(_)));
        assert_eq!(err.kind(), ErrorKind::Format);
        let err = encode(&descriptor, &PakHeader::new(1, 0)).unwrap_err();
        assert!(matches!(err, PakError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_non_zero_filler() {
        let descriptor = FormatDescriptor::classic();
        let mut plain = vec![0u8; 16];
        plain[0] = 0x7F;
        let mut raw = CLASSIC_MAGIC.to_vec();
        raw.extend(cipher::encrypt(&descriptor.key, &plain).unwrap());
        let err = decode(descriptor, &raw).unwrap_err();
        assert!(matches!(err, PakError::NonZeroFiller { position: 4, value: 0x7F }));
    }
}
