use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

/// Random access byte store backing a physical pak.
pub trait PakStore: Read + Write + Seek {
    /// Truncates or extends the store to exactly `len` bytes.
    fn set_len(&mut self, len: u64) -> std::io::Result<()>;

    fn len(&mut self) -> std::io::Result<u64> {
        self.seek(SeekFrom::End(0))
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }

    fn write_all_at(&mut self, offset: u64, buf: &[u8]) -> std::io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(buf)
    }
}

impl PakStore for File {
    fn set_len(&mut self, len: u64) -> std::io::Result<()> {
        File::set_len(self, len)
    }
}

impl PakStore for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> std::io::Result<()> {
        self.get_mut().resize(len as usize, 0);
        Ok(())
    }
}

impl<S: PakStore + ?Sized> PakStore for &mut S {
    fn set_len(&mut self, len: u64) -> std::io::Result<()> {
        (**self).set_len(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_store() {
        let mut store = Cursor::new(Vec::new());
        store.write_all_at(4, b"data").unwrap();
        assert_eq!(store.len().unwrap(), 8);

        let mut buf = [0u8; 4];
        store.read_exact_at(4, &mut buf).unwrap();
        assert_eq!(&buf, b"data");

        PakStore::set_len(&mut store, 6).unwrap();
        assert_eq!(store.get_ref().as_slice(), b"\0\0\0\0da");
    }
}
