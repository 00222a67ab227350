use std::io::Write;

use crate::error::Result;
use crate::pak::Entry;
pub use crate::pak::PakType;
use crate::pakfile::{PakFile, PakState};
use crate::store::PakStore;
use crate::virtual_pak::VirtualPak;

/// Operations shared by physical and virtual paks once they are ready.
pub trait Archive {
    fn pak_type(&self) -> PakType;

    fn state(&self) -> PakState;

    /// Active entries sorted by name.
    fn list(&self) -> Result<Vec<&Entry>>;

    fn exists(&self, name: &str) -> bool;

    fn pack(&mut self, name: &str, payload: &[u8], create_time: i64, modify_time: i64) -> Result<Entry>;

    fn unpack(&mut self, name: &str) -> Result<Vec<u8>>;

    /// Copies an entry into `writer`. Returns the number of bytes written.
    fn unpack_to(&mut self, name: &str, writer: &mut dyn Write) -> Result<u64> {
        let data = self.unpack(name)?;
        writer.write_all(&data)?;
        Ok(data.len() as u64)
    }

    fn delete(&mut self, name: &str) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

impl<S: PakStore> Archive for PakFile<S> {
    fn pak_type(&self) -> PakType {
        PakFile::pak_type(self)
    }

    fn state(&self) -> PakState {
        PakFile::state(self)
    }

    fn list(&self) -> Result<Vec<&Entry>> {
        PakFile::list(self)
    }

    fn exists(&self, name: &str) -> bool {
        PakFile::exists(self, name)
    }

    fn pack(&mut self, name: &str, payload: &[u8], create_time: i64, modify_time: i64) -> Result<Entry> {
        PakFile::pack(self, name, payload, create_time, modify_time)
    }

    fn unpack(&mut self, name: &str) -> Result<Vec<u8>> {
        PakFile::unpack(self, name)
    }

    fn unpack_to(&mut self, name: &str, writer: &mut dyn Write) -> Result<u64> {
        PakFile::unpack_to(self, name, writer)
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        PakFile::delete(self, name)
    }

    fn close(&mut self) -> Result<()> {
        PakFile::close(self)
    }
}

impl Archive for VirtualPak {
    fn pak_type(&self) -> PakType {
        PakType::Csv
    }

    fn state(&self) -> PakState {
        VirtualPak::state(self)
    }

    fn list(&self) -> Result<Vec<&Entry>> {
        VirtualPak::list(self)
    }

    fn exists(&self, name: &str) -> bool {
        VirtualPak::exists(self, name)
    }

    fn pack(&mut self, name: &str, payload: &[u8], create_time: i64, modify_time: i64) -> Result<Entry> {
        VirtualPak::pack(self, name, payload, create_time, modify_time)
    }

    fn unpack(&mut self, name: &str) -> Result<Vec<u8>> {
        VirtualPak::unpack(self, name)
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        VirtualPak::delete(self, name)
    }

    fn close(&mut self) -> Result<()> {
        VirtualPak::close(self)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::pakfile::PakFileBuilder;
    use crate::virtual_pak::ManifestEntry;

    use super::*;

    fn exercise(archive: &mut dyn Archive) {
        archive.pack("dir/one.bin", b"first", 1, 1).unwrap();
        archive.pack("two.bin", b"second", 2, 2).unwrap();
        assert!(archive.exists("dir/one.bin"));

        let names: Vec<&str> = archive.list().unwrap().into_iter().map(Entry::name).collect();
        assert!(names.contains(&"dir/one.bin") && names.contains(&"two.bin"));

        let mut out = Vec::new();
        assert_eq!(archive.unpack_to("two.bin", &mut out).unwrap(), 6);
        assert_eq!(out, b"second");

        archive.delete("dir/one.bin").unwrap();
        assert!(!archive.exists("dir/one.bin"));
        archive.close().unwrap();
        assert_eq!(archive.state(), PakState::Closed);
    }

    #[test]
    fn test_physical_archive() {
        let mut pak = PakFileBuilder::new().create(Cursor::new(Vec::new())).unwrap();
        assert_eq!(Archive::pak_type(&pak), PakType::Classic);
        exercise(&mut pak);
    }

    #[test]
    fn test_virtual_archive() {
        let mut pak = VirtualPak::new();
        pak.open(vec![ManifestEntry::in_memory("base.txt", b"base".to_vec())]).unwrap();
        assert_eq!(Archive::pak_type(&pak), PakType::Csv);
        assert_eq!(Archive::list(&pak).unwrap().len(), 1);
        exercise(&mut pak);
    }
}
