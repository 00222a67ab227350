use std::io::Read;

use md5::{Digest, Md5};

pub fn md5_hash(data: &[u8]) -> [u8; 16] {
    Md5::digest(data).into()
}

pub fn md5_hash_reader<R: Read>(mut reader: R) -> Result<[u8; 16], std::io::Error> {
    let mut hasher = Md5::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().into())
}

/// Incremental content hash for streamed payloads.
#[derive(Default)]
pub struct ContentHasher(Md5);

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finish(self) -> [u8; 16] {
        self.0.finalize().into()
    }
}

pub fn md5_hex(md5: &[u8; 16]) -> String {
    hex::encode(md5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_empty() {
        assert_eq!(md5_hex(&md5_hash(b"")), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_md5_reader() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let hash = md5_hash_reader(&data[..]).unwrap();
        assert_eq!(hash, md5_hash(data));
        assert_eq!(md5_hex(&hash), "9e107d9d372bb6826bd81d3542a419d6");

        let mut hasher = ContentHasher::new();
        for chunk in data.chunks(5) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.finish(), hash);
    }
}
