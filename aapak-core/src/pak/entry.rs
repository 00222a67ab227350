use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serde_util::serde_md5_hex;

/// FILETIME ticks (100ns since 1601-01-01) at the unix epoch.
const FILETIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;

/// One FAT record: an active payload or a deleted (free) slot.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub(crate) name: String,
    pub(crate) offset: u64,
    pub(crate) size: u64,
    pub(crate) size_duplicate: u64,
    pub(crate) padding_size: u32,
    #[serde(with = "serde_md5_hex")]
    pub(crate) md5: [u8; 16],
    pub(crate) filler1: Option<u32>,
    pub(crate) filler2: Option<u64>,
    pub(crate) create_time: i64,
    pub(crate) modify_time: i64,
}

impl Entry {
    pub fn new(name: impl Into<String>, offset: u64, size: u64, padding_size: u32) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
            size_duplicate: size,
            padding_size,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn size_duplicate(&self) -> u64 {
        self.size_duplicate
    }

    pub fn padding_size(&self) -> u32 {
        self.padding_size
    }

    pub fn md5(&self) -> &[u8; 16] {
        &self.md5
    }

    /// A zeroed hash marks content that was never hashed or has been deleted.
    pub fn has_md5(&self) -> bool {
        self.md5 != [0; 16]
    }

    pub fn filler1(&self) -> Option<u32> {
        self.filler1
    }

    pub fn filler2(&self) -> Option<u64> {
        self.filler2
    }

    pub fn create_time(&self) -> i64 {
        self.create_time
    }

    pub fn modify_time(&self) -> i64 {
        self.modify_time
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        filetime_to_datetime(self.create_time)
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        filetime_to_datetime(self.modify_time)
    }

    /// Bytes this entry owns in the payload region.
    pub fn capacity(&self) -> u64 {
        self.size + self.padding_size as u64
    }

    /// First byte after this entry's payload and padding.
    pub fn end(&self) -> u64 {
        self.offset + self.capacity()
    }

    pub fn with_md5(mut self, md5: [u8; 16]) -> Self {
        self.md5 = md5;
        self
    }

    pub fn with_times(mut self, create_time: i64, modify_time: i64) -> Self {
        self.create_time = create_time;
        self.modify_time = modify_time;
        self
    }

    pub fn with_fillers(mut self, filler1: Option<u32>, filler2: Option<u64>) -> Self {
        self.filler1 = filler1;
        self.filler2 = filler2;
        self
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Entry {
    /// Ordering key: ordinal name bytes, then offset, then the remaining fields so `Ord` agrees with `Eq`.
    #[allow(clippy::type_complexity)]
    fn sort_key(&self) -> (&[u8], u64, u64, u64, u32, &[u8; 16], Option<u32>, Option<u64>, i64, i64) {
        (
            self.name.as_bytes(),
            self.offset,
            self.size,
            self.size_duplicate,
            self.padding_size,
            &self.md5,
            self.filler1,
            self.filler2,
            self.create_time,
            self.modify_time,
        )
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("size_duplicate", &self.size_duplicate)
            .field("padding_size", &self.padding_size)
            .field("md5", &crate::hasher::md5_hex(&self.md5))
            .field("filler1", &self.filler1.map(|v| format!("{v:08x}")))
            .field("filler2", &self.filler2.map(|v| format!("{v:016x}")))
            .field("create_time", &self.create_time)
            .field("modify_time", &self.modify_time)
            .finish()
    }
}

pub fn filetime_to_datetime(filetime: i64) -> Option<DateTime<Utc>> {
    let ticks = filetime.checked_sub(FILETIME_UNIX_EPOCH)?;
    let secs = ticks.div_euclid(10_000_000);
    let nanos = (ticks.rem_euclid(10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

pub fn datetime_to_filetime(datetime: DateTime<Utc>) -> i64 {
    datetime.timestamp() * 10_000_000 + (datetime.timestamp_subsec_nanos() / 100) as i64 + FILETIME_UNIX_EPOCH
}

/// Current time as FILETIME ticks.
pub fn filetime_now() -> i64 {
    datetime_to_filetime(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal_order() {
        let mut entries = vec![
            Entry::new("b.dat", 0, 1, 0),
            Entry::new("B.dat", 512, 1, 0),
            Entry::new("a/z.dat", 1024, 1, 0),
        ];
        entries.sort();
        let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["B.dat", "a/z.dat", "b.dat"]);
    }

    #[test]
    fn test_order_agrees_with_eq() {
        let a = Entry::new("a.dat", 512, 10, 502);
        let b = Entry::new("a.dat", 512, 20, 492);
        assert_ne!(a, b);
        assert_ne!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.cmp(&a.clone()), Ordering::Equal);

        let hashed = a.clone().with_md5([1; 16]);
        assert_eq!(a.cmp(&hashed), Ordering::Less);
    }

    #[test]
    fn test_capacity() {
        let entry = Entry::new("readme.txt", 512, 10, 502);
        assert_eq!(entry.capacity(), 512);
        assert_eq!(entry.end(), 1024);
        assert_eq!(entry.size_duplicate(), 10);
    }

    #[test]
    fn test_filetime() {
        assert_eq!(filetime_to_datetime(FILETIME_UNIX_EPOCH).unwrap().timestamp(), 0);
        let now = Utc::now();
        let back = filetime_to_datetime(datetime_to_filetime(now)).unwrap();
        assert_eq!(back.timestamp(), now.timestamp());
        assert_eq!(filetime_to_datetime(i64::MIN), None);
    }
}
