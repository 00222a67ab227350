pub mod serde_md5_hex {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(value: &[u8; 16], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&crate::hasher::md5_hex(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 16], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let mut out = [0u8; 16];
        hex::decode_to_slice(&s, &mut out)
            .map_err(|e| D::Error::custom(format!("invalid md5 hex string `{s}`: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::pak::Entry;

    #[test]
    fn test_entry_json() {
        let entry = Entry::new("a/b.dat", 512, 3, 509).with_md5([0xAB; 16]);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"md5\":\"abababababababababababababababab\""));
        let back: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_bad_md5_hex() {
        let json = r#"{"name":"a","offset":0,"size":0,"size_duplicate":0,"padding_size":0,"md5":"abc","filler1":null,"filler2":null,"create_time":0,"modify_time":0}"#;
        assert!(serde_json::from_str::<Entry>(json).is_err());
        let json = json.replace("\"abc\"", &format!("\"{}\"", "zz".repeat(16)));
        assert!(serde_json::from_str::<Entry>(&json).is_err());
    }
}
