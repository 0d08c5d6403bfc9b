//! File-backed store: one file per key under a base directory.
//!
//! # File Format
//!
//! Each value is written verbatim to `{base_dir}/{encoded_key}.json`.
//! Characters outside `[A-Za-z0-9._-]` are percent-encoded in the file name
//! so namespaced keys like `shard:v1` are portable across platforms.
//! Writes go to a `.tmp` sibling first and are moved into place with an
//! atomic rename.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::repository::{KeyValueStore, RepositoryError, Result};

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) a store rooted at `base_dir`.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(RepositoryError::InvalidKey(key.to_owned()));
        }
        Ok(self
            .base_dir
            .join(format!("{}.{EXTENSION}", encode_key(key))))
    }

    fn stored_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if let Some(filename) = path.file_name().and_then(|s| s.to_str())
                && let Some(encoded) = filename.strip_suffix(".json")
                && let Some(key) = decode_key(encoded)
            {
                keys.push(key);
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => {
                tracing::debug!(target: "runtime::store", key, path = %path.display(), "loaded");
                Ok(Some(bytes))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;

        tracing::debug!(target: "runtime::store", key, path = %path.display(), "saved");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .stored_keys()?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }

    fn clear(&self) -> Result<()> {
        for key in self.stored_keys()? {
            self.delete(&key)?;
        }
        Ok(())
    }
}

fn encode_key(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

fn decode_key(encoded: &str) -> Option<String> {
    urlencoding::decode(encoded).ok().map(Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encoding_round_trips() {
        for key in ["shard:v1", "plain", "with space/slash", "ünïcode"] {
            let encoded = encode_key(key);
            assert!(!encoded.contains(':') && !encoded.contains('/'));
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
        assert_eq!(encode_key("shard:v1"), "shard%3Av1");
        assert_eq!(encode_key("with space"), "with%20space");
        assert_eq!(decode_key("%FF%FE"), None);
    }
}
