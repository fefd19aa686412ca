// Copyright 2021 - 2025 Martin Pool

//! The object cache (`spec.md` §4.5): a two-tier map from a compiled
//! module's content hash to its compiled object bytes, with an optional
//! on-disk tier for reuse across runs.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::sync::RwLock;

use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;

use crate::Result;

/// The cache key: a module's content hash, optionally suffixed by a
/// mutation point's `userIdentifier` for mutated objects, so that the
/// original and every mutant of the same module get distinct entries.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_module(module_hash: &str) -> CacheKey {
        CacheKey(module_hash.to_owned())
    }

    pub fn for_mutant(module_hash: &str, user_identifier: &str) -> CacheKey {
        CacheKey(format!("{module_hash}.{user_identifier}"))
    }

    fn file_name(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

/// Two-tier object cache. The in-memory tier is always present; the
/// on-disk tier is optional and, when enabled, is consulted on a memory
/// miss and promoted back into memory on a disk hit (`spec.md` §4.5). No
/// eviction: the process lifetime bounds memory growth, and disk entries
/// accumulate across runs by design (rebuilding everything on every
/// invocation would defeat the point of caching).
pub struct ObjectCache {
    memory: RwLock<HashMap<CacheKey, Vec<u8>>>,
    disk_dir: Option<Utf8PathBuf>,
}

impl ObjectCache {
    pub fn in_memory_only() -> ObjectCache {
        ObjectCache { memory: RwLock::new(HashMap::new()), disk_dir: None }
    }

    pub fn with_disk_dir(dir: impl Into<Utf8PathBuf>) -> Result<ObjectCache> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(ObjectCache { memory: RwLock::new(HashMap::new()), disk_dir: Some(dir) })
    }

    pub fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        if let Some(bytes) = self.memory.read().expect("object cache lock poisoned").get(key) {
            return Ok(Some(bytes.clone()));
        }
        let Some(dir) = &self.disk_dir else {
            return Ok(None);
        };
        let path = dir.join(key.file_name());
        if !path.exists() {
            return Ok(None);
        }
        let bytes = read_locked(&path)?;
        self.memory
            .write()
            .expect("object cache lock poisoned")
            .insert(key.clone(), bytes.clone());
        Ok(Some(bytes))
    }

    pub fn put(&self, key: CacheKey, bytes: Vec<u8>) -> Result<()> {
        if let Some(dir) = &self.disk_dir {
            write_locked(&dir.join(key.file_name()), &bytes)?;
        }
        self.memory.write().expect("object cache lock poisoned").insert(key, bytes);
        Ok(())
    }
}

fn read_locked(path: &Utf8Path) -> Result<Vec<u8>> {
    let file = fs::File::open(path)?;
    file.lock_shared()?;
    let bytes = fs::read(path)?;
    FileExt::unlock(&file)?;
    Ok(bytes)
}

fn write_locked(path: &Utf8Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    file.lock_exclusive()?;
    file.write_all(bytes)?;
    FileExt::unlock(&file)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory_tier_round_trips() {
        let cache = ObjectCache::in_memory_only();
        let key = CacheKey::for_module("deadbeef");
        assert!(cache.get(&key).unwrap().is_none());
        cache.put(key.clone(), vec![1, 2, 3]).unwrap();
        assert_eq!(cache.get(&key).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn disk_tier_survives_a_fresh_cache_instance() {
        let dir = tempfile::tempdir().unwrap();
        let dir_path = Utf8PathBuf::from_path_buf(dir.path().to_owned()).unwrap();
        let key = CacheKey::for_mutant("deadbeef", "add_to_sub:f.c:1:2");

        let cache = ObjectCache::with_disk_dir(dir_path.clone()).unwrap();
        cache.put(key.clone(), vec![9, 8, 7]).unwrap();

        let reopened = ObjectCache::with_disk_dir(dir_path).unwrap();
        assert_eq!(reopened.get(&key).unwrap(), Some(vec![9, 8, 7]));
    }
}
