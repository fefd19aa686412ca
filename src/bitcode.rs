// Copyright 2021 - 2025 Martin Pool

//! Owns loaded modules and their content-hashes, and hands out stable
//! function handles (`spec.md` §3, "Bitcode store").
//!
//! The bitcode/IR *reader* is an external collaborator: this module never
//! parses a compiler's native bitcode format. It only owns whatever
//! `ir::Module` values the caller hands it (already decoded) and indexes
//! them by content hash, exactly as `original_source`'s `ObjectCache` and
//! `MullModule` key everything off an opaque identifier string.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use sha2::{Digest, Sha256};

use crate::ir::Module;
use crate::Result;

/// A content-hash identity for a loaded module: stable across processes,
/// and identical for two loads of byte-identical modules.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn from_hex(hex: String) -> ModuleId {
        ModuleId(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compute the identity of a module from its serialized bytes.
    pub fn of_bytes(bytes: &[u8]) -> ModuleId {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        ModuleId(hex_encode(&hasher.finalize()))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to a String cannot fail");
    }
    s
}

/// Owns every module loaded for the lifetime of the run.
///
/// Write-once at load time, read-only thereafter (`spec.md` §5): once a
/// module is inserted it is never mutated in place; mutated clones live in
/// a *different* module produced by `crate::trampoline`.
#[derive(Default)]
pub struct BitcodeStore {
    modules: RwLock<HashMap<ModuleId, Module>>,
}

impl BitcodeStore {
    pub fn new() -> BitcodeStore {
        BitcodeStore::default()
    }

    /// Insert an already-decoded module, keyed by the content hash of its
    /// serialized bytes. Loading the same bytes twice returns the same id
    /// (testable property: "two loads of identical bytes produce
    /// identical cache hits").
    pub fn insert(&self, module: Module) -> Result<ModuleId> {
        let bytes = module.to_bytes()?;
        let id = ModuleId::of_bytes(&bytes);
        self.modules
            .write()
            .expect("bitcode store lock poisoned")
            .entry(id.clone())
            .or_insert(module);
        Ok(id)
    }

    pub fn get(&self, id: &ModuleId) -> Option<Module> {
        self.modules
            .read()
            .expect("bitcode store lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.modules.read().expect("bitcode store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::Module;

    #[test]
    fn identical_bytes_produce_identical_module_id() {
        let store = BitcodeStore::new();
        let id1 = store.insert(Module::new("a")).unwrap();
        let id2 = store.insert(Module::new("a")).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn different_bytes_produce_different_module_id() {
        let store = BitcodeStore::new();
        let id1 = store.insert(Module::new("a")).unwrap();
        let id2 = store.insert(Module::new("b")).unwrap();
        assert_ne!(id1, id2);
        assert_eq!(store.len(), 2);
    }
}
