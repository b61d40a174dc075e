//! Stable surrogate identifiers.
//!
//! An [`IdRegistry`] maps the natural key of one entity type (commune
//! `(type, code)`, department `(code,)`, ...) to a dense integer ID. The mapping
//! is loaded from its store at the start of a run, extended in memory as new
//! keys show up, and written back only through [`IdRegistry::commit`] on the
//! success path. An uncommitted registry is simply dropped, so a failed run
//! never persists IDs for entities whose table was never published.
//!
//! `resolve` takes `&mut self`: one handle serializes every resolution for its
//! entity type and carries no internal locking.

mod store;

pub use store::RegistryStore;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{DataError, Result};
use crate::metrics;

/// Surrogate ID, unique within one registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(u32);

impl Id {
    pub fn new(value: u32) -> Self {
        Id(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether unseen keys may be allocated a new ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    ReadWrite,
    ReadOnly,
}

/// Name and natural-key columns of one entity type's registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RegistrySpec {
    pub name: &'static str,
    pub key: &'static [&'static str],
}

impl RegistrySpec {
    pub const fn new(name: &'static str, key: &'static [&'static str]) -> Self {
        Self { name, key }
    }
}

/// In-memory natural key ↔ surrogate ID mapping for one entity type
pub struct IdRegistry {
    name: String,
    path: PathBuf,
    columns: Vec<String>,
    mode: Mode,
    ids: HashMap<Vec<String>, Id>,
    keys: BTreeMap<Id, Vec<String>>,
    next_id: u32,
    allocated: usize,
    store_exists: bool,
    committed: bool,
}

impl IdRegistry {
    pub(crate) fn from_entries(
        name: &str,
        path: &Path,
        columns: Vec<String>,
        mode: Mode,
        entries: Vec<(Vec<String>, Id)>,
        store_exists: bool,
    ) -> Result<Self> {
        let mut ids = HashMap::with_capacity(entries.len());
        let mut keys = BTreeMap::new();

        for (key, id) in entries {
            if let Some(previous) = keys.get(&id) {
                return Err(DataError::corruption(
                    path,
                    format!("id {} is mapped to both {:?} and {:?}", id, previous, key),
                ));
            }
            if let Some(previous) = ids.insert(key.clone(), id) {
                return Err(DataError::corruption(
                    path,
                    format!("key {:?} is mapped to both {} and {}", key, previous, id),
                ));
            }
            keys.insert(id, key);
        }

        // Loaded IDs may be sparse after manual edits: never reuse a gap
        let next_id = keys.keys().next_back().map_or(0, |max| max.0 + 1);

        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            columns,
            mode,
            ids,
            keys,
            next_id,
            allocated: 0,
            store_exists,
            committed: false,
        })
    }

    /// Return the ID of `key`, allocating the next one if the key is new.
    ///
    /// Read-only registries fail with [`DataError::UnknownKey`] instead of
    /// allocating, and are left untouched.
    pub fn resolve(&mut self, key: &[&str]) -> Result<Id> {
        let key = self.owned_key(key)?;
        if let Some(id) = self.ids.get(&key) {
            return Ok(*id);
        }

        if self.mode == Mode::ReadOnly {
            return Err(DataError::UnknownKey {
                registry: self.name.clone(),
                key,
            });
        }

        let id = Id(self.next_id);
        self.next_id = self.next_id.checked_add(1).ok_or_else(|| {
            DataError::corruption(&self.path, "surrogate id space exhausted")
        })?;
        debug!(registry = %self.name, id = %id, key = ?key, "Allocated new id");
        self.ids.insert(key.clone(), id);
        self.keys.insert(id, key);
        self.allocated += 1;
        Ok(id)
    }

    /// Lookup without allocation
    pub fn get(&self, key: &[&str]) -> Option<Id> {
        let key: Vec<String> = key.iter().map(|s| s.to_string()).collect();
        self.ids.get(&key).copied()
    }

    /// Natural key holding `id`
    pub fn key_of(&self, id: Id) -> Option<&[String]> {
        self.keys.get(&id).map(|k| k.as_slice())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// ID the next unseen key would receive
    pub fn next_id(&self) -> Id {
        Id(self.next_id)
    }

    /// Number of IDs allocated since the registry was opened
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Entries ordered by ID
    pub fn entries(&self) -> impl Iterator<Item = (Id, &[String])> {
        self.keys.iter().map(|(id, key)| (*id, key.as_slice()))
    }

    /// Persist the registry. Only called once the entity's table is complete.
    ///
    /// Read-only registries and unchanged stores are not rewritten.
    pub fn commit(mut self) -> Result<()> {
        self.committed = true;

        if self.mode == Mode::ReadOnly {
            return Ok(());
        }
        if self.allocated == 0 && self.store_exists {
            debug!(registry = %self.name, "Registry unchanged, store left as is");
            return Ok(());
        }

        store::write_entries(&self.path, &self.columns, self.entries())?;
        metrics::registry::ids_allocated(&self.name, self.allocated);
        info!(
            "💾 Registry {} saved: {} keys ({} new)",
            self.name,
            self.len(),
            self.allocated
        );
        Ok(())
    }

    fn owned_key(&self, key: &[&str]) -> Result<Vec<String>> {
        if key.len() != self.columns.len() {
            return Err(DataError::KeyArity {
                registry: self.name.clone(),
                expected: self.columns.len(),
                got: key.len(),
            });
        }
        Ok(key.iter().map(|s| s.to_string()).collect())
    }
}

impl Drop for IdRegistry {
    fn drop(&mut self) {
        if !self.committed && self.allocated > 0 {
            warn!(
                "Discarding {} ids allocated in registry {} (not committed)",
                self.allocated, self.name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;

    fn communes(store: &RegistryStore, mode: Mode) -> IdRegistry {
        store.open("communes", &["type", "code"], mode).unwrap()
    }

    #[test]
    fn test_resolve_is_stable_within_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path());
        let mut reg = communes(&store, Mode::ReadWrite);

        let a = reg.resolve(&["COM", "01001"]).unwrap();
        let b = reg.resolve(&["COM", "01002"]).unwrap();
        assert_eq!(reg.resolve(&["COM", "01001"]).unwrap(), a);
        assert_ne!(a, b);
        assert_eq!(reg.allocated(), 2);
    }

    #[test]
    fn test_resolve_is_stable_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path());

        let mut reg = communes(&store, Mode::ReadWrite);
        let first = reg.resolve(&["COMD", "01003"]).unwrap();
        reg.commit().unwrap();

        let mut reg = communes(&store, Mode::ReadWrite);
        assert_eq!(reg.resolve(&["COMD", "01003"]).unwrap(), first);
        assert_eq!(reg.allocated(), 0);
    }

    #[test]
    fn test_ids_are_dense_in_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path());
        let mut reg = store.open("departements", &["code"], Mode::ReadWrite).unwrap();

        let codes = ["01", "02", "2A", "01", "2B", "02", "971"];
        let ids: Vec<u32> = codes.iter().map(|c| reg.resolve(&[*c]).unwrap().get()).collect();

        assert_eq!(ids, vec![0, 1, 2, 0, 3, 1, 4]);
        let distinct: BTreeSet<u32> = ids.into_iter().collect();
        assert_eq!(distinct, (0..5).collect());
    }

    #[test]
    fn test_read_only_rejects_unknown_keys_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("epci.csv"), "code,id\n200000172,0\n").unwrap();
        let store = RegistryStore::new(dir.path());
        let mut reg = store.open("epci", &["code"], Mode::ReadOnly).unwrap();

        assert_eq!(reg.resolve(&["200000172"]).unwrap(), Id::new(0));
        let err = reg.resolve(&["999999999"]).unwrap_err();
        assert!(matches!(err, DataError::UnknownKey { .. }));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.next_id(), Id::new(1));
        assert_eq!(reg.allocated(), 0);
    }

    #[test]
    fn test_sparse_ids_are_never_reused() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("cantons.csv"),
            "code,id\n0101,0\n0102,7\n0103,3\n",
        )
        .unwrap();
        let store = RegistryStore::new(dir.path());
        let mut reg = store.open("cantons", &["code"], Mode::ReadWrite).unwrap();

        assert_eq!(reg.resolve(&["0104"]).unwrap(), Id::new(8));
        assert_eq!(reg.resolve(&["0105"]).unwrap(), Id::new(9));
    }

    #[test]
    fn test_incremental_allocation_keeps_existing_ids() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("communes.csv"), "type,code,id\nCOM,01001,0\n").unwrap();
        let store = RegistryStore::new(dir.path());

        let mut reg = communes(&store, Mode::ReadWrite);
        assert_eq!(reg.resolve(&["COM", "01001"]).unwrap(), Id::new(0));
        assert_eq!(reg.resolve(&["COM", "01002"]).unwrap(), Id::new(1));
        reg.commit().unwrap();

        let content = fs::read_to_string(dir.path().join("communes.csv")).unwrap();
        assert_eq!(content, "type,code,id\nCOM,01001,0\nCOM,01002,1\n");
    }

    #[test]
    fn test_uncommitted_registry_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path());
        {
            let mut reg = communes(&store, Mode::ReadWrite);
            reg.resolve(&["COM", "01001"]).unwrap();
        }
        assert!(!dir.path().join("communes.csv").exists());
    }

    #[test]
    fn test_wrong_key_arity_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path());
        let mut reg = communes(&store, Mode::ReadWrite);
        let err = reg.resolve(&["01001"]).unwrap_err();
        assert!(matches!(err, DataError::KeyArity { expected: 2, got: 1, .. }));
    }

    #[test]
    fn test_key_of_is_the_reverse_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path());
        let mut reg = communes(&store, Mode::ReadWrite);
        let id = reg.resolve(&["ARM", "75101"]).unwrap();
        assert_eq!(reg.key_of(id), Some(&["ARM".to_string(), "75101".to_string()][..]));
        assert_eq!(reg.get(&["ARM", "75101"]), Some(id));
        assert_eq!(reg.get(&["ARM", "75102"]), None);
    }
}
