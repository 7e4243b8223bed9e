//! Optional best-effort persistence for the VFS, backed by an injected
//! key/value blob store. The persistence backend driver itself is an
//! external collaborator (spec §1); only this trait contract is owned here.

use std::collections::BTreeMap;

use crate::vfs::Vfs;

/// The fixed key the VFS snapshot is stored under.
pub const PERSISTENCE_KEY: &str = "filesystem";
/// The namespace the blob store is expected to scope persistence calls to.
pub const PERSISTENCE_NAMESPACE: &str = "bavini-fs";

/// A minimal synchronous key/value blob store. Implementations back onto
/// whatever storage the embedding application provides; the VFS only needs
/// `get`/`put` of an opaque byte blob keyed by a fixed name.
pub trait BlobStore {
    fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>>;
    fn put(&self, namespace: &str, key: &str, value: &[u8]);
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to serialize VFS snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("blob store returned no snapshot for key '{0}'")]
    NotFound(String),
}

/// Serialize the tree to JSON and store it. Best-effort: failures are
/// reported but never corrupt in-memory state.
pub fn persist(vfs: &Vfs, store: &dyn BlobStore) -> Result<(), PersistError> {
    let snapshot = vfs.to_json();
    let bytes = serde_json::to_vec(&snapshot)?;
    store.put(PERSISTENCE_NAMESPACE, PERSISTENCE_KEY, &bytes);
    tracing::debug!(bytes = bytes.len(), "persisted VFS snapshot");
    Ok(())
}

/// Load a previously persisted snapshot and rebuild a VFS from it.
pub fn restore(store: &dyn BlobStore) -> Result<Vfs, PersistError> {
    let bytes = store
        .get(PERSISTENCE_NAMESPACE, PERSISTENCE_KEY)
        .ok_or_else(|| PersistError::NotFound(PERSISTENCE_KEY.to_string()))?;
    let snapshot: BTreeMap<String, String> = serde_json::from_slice(&bytes)?;
    Ok(Vfs::from_json(&snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryBlobStore {
        data: RefCell<HashMap<(String, String), Vec<u8>>>,
    }

    impl BlobStore for MemoryBlobStore {
        fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
            self.data
                .borrow()
                .get(&(namespace.to_string(), key.to_string()))
                .cloned()
        }

        fn put(&self, namespace: &str, key: &str, value: &[u8]) {
            self.data
                .borrow_mut()
                .insert((namespace.to_string(), key.to_string()), value.to_vec());
        }
    }

    #[test]
    fn persist_then_restore_round_trips() {
        use crate::node::Content;

        let mut vfs = Vfs::new();
        vfs.write_file("/src/index.js", Content::Text("1+1".into()))
            .unwrap();

        let store = MemoryBlobStore::default();
        persist(&vfs, &store).unwrap();

        let restored = restore(&store).unwrap();
        assert_eq!(
            restored.to_json().get("/src/index.js"),
            vfs.to_json().get("/src/index.js")
        );
    }

    #[test]
    fn restore_without_prior_persist_errors() {
        let store = MemoryBlobStore::default();
        assert!(restore(&store).is_err());
    }
}
