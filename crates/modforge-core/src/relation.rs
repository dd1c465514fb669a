//! Many-to-many connect/disconnect reconciliation.
//!
//! Generated access layers implement [`RelationStore`] over their storage and
//! delegate to [`sync_many_to_many`], which validates both requested key sets
//! before anything is persisted.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Storage access needed to reconcile one relation collection.
#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Key of the record owning the collection.
    type Owner: Send + Sync;
    /// Key of a related record.
    type Key: Ord + Clone + Send + Sync;
    type Record: Clone + Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    fn key_of(&self, record: &Self::Record) -> Self::Key;

    /// Current collection of `owner`.
    async fn load_related(&self, owner: &Self::Owner) -> Result<Vec<Self::Record>, Self::Error>;

    /// Records that exist for `keys`; missing keys are simply absent.
    async fn resolve(&self, keys: &[Self::Key]) -> Result<Vec<Self::Record>, Self::Error>;

    async fn persist_related(
        &self,
        owner: &Self::Owner,
        related: Vec<Self::Record>,
    ) -> Result<(), Self::Error>;
}

/// Request body of a relation sync route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct RelationSync<K> {
    #[serde(default)]
    pub connect: Vec<K>,
    #[serde(default)]
    pub disconnect: Vec<K>,
}

impl<K> Default for RelationSync<K> {
    fn default() -> Self {
        Self {
            connect: Vec::new(),
            disconnect: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSide {
    Connect,
    Disconnect,
}

impl fmt::Display for SyncSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncSide::Connect => f.write_str("connect"),
            SyncSide::Disconnect => f.write_str("disconnect"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError<E> {
    #[error("{side} items not found: requested {requested}, found {found}")]
    NotFound {
        side: SyncSide,
        requested: usize,
        found: usize,
    },
    #[error(transparent)]
    Store(E),
}

/// `(current - disconnect) ∪ connect`, deduplicated by key, order preserved.
pub fn reconcile<R, K, F>(current: Vec<R>, disconnect: &[R], connect: Vec<R>, key_of: F) -> Vec<R>
where
    K: Ord,
    F: Fn(&R) -> K,
{
    let removed: BTreeSet<K> = disconnect.iter().map(&key_of).collect();
    let mut seen = BTreeSet::new();
    current
        .into_iter()
        .filter(|record| !removed.contains(&key_of(record)))
        .chain(connect)
        .filter(|record| seen.insert(key_of(record)))
        .collect()
}

/// Apply a connect/disconnect request to `owner`'s collection.
///
/// Fails with [`SyncError::NotFound`] before persisting when either side
/// resolves to fewer records than distinct keys requested.
pub async fn sync_many_to_many<S>(
    store: &S,
    owner: &S::Owner,
    request: &RelationSync<S::Key>,
) -> Result<Vec<S::Record>, SyncError<S::Error>>
where
    S: RelationStore + ?Sized,
{
    let disconnect = resolve_exact(store, &request.disconnect, SyncSide::Disconnect).await?;
    let connect = resolve_exact(store, &request.connect, SyncSide::Connect).await?;

    let current = store.load_related(owner).await.map_err(SyncError::Store)?;
    let updated = reconcile(current, &disconnect, connect, |record| store.key_of(record));

    store
        .persist_related(owner, updated.clone())
        .await
        .map_err(SyncError::Store)?;
    Ok(updated)
}

async fn resolve_exact<S>(
    store: &S,
    keys: &[S::Key],
    side: SyncSide,
) -> Result<Vec<S::Record>, SyncError<S::Error>>
where
    S: RelationStore + ?Sized,
{
    let requested: Vec<S::Key> = keys
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if requested.is_empty() {
        return Ok(Vec::new());
    }

    let records = store.resolve(&requested).await.map_err(SyncError::Store)?;
    let found: BTreeSet<S::Key> = records.iter().map(|record| store.key_of(record)).collect();
    if found.len() != requested.len() {
        return Err(SyncError::NotFound {
            side,
            requested: requested.len(),
            found: found.len(),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("store unavailable")]
    struct StoreDown;

    #[derive(Default)]
    struct MemoryStore {
        records: BTreeSet<u32>,
        links: Mutex<BTreeMap<u32, Vec<u32>>>,
        persisted: Mutex<usize>,
    }

    impl MemoryStore {
        fn with(records: &[u32], owner: u32, linked: &[u32]) -> Self {
            let store = MemoryStore {
                records: records.iter().copied().collect(),
                ..MemoryStore::default()
            };
            store.links.lock().unwrap().insert(owner, linked.to_vec());
            store
        }

        fn linked(&self, owner: u32) -> Vec<u32> {
            self.links
                .lock()
                .unwrap()
                .get(&owner)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl RelationStore for MemoryStore {
        type Owner = u32;
        type Key = u32;
        type Record = u32;
        type Error = StoreDown;

        fn key_of(&self, record: &u32) -> u32 {
            *record
        }

        async fn load_related(&self, owner: &u32) -> Result<Vec<u32>, StoreDown> {
            Ok(self.linked(*owner))
        }

        async fn resolve(&self, keys: &[u32]) -> Result<Vec<u32>, StoreDown> {
            Ok(keys
                .iter()
                .copied()
                .filter(|key| self.records.contains(key))
                .collect())
        }

        async fn persist_related(&self, owner: &u32, related: Vec<u32>) -> Result<(), StoreDown> {
            self.links.lock().unwrap().insert(*owner, related);
            *self.persisted.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn reconcile_removes_then_appends_without_duplicates() {
        let updated = reconcile(vec![1, 2, 3], &[2], vec![3, 4, 4], |record| *record);
        assert_eq!(updated, vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn sync_applies_connect_and_disconnect() {
        let store = MemoryStore::with(&[1, 2, 3, 4], 7, &[1, 2]);
        let request = RelationSync {
            connect: vec![3, 3, 4],
            disconnect: vec![1],
        };

        let updated = sync_many_to_many(&store, &7, &request).await.unwrap();
        assert_eq!(updated, vec![2, 3, 4]);
        assert_eq!(store.linked(7), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn missing_disconnect_key_leaves_collection_unchanged() {
        let store = MemoryStore::with(&[1, 2, 3], 7, &[1, 2]);
        let request = RelationSync {
            connect: vec![3],
            disconnect: vec![2, 99],
        };

        let err = sync_many_to_many(&store, &7, &request).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::NotFound {
                side: SyncSide::Disconnect,
                requested: 2,
                found: 1
            }
        ));
        assert_eq!(store.linked(7), vec![1, 2]);
        assert_eq!(*store.persisted.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_connect_key_is_rejected() {
        let store = MemoryStore::with(&[1, 2], 7, &[]);
        let request = RelationSync {
            connect: vec![5],
            disconnect: Vec::new(),
        };

        let err = sync_many_to_many(&store, &7, &request).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "connect items not found: requested 1, found 0"
        );
        assert!(store.linked(7).is_empty());
    }
}
