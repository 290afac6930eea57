use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use uptime_types::ids;

use crate::error::{Result, StoreError};
use crate::locks::KeyedLocks;

const RECORD_EXT: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Tokens,
    Checks,
}

impl Collection {
    pub const ALL: [Self; 3] = [Self::Users, Self::Tokens, Self::Checks];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Tokens => "tokens",
            Self::Checks => "checks",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON documents on disk, one file per record.
///
/// Each record lives at `{dir}/{collection}/{id}.json`. Every write goes to a
/// sibling temp file that is renamed into place, so readers see either the
/// old or the new document and never a partial one. Writes to the same record
/// are serialized through a per-record lock; reads take no lock.
pub struct RecordStore {
    dir: PathBuf,
    locks: KeyedLocks<(Collection, String)>,
}

impl RecordStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        for collection in Collection::ALL {
            let path = dir.join(collection.as_str());
            fs::create_dir_all(&path)
                .await
                .map_err(|e| StoreError::io(&path, e))?;
        }
        info!("Record store directory: {}", dir.display());
        Ok(Self {
            dir,
            locks: KeyedLocks::new(),
        })
    }

    /// Path to the file for a given record.
    fn record_path(&self, collection: Collection, id: &str) -> Result<PathBuf> {
        if !is_safe_id(id) {
            return Err(StoreError::InvalidId { id: id.to_string() });
        }
        Ok(self
            .dir
            .join(collection.as_str())
            .join(format!("{id}.{RECORD_EXT}")))
    }

    /// Store a new record. Fails with `Conflict` if the id is taken.
    pub async fn create<T: Serialize>(&self, collection: Collection, id: &str, data: &T) -> Result<()> {
        let path = self.record_path(collection, id)?;
        let bytes = serde_json::to_vec(data).map_err(StoreError::Encode)?;
        let key = (collection, id.to_string());
        let _guard = self.locks.lock(&key).await;

        // The document is complete before its name appears. `hard_link` fails
        // if the name is taken, so two creators cannot both succeed.
        let tmp = write_temp(&path, &bytes)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        let linked = fs::hard_link(&tmp, &path).await;
        fs::remove_file(&tmp).await.ok();
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::Conflict {
                    collection,
                    id: id.to_string(),
                });
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        }
        debug!(%collection, id, "Record created");
        Ok(())
    }

    pub async fn read<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Result<T> {
        let path = self.record_path(collection, id)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    collection,
                    id: id.to_string(),
                });
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
            collection,
            id: id.to_string(),
            source,
        })
    }

    /// Replace an existing record wholesale. Fails with `NotFound` if absent.
    pub async fn update<T: Serialize>(&self, collection: Collection, id: &str, data: &T) -> Result<()> {
        let path = self.record_path(collection, id)?;
        let _guard = self.locks.lock(&(collection, id.to_string())).await;
        self.overwrite(collection, id, &path, data).await
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let path = self.record_path(collection, id)?;
        let key = (collection, id.to_string());
        let _guard = self.locks.lock(&key).await;
        match fs::remove_file(&path).await {
            Ok(()) => {
                self.locks.forget(&key);
                debug!(%collection, id, "Record deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            }),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Ids of every record currently stored in `collection`, sorted.
    pub async fn list(&self, collection: Collection) -> Result<Vec<String>> {
        let dir = self.dir.join(collection.as_str());
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name.strip_suffix(".json") {
                if is_safe_id(id) {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Read-modify-write a record under its lock.
    ///
    /// `f` sees the freshest stored document. If it returns an error nothing
    /// is written and the error is passed through.
    pub async fn modify<T, R, E, F>(&self, collection: Collection, id: &str, f: F) -> std::result::Result<R, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StoreError>,
        F: FnOnce(&mut T) -> std::result::Result<R, E>,
    {
        let path = self.record_path(collection, id)?;
        let _guard = self.locks.lock(&(collection, id.to_string())).await;
        let mut record: T = self.read(collection, id).await?;
        let out = f(&mut record)?;
        self.overwrite(collection, id, &path, &record).await?;
        Ok(out)
    }

    /// Caller must hold the record lock.
    async fn overwrite<T: Serialize>(&self, collection: Collection, id: &str, path: &Path, data: &T) -> Result<()> {
        let exists = fs::try_exists(path)
            .await
            .map_err(|e| StoreError::io(path, e))?;
        if !exists {
            return Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            });
        }
        let bytes = serde_json::to_vec(data).map_err(StoreError::Encode)?;
        replace_file(path, &bytes).await?;
        debug!(%collection, id, "Record updated");
        Ok(())
    }
}

/// Write `bytes` to a temp file beside `path`, then rename over it.
async fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = write_temp(path, bytes)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    if let Err(e) = fs::rename(&tmp, path).await {
        fs::remove_file(&tmp).await.ok();
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

/// Write and sync `bytes` to a fresh temp file in `path`'s directory.
async fn write_temp(path: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("record");
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", ids::random_string(8)));

    let write = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await
    };
    match write.await {
        Ok(()) => Ok(tmp),
        Err(e) => {
            fs::remove_file(&tmp).await.ok();
            Err(e)
        }
    }
}

fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    fn doc(name: &str, count: u32) -> Doc {
        Doc {
            name: name.into(),
            count,
        }
    }

    async fn store() -> (TempDir, RecordStore) {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path().join("data")).await.unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let (_tmp, store) = store().await;
        store.create(Collection::Users, "5551234567", &doc("a", 1)).await.unwrap();
        let back: Doc = store.read(Collection::Users, "5551234567").await.unwrap();
        assert_eq!(back, doc("a", 1));
    }

    #[tokio::test]
    async fn create_twice_conflicts() {
        let (_tmp, store) = store().await;
        store.create(Collection::Tokens, "t1", &doc("a", 1)).await.unwrap();
        let err = store.create(Collection::Tokens, "t1", &doc("b", 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        let kept: Doc = store.read(Collection::Tokens, "t1").await.unwrap();
        assert_eq!(kept, doc("a", 1));
    }

    #[tokio::test]
    async fn update_replaces_whole_document() {
        let (_tmp, store) = store().await;
        store.create(Collection::Checks, "c1", &doc("a", 1)).await.unwrap();
        store.update(Collection::Checks, "c1", &doc("b", 7)).await.unwrap();
        let back: Doc = store.read(Collection::Checks, "c1").await.unwrap();
        assert_eq!(back, doc("b", 7));
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let (_tmp, store) = store().await;
        let err = store.update(Collection::Checks, "nope", &doc("a", 1)).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.list(Collection::Checks).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_then_read_is_not_found() {
        let (_tmp, store) = store().await;
        store.create(Collection::Users, "u1", &doc("a", 1)).await.unwrap();
        store.delete(Collection::Users, "u1").await.unwrap();
        let err = store.read::<Doc>(Collection::Users, "u1").await.unwrap_err();
        assert!(err.is_not_found());
        let err = store.delete(Collection::Users, "u1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_returns_ids_per_collection() {
        let (_tmp, store) = store().await;
        store.create(Collection::Checks, "b", &doc("b", 1)).await.unwrap();
        store.create(Collection::Checks, "a", &doc("a", 1)).await.unwrap();
        store.create(Collection::Users, "u", &doc("u", 1)).await.unwrap();
        assert_eq!(store.list(Collection::Checks).await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.list(Collection::Users).await.unwrap(), vec!["u"]);
        assert!(store.list(Collection::Tokens).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_surfaces_decode_error() {
        let (tmp, store) = store().await;
        let path = tmp.path().join("data").join("checks").join("broken.json");
        tokio::fs::write(&path, b"{\"name\": \"half").await.unwrap();
        let err = store.read::<Doc>(Collection::Checks, "broken").await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }), "got {err}");
    }

    #[tokio::test]
    async fn path_like_ids_are_rejected() {
        let (_tmp, store) = store().await;
        for id in ["", "../users/x", "a/b", "a.b"] {
            let err = store.create(Collection::Users, id, &doc("x", 1)).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidId { .. }), "{id:?} accepted");
        }
    }

    #[tokio::test]
    async fn modify_error_leaves_record_untouched() {
        let (_tmp, store) = store().await;
        store.create(Collection::Users, "u1", &doc("a", 1)).await.unwrap();
        let result: std::result::Result<(), StoreError> = store
            .modify(Collection::Users, "u1", |d: &mut Doc| {
                d.count = 99;
                Err(StoreError::InvalidId { id: "veto".into() })
            })
            .await;
        assert!(result.is_err());
        let back: Doc = store.read(Collection::Users, "u1").await.unwrap();
        assert_eq!(back.count, 1);
    }

    #[tokio::test]
    async fn concurrent_modifies_do_not_lose_updates() {
        let (_tmp, store) = store().await;
        let store = Arc::new(store);
        store.create(Collection::Checks, "c1", &doc("n", 0)).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store
                    .modify(Collection::Checks, "c1", |d: &mut Doc| {
                        d.count += 1;
                        Ok::<_, StoreError>(())
                    })
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        let back: Doc = store.read(Collection::Checks, "c1").await.unwrap();
        assert_eq!(back.count, 20);
    }

    #[tokio::test]
    async fn unlocked_readers_never_see_a_half_created_record() {
        let (_tmp, store) = store().await;
        let store = Arc::new(store);

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for n in 0..50 {
                    store.create(Collection::Checks, &format!("c{n}"), &doc("new", n)).await.unwrap();
                }
            })
        };
        while !writer.is_finished() {
            for id in store.list(Collection::Checks).await.unwrap() {
                let read = store.read::<Doc>(Collection::Checks, &id).await;
                assert!(read.is_ok(), "{id}: {:?}", read.err());
            }
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        assert_eq!(store.list(Collection::Checks).await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn temp_files_are_not_listed() {
        let (tmp, store) = store().await;
        store.create(Collection::Checks, "c1", &doc("a", 1)).await.unwrap();
        let stray = tmp.path().join("data").join("checks").join(".c1.json.abc.tmp");
        tokio::fs::write(&stray, b"{}").await.unwrap();
        assert_eq!(store.list(Collection::Checks).await.unwrap(), vec!["c1"]);
    }
}
