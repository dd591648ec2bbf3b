use super::memory::{delete_first, update_first};
use super::{Document, Filter, MemoryRecordStore, RecordStore, StoreResult, Update, stamp};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Record store persisted as one YAML file per collection.
///
/// Reads are served from memory. Every write rewrites the affected collection file.
#[derive(Debug)]
pub struct YamlRecordStore {
    dir: PathBuf,
    memory: MemoryRecordStore,
    // Serializes file writes so an older snapshot never overwrites a newer one.
    write_lock: Mutex<()>,
}

impl YamlRecordStore {
    /// Open the store rooted at `dir`, loading every `*.yaml` collection found there.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be created or read.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        if !dir.exists() {
            tokio::fs::create_dir_all(&dir).await?;
        }

        let memory = MemoryRecordStore::new();
        let pattern = format!("{}/*.yaml", dir.display());
        for entry in glob::glob(&pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable collection file: {e}");
                    continue;
                }
            };
            let Some(collection) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = tokio::fs::read_to_string(&path).await?;
            match serde_yaml::from_str::<Vec<Document>>(&content) {
                Ok(documents) => {
                    info!("Loaded {} record(s) from {}", documents.len(), path.display());
                    memory.load_collection(collection, documents);
                }
                Err(e) => warn!("Failed to parse {}: {e}", path.display()),
            }
        }

        Ok(Self {
            dir,
            memory,
            write_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.yaml"))
    }

    /// Apply `change` to a copy of the collection, write it out, and only then
    /// publish it to memory. `None` from `change` means nothing to write.
    async fn write_with<T>(
        &self,
        collection: &str,
        change: impl FnOnce(&mut Vec<Document>) -> Option<T> + Send,
    ) -> StoreResult<Option<T>> {
        let _guard = self.write_lock.lock().await;
        let mut documents = self.memory.snapshot(collection);
        let Some(result) = change(&mut documents) else {
            return Ok(None);
        };
        let yaml = serde_yaml::to_string(&documents)?;
        tokio::fs::write(self.collection_path(collection), yaml).await?;
        self.memory.load_collection(collection, documents);
        Ok(Some(result))
    }
}

#[async_trait]
impl RecordStore for YamlRecordStore {
    async fn create(&self, collection: &str, document: Document) -> StoreResult<Document> {
        let document = stamp(document);
        let stored = document.clone();
        self.write_with(collection, move |documents| {
            documents.push(stored);
            Some(())
        })
        .await?;
        Ok(document)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        Ok(self.memory.find_sync(collection, filter))
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(self.memory.find_sync(collection, filter).into_iter().next())
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> StoreResult<Option<Document>> {
        self.write_with(collection, |documents| {
            update_first(documents, filter, update, upsert)
        })
        .await
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> StoreResult<Option<Document>> {
        self.write_with(collection, |documents| delete_first(documents, filter))
            .await
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.memory.count_documents(collection, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = YamlRecordStore::open(dir.path()).await.unwrap();
            store
                .create("audit_logs", doc(json!({"kind": "ban", "payload": {"user_id": "5"}})))
                .await
                .unwrap();
            store
                .find_one_and_update(
                    "control_flags",
                    &Filter::new().field("key", "lockdown"),
                    &Update::new().set("value", true),
                    true,
                )
                .await
                .unwrap();
        }
        assert!(dir.path().join("audit_logs.yaml").exists());

        let reopened = YamlRecordStore::open(dir.path()).await.unwrap();
        let logs = reopened
            .find("audit_logs", &Filter::new().field("payload.user_id", "5"))
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        let flag = reopened
            .find_one("control_flags", &Filter::new().field("key", "lockdown"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(flag["value"], json!(true));
    }

    #[tokio::test]
    async fn test_delete_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlRecordStore::open(dir.path()).await.unwrap();
        store.create("strikes", doc(json!({"_id": "s1"}))).await.unwrap();
        store
            .find_one_and_delete("strikes", &Filter::by_id("s1"))
            .await
            .unwrap();

        let reopened = YamlRecordStore::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.count_documents("strikes", &Filter::new()).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("data");
        let store = YamlRecordStore::open(&nested).await.unwrap();
        assert_eq!(store.dir(), nested.as_path());
        assert!(nested.exists());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        let store = YamlRecordStore::open(&root).await.unwrap();
        let lockdown = Filter::new().field("key", "lockdown");
        store
            .find_one_and_update("control_flags", &lockdown, &Update::new().set("value", false), true)
            .await
            .unwrap();

        std::fs::remove_dir_all(&root).unwrap();
        assert!(
            store
                .find_one_and_update("control_flags", &lockdown, &Update::new().set("value", true), true)
                .await
                .is_err()
        );
        assert!(store.create("strikes", doc(json!({"_id": "s1"}))).await.is_err());

        let flag = store.find_one("control_flags", &lockdown).await.unwrap().unwrap();
        assert_eq!(flag["value"], json!(false));
        assert_eq!(store.count_documents("strikes", &Filter::new()).await.unwrap(), 0);
    }
}
