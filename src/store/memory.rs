use super::{Document, Filter, RecordStore, StoreResult, Update, stamp, upserted};
use async_trait::async_trait;
use dashmap::DashMap;

/// Record store kept entirely in memory, one vector per collection.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    collections: DashMap<String, Vec<Document>>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a collection wholesale (used when loading from disk).
    pub fn load_collection(&self, collection: &str, documents: Vec<Document>) {
        self.collections.insert(collection.to_string(), documents);
    }

    /// Snapshot of a collection in insertion order.
    #[must_use]
    pub fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|documents| documents.value().clone())
            .unwrap_or_default()
    }

    pub(crate) fn create_sync(&self, collection: &str, document: Document) -> Document {
        insert(&mut self.collections.entry(collection.to_string()).or_default(), document)
    }

    pub(crate) fn find_sync(&self, collection: &str, filter: &Filter) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| filter.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn update_sync(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Option<Document> {
        let mut documents = self.collections.entry(collection.to_string()).or_default();
        update_first(&mut documents, filter, update, upsert)
    }

    pub(crate) fn delete_sync(&self, collection: &str, filter: &Filter) -> Option<Document> {
        let mut documents = self.collections.get_mut(collection)?;
        delete_first(&mut documents, filter)
    }
}

/// Stamp and append a document.
fn insert(documents: &mut Vec<Document>, document: Document) -> Document {
    let document = stamp(document);
    documents.push(document.clone());
    document
}

/// Update the first match, or append the upserted document.
pub(crate) fn update_first(
    documents: &mut Vec<Document>,
    filter: &Filter,
    update: &Update,
    upsert: bool,
) -> Option<Document> {
    if let Some(document) = documents.iter_mut().find(|document| filter.matches(document)) {
        update.apply(document);
        return Some(document.clone());
    }
    if upsert {
        let document = upserted(filter, update);
        documents.push(document.clone());
        return Some(document);
    }
    None
}

pub(crate) fn delete_first(documents: &mut Vec<Document>, filter: &Filter) -> Option<Document> {
    let index = documents.iter().position(|document| filter.matches(document))?;
    Some(documents.remove(index))
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, collection: &str, document: Document) -> StoreResult<Document> {
        Ok(self.create_sync(collection, document))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        Ok(self.find_sync(collection, filter))
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(self.find_sync(collection, filter).into_iter().next())
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> StoreResult<Option<Document>> {
        Ok(self.update_sync(collection, filter, update, upsert))
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> StoreResult<Option<Document>> {
        Ok(self.delete_sync(collection, filter))
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let count = self
            .collections
            .get(collection)
            .map_or(0, |documents| documents.iter().filter(|d| filter.matches(d)).count());
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}
