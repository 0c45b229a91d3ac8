use std::sync::Arc;

use futures::StreamExt;

use crate::{
    action_info,
    document::DocumentMapper,
    entity::EntityId,
    error::FillError,
    repository::Repository,
    serializer::EntitySerializer,
    storage::CollectionHandle,
};

/// One-shot bulk loader from a collection into an empty repository.
///
/// Run it before any [`PersistenceLayer`](crate::persistence::PersistenceLayer) is attached to the
/// repository: registration raises `Created`, which an attached layer would write back to the store.
pub struct RepositoryFiller<D> {
    serializer: Arc<dyn EntitySerializer<D>>,
    collection: CollectionHandle,
}

impl<D: Send + Sync + 'static> RepositoryFiller<D> {
    pub fn new(serializer: Arc<dyn EntitySerializer<D>>, collection: impl Into<CollectionHandle>) -> Self {
        Self { serializer, collection: collection.into() }
    }

    /// Load every document of the collection, returning how many entities were registered.
    ///
    /// The whole cursor is drained and deserialized before anything is registered, so the first
    /// document that fails to deserialize aborts the fill with the repository left untouched.
    #[cfg_attr(feature = "instrument", tracing::instrument(level = "info", skip_all, fields(collection = %self.collection.name())))]
    pub async fn fill_repository(&self, repository: &Repository<D>) -> Result<usize, FillError> {
        if !repository.is_empty() {
            return Err(FillError::RepositoryNotEmpty(repository.len()));
        }

        let mut staged: Vec<(EntityId, D)> = Vec::new();
        let mut cursor = self.collection.find_all();
        while let Some(document) = cursor.next().await {
            let document = document?;
            let key = document.key().ok().flatten();
            let raw = DocumentMapper::document_to_snapshot(document);
            let entity = self.serializer.deserialize(raw).map_err(|source| FillError::Deserialization { key, source })?;
            staged.push(entity);
        }

        let count = staged.len();
        for (id, data) in staged {
            repository.create_entity_with_id(data, id)?;
        }
        action_info!(self, "filled", "{} <- {} entities", repository.name(), count);
        Ok(count)
    }
}

impl<D> std::fmt::Display for RepositoryFiller<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "RepositoryFiller({})", self.collection.name()) }
}
