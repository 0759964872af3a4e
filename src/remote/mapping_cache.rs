use crate::model::{EntityFilter, EntityRef, Id};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// What a logical entity key resolved to
#[derive(Clone, Debug, PartialEq)]
pub enum MappedEntities {
    /// Exactly one entity was required and found
    Single(EntityRef),
    /// The caller asked for a list
    Many(Vec<EntityRef>),
}

impl MappedEntities {
    pub fn refs(&self) -> Vec<EntityRef> {
        match self {
            MappedEntities::Single(entity) => vec![entity.clone()],
            MappedEntities::Many(entities) => entities.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MappedEntities::Single(_) => 1,
            MappedEntities::Many(entities) => entities.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache entry for a resolved entity key
#[derive(Clone, Debug)]
struct CacheEntry {
    entities: MappedEntities,
    filter: EntityFilter,
    resolved_at: Instant,
}

/// In-memory cache of entity keys per geometry.
///
/// Mappings belong to a geometry, not to a specification, so the cache outlives
/// builder resets and can be shared between builders working on one geometry.
#[derive(Debug)]
pub struct EntityMappingCache {
    /// Entries keyed by (geometry_id, entity key)
    entries: Arc<RwLock<HashMap<(Id, String), CacheEntry>>>,
    /// Keys per geometry in resolution order
    keys_by_geometry: Arc<RwLock<HashMap<Id, Vec<String>>>>,
}

impl EntityMappingCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            keys_by_geometry: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the entities mapped to a key, if resolved
    pub async fn get(&self, geometry_id: &Id, key: &str) -> Option<MappedEntities> {
        let entries = self.entries.read().await;
        entries
            .get(&(geometry_id.clone(), key.to_string()))
            .map(|entry| entry.entities.clone())
    }

    /// The filter a key was resolved with
    pub async fn filter_for(&self, geometry_id: &Id, key: &str) -> Option<EntityFilter> {
        let entries = self.entries.read().await;
        entries
            .get(&(geometry_id.clone(), key.to_string()))
            .map(|entry| entry.filter.clone())
    }

    /// Put a resolved key into the cache, replacing an earlier resolution
    pub async fn put(&self, geometry_id: &Id, key: &str, filter: EntityFilter, entities: MappedEntities) {
        let mut entries = self.entries.write().await;
        let mut keys_by_geometry = self.keys_by_geometry.write().await;

        let previous = entries.insert(
            (geometry_id.clone(), key.to_string()),
            CacheEntry {
                entities,
                filter,
                resolved_at: Instant::now(),
            },
        );

        if previous.is_none() {
            keys_by_geometry
                .entry(geometry_id.clone())
                .or_default()
                .push(key.to_string());
        }
    }

    /// Keys resolved for a geometry, oldest first
    pub async fn keys(&self, geometry_id: &Id) -> Vec<String> {
        let keys_by_geometry = self.keys_by_geometry.read().await;
        keys_by_geometry.get(geometry_id).cloned().unwrap_or_default()
    }

    /// Age of a key's resolution
    pub async fn age(&self, geometry_id: &Id, key: &str) -> Option<std::time::Duration> {
        let entries = self.entries.read().await;
        entries
            .get(&(geometry_id.clone(), key.to_string()))
            .map(|entry| entry.resolved_at.elapsed())
    }

    /// Remove a single key
    pub async fn remove(&self, geometry_id: &Id, key: &str) {
        let mut entries = self.entries.write().await;
        let mut keys_by_geometry = self.keys_by_geometry.write().await;

        entries.remove(&(geometry_id.clone(), key.to_string()));
        if let Some(keys) = keys_by_geometry.get_mut(geometry_id) {
            keys.retain(|k| k != key);
        }
    }

    /// Drop every key of a geometry, e.g. after it was re-imported
    pub async fn invalidate_geometry(&self, geometry_id: &Id) {
        let mut entries = self.entries.write().await;
        let mut keys_by_geometry = self.keys_by_geometry.write().await;

        entries.retain(|(geometry, _), _| geometry != geometry_id);
        keys_by_geometry.remove(geometry_id);
    }

    /// Clear the entire cache
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let mut keys_by_geometry = self.keys_by_geometry.write().await;
        entries.clear();
        keys_by_geometry.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for EntityMappingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityClass;

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = EntityMappingCache::new();
        let geometry_id = "geo-1".to_string();
        let filter = EntityFilter::new()
            .class(EntityClass::Face)
            .attribute_value("SDL/TYSA_NAME", "Inlet");

        // Put into cache
        cache
            .put(
                &geometry_id,
                "inlet",
                filter.clone(),
                MappedEntities::Single(EntityRef::from("B1_TE5")),
            )
            .await;

        // Get from cache
        let cached = cache.get(&geometry_id, "inlet").await;
        assert_eq!(cached, Some(MappedEntities::Single(EntityRef::from("B1_TE5"))));
        assert_eq!(cache.filter_for(&geometry_id, "inlet").await, Some(filter));

        // Keys are scoped to the geometry
        assert!(cache.get(&"geo-2".to_string(), "inlet").await.is_none());
        assert_eq!(cache.keys(&geometry_id).await, vec!["inlet".to_string()]);

        // Remove from cache
        cache.remove(&geometry_id, "inlet").await;
        assert!(cache.get(&geometry_id, "inlet").await.is_none());
        assert!(cache.keys(&geometry_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_geometry_keeps_others() {
        let cache = EntityMappingCache::new();
        let a = "geo-a".to_string();
        let b = "geo-b".to_string();

        for (geometry, key) in [(&a, "inlet"), (&a, "outlet"), (&b, "inlet")] {
            cache
                .put(
                    geometry,
                    key,
                    EntityFilter::new(),
                    MappedEntities::Many(vec![EntityRef::from("B1_TE1"), EntityRef::from("B1_TE2")]),
                )
                .await;
        }
        assert_eq!(cache.len().await, 3);

        cache.invalidate_geometry(&a).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&b, "inlet").await.map(|m| m.len()), Some(2));
    }
}
