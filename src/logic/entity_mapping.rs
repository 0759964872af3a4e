use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, WorkflowError};
use crate::model::{EntityFilter, EntityRef, Id, RawEntity};
use crate::remote::{EntityMappingCache, GeometryApi, MappedEntities, LISTING_LIMIT};

/// Face colour attribute written by most CAD exporters.
pub const COLOUR_ATTRIBUTE: &str = "SDL/TYSA_COLOUR";
/// Body name attribute of Parasolid files.
pub const PARASOLID_NAME_ATTRIBUTE: &str = "ATTRIB_XPARASOLID_NAME";

/// Resolves attribute filters to entity references of one geometry and
/// remembers the results under caller-chosen keys.
pub struct EntityMapper<'a, S: ?Sized> {
    remote: &'a S,
    project_id: Id,
    geometry_id: Id,
    cache: Arc<EntityMappingCache>,
}

impl<'a, S> EntityMapper<'a, S>
where
    S: GeometryApi + ?Sized,
{
    pub fn new(remote: &'a S, project_id: &Id, geometry_id: &Id, cache: Arc<EntityMappingCache>) -> Self {
        Self {
            remote,
            project_id: project_id.clone(),
            geometry_id: geometry_id.clone(),
            cache,
        }
    }

    pub fn geometry_id(&self) -> &Id {
        &self.geometry_id
    }

    pub fn cache(&self) -> &Arc<EntityMappingCache> {
        &self.cache
    }

    /// Every entity matching `filter`, with its attributes.
    pub async fn resolve_raw(&self, filter: &EntityFilter) -> Result<Vec<RawEntity>> {
        let entities = self
            .remote
            .get_geometry_mappings(&self.project_id, &self.geometry_id, filter, LISTING_LIMIT)
            .await?;
        debug!("{} matched {} entities", filter, entities.len());
        Ok(entities)
    }

    /// The one entity matching `filter`; zero or several matches are an error.
    pub async fn resolve_single(&self, filter: &EntityFilter) -> Result<EntityRef> {
        let entities = self.resolve_raw(filter).await?;
        match entities.as_slice() {
            [only] => Ok(only.entity_ref()),
            _ => Err(WorkflowError::AmbiguousOrMissingEntity {
                query: filter.to_string(),
                expected: "exactly one entity".to_string(),
                found: entities.len(),
            }),
        }
    }

    /// All entities matching `filter`, optionally checking their count.
    pub async fn resolve_many(&self, filter: &EntityFilter, expected: Option<usize>) -> Result<Vec<EntityRef>> {
        let entities = self.resolve_raw(filter).await?;
        if let Some(expected) = expected {
            if entities.len() != expected {
                return Err(WorkflowError::AmbiguousOrMissingEntity {
                    query: filter.to_string(),
                    expected: format!("{} entities", expected),
                    found: entities.len(),
                });
            }
        }
        Ok(entities.iter().map(RawEntity::entity_ref).collect())
    }

    /// Resolve exactly one entity and cache it under `key`.
    pub async fn map_single(&self, key: &str, filter: EntityFilter) -> Result<EntityRef> {
        let entity = self.resolve_single(&filter).await?;
        self.cache
            .put(&self.geometry_id, key, filter, MappedEntities::Single(entity.clone()))
            .await;
        Ok(entity)
    }

    /// Resolve a list of entities and cache it under `key`.
    pub async fn map_many(&self, key: &str, filter: EntityFilter, expected: Option<usize>) -> Result<Vec<EntityRef>> {
        let entities = self.resolve_many(&filter, expected).await?;
        self.cache
            .put(&self.geometry_id, key, filter, MappedEntities::Many(entities.clone()))
            .await;
        Ok(entities)
    }

    /// Entities previously cached under `key`.
    pub async fn entity(&self, key: &str) -> Result<Vec<EntityRef>> {
        self.cache
            .get(&self.geometry_id, key)
            .await
            .map(|mapped| mapped.refs())
            .ok_or_else(|| WorkflowError::UnknownEntityKey(key.to_string()))
    }

    /// Entities of several keys, in key order without repeats.
    pub async fn entities(&self, keys: &[&str]) -> Result<Vec<EntityRef>> {
        let mut out: Vec<EntityRef> = Vec::new();
        for key in keys {
            for entity in self.entity(key).await? {
                if !out.contains(&entity) {
                    out.push(entity);
                }
            }
        }
        Ok(out)
    }
}

/// Group entities by the value of `attribute`; entities without it are skipped.
pub fn group_by_attribute(entities: &[RawEntity], attribute: &str) -> BTreeMap<String, Vec<EntityRef>> {
    let mut groups: BTreeMap<String, Vec<EntityRef>> = BTreeMap::new();
    for entity in entities {
        match entity.attribute_value(attribute) {
            Some(value) => groups
                .entry(value.to_string())
                .or_default()
                .push(entity.entity_ref()),
            None => debug!("{} has no {} attribute", entity.name, attribute),
        }
    }
    groups
}

/// Parse a stringified fractional colour such as `[1.0 0.5 0.0]` into 0-255
/// channels. Scaled values round ties to even, so `0.5` (127.5) becomes 128.
pub fn parse_rgb(text: &str) -> Result<[u8; 3]> {
    let invalid = |why: &str| WorkflowError::Parse(format!("colour '{}': {}", text, why));

    let channels = text
        .replace(['[', ']'], "")
        .split_whitespace()
        .map(|part| part.parse::<f64>().map_err(|_| invalid("not a number")))
        .collect::<Result<Vec<f64>>>()?;

    match channels.as_slice() {
        [r, g, b] => {
            let scale = |c: f64| (c * 255.0).round_ties_even().clamp(0.0, 255.0) as u8;
            Ok([scale(*r), scale(*g), scale(*b)])
        }
        _ => Err(invalid("expected three channels")),
    }
}

/// Group entities whose colour attribute equals a palette entry, by label.
pub fn group_by_palette(
    entities: &[RawEntity],
    attribute: &str,
    palette: &[(String, [u8; 3])],
) -> Result<BTreeMap<String, Vec<EntityRef>>> {
    let mut groups: BTreeMap<String, Vec<EntityRef>> = BTreeMap::new();
    for entity in entities {
        let Some(raw) = entity.attribute_value(attribute) else {
            continue;
        };
        let rgb = parse_rgb(raw)?;
        match palette.iter().find(|(_, colour)| *colour == rgb) {
            Some((label, _)) => groups.entry(label.clone()).or_default().push(entity.entity_ref()),
            None => warn!("{} colour {:?} matches no palette entry", entity.name, rgb),
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityAttribute, EntityClass, EntityOrigin};
    use crate::remote::MemoryRemote;

    fn raw(name: &str, attribute: &str, value: &str) -> RawEntity {
        RawEntity {
            name: name.to_string(),
            entity_class: Some(EntityClass::Face),
            originate_from: vec![EntityOrigin {
                attributes: vec![EntityAttribute {
                    attribute: attribute.to_string(),
                    value: value.to_string(),
                }],
            }],
        }
    }

    #[test]
    fn test_parse_rgb() {
        assert_eq!(parse_rgb("[1.0 0.0 0.0]").unwrap(), [255, 0, 0]);
        assert_eq!(parse_rgb("[0.2 0.4 0.6]").unwrap(), [51, 102, 153]);
        // 0.5 * 255 = 127.5 rounds to the even neighbour
        assert_eq!(parse_rgb("[0.5 0.5 0.5]").unwrap(), [128, 128, 128]);
        assert!(parse_rgb("[1.0 0.0]").is_err());
        assert!(parse_rgb("[red 0 0]").is_err());
    }

    #[test]
    fn test_group_by_palette() {
        let entities = vec![
            raw("B1_TE1", COLOUR_ATTRIBUTE, "[1.0 0.0 0.0]"),
            raw("B1_TE2", COLOUR_ATTRIBUTE, "[0.0 0.0 1.0]"),
            raw("B1_TE3", COLOUR_ATTRIBUTE, "[1.0 0.0 0.0]"),
            raw("B1_TE4", COLOUR_ATTRIBUTE, "[0.0 1.0 0.0]"),
        ];
        let palette = vec![
            ("hot".to_string(), [255, 0, 0]),
            ("cold".to_string(), [0, 0, 255]),
        ];
        let groups = group_by_palette(&entities, COLOUR_ATTRIBUTE, &palette).unwrap();
        assert_eq!(
            groups["hot"],
            vec![EntityRef::from("B1_TE1"), EntityRef::from("B1_TE3")]
        );
        assert_eq!(groups["cold"], vec![EntityRef::from("B1_TE2")]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_group_by_attribute() {
        let entities = vec![
            raw("B1_TE1", PARASOLID_NAME_ATTRIBUTE, "Steel"),
            raw("B2_TE1", PARASOLID_NAME_ATTRIBUTE, "Insulation"),
            raw("B3_TE1", PARASOLID_NAME_ATTRIBUTE, "Steel"),
            raw("B4_TE1", COLOUR_ATTRIBUTE, "[1 1 1]"),
        ];
        let groups = group_by_attribute(&entities, PARASOLID_NAME_ATTRIBUTE);
        assert_eq!(groups["Steel"].len(), 2);
        assert_eq!(groups["Insulation"], vec![EntityRef::from("B2_TE1")]);
        assert_eq!(groups.len(), 2);
    }

    #[tokio::test]
    async fn test_single_resolution_requires_exactly_one() {
        let remote = MemoryRemote::new();
        let project_id = remote.add_project("P");
        let geometry_id = remote.add_geometry(&project_id, "G");
        let inlet = EntityFilter::new().class(EntityClass::Face).attribute_value("SDL/TYSA_NAME", "Inlet");
        let walls = EntityFilter::new().class(EntityClass::Face).attribute_value("SDL/TYSA_NAME", "Wall");
        remote.set_mappings(&geometry_id, &inlet, vec![raw("B1_TE5", "SDL/TYSA_NAME", "Inlet")]);
        remote.set_mappings(
            &geometry_id,
            &walls,
            vec![raw("B1_TE6", "SDL/TYSA_NAME", "Wall"), raw("B1_TE7", "SDL/TYSA_NAME", "Wall")],
        );

        let cache = Arc::new(EntityMappingCache::new());
        let mapper = EntityMapper::new(&remote, &project_id, &geometry_id, cache.clone());

        assert_eq!(mapper.map_single("inlet", inlet).await.unwrap(), EntityRef::from("B1_TE5"));
        assert!(matches!(
            mapper.resolve_single(&walls).await,
            Err(WorkflowError::AmbiguousOrMissingEntity { found: 2, .. })
        ));
        assert!(matches!(
            mapper.resolve_many(&walls, Some(3)).await,
            Err(WorkflowError::AmbiguousOrMissingEntity { found: 2, .. })
        ));

        mapper.map_many("walls", walls, Some(2)).await.unwrap();
        assert_eq!(
            mapper.entities(&["inlet", "walls", "inlet"]).await.unwrap(),
            vec![
                EntityRef::from("B1_TE5"),
                EntityRef::from("B1_TE6"),
                EntityRef::from("B1_TE7")
            ]
        );
        assert!(matches!(
            mapper.entity("outlet").await,
            Err(WorkflowError::UnknownEntityKey(_))
        ));
        assert_eq!(cache.len().await, 2);
    }
}
