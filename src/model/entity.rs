use serde::{Deserialize, Serialize};

/// Identifier of a topological entity (face or body) of an imported geometry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRef(pub String);

impl EntityRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityRef {
    fn from(value: &str) -> Self {
        EntityRef(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TopologicalReference {
    pub entities: Vec<EntityRef>,
    #[serde(default)]
    pub sets: Vec<String>,
}

impl TopologicalReference {
    pub fn new(entities: Vec<EntityRef>) -> Self {
        Self {
            entities,
            sets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityClass {
    Face,
    Body,
    Region,
}

impl EntityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::Face => "face",
            EntityClass::Body => "body",
            EntityClass::Region => "region",
        }
    }
}

/// Attribute filter for a geometry-mapping query.
///
/// `attributes[i]` is matched against `values[i]` when values are given; with
/// no values the query returns every entity carrying the attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityFilter {
    pub class: Option<EntityClass>,
    pub attributes: Vec<String>,
    pub values: Vec<String>,
}

impl EntityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, class: EntityClass) -> Self {
        self.class = Some(class);
        self
    }

    pub fn attribute(mut self, attribute: &str) -> Self {
        self.attributes.push(attribute.to_string());
        self
    }

    pub fn attribute_value(mut self, attribute: &str, value: &str) -> Self {
        self.attributes.push(attribute.to_string());
        self.values.push(value.to_string());
        self
    }

    /// Query-string pairs in the order the service expects them.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(class) = self.class {
            pairs.push(("_class".to_string(), class.as_str().to_string()));
        }
        for attribute in &self.attributes {
            pairs.push(("attributes".to_string(), attribute.clone()));
        }
        for value in &self.values {
            pairs.push(("values".to_string(), value.clone()));
        }
        pairs
    }
}

impl std::fmt::Display for EntityFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let class = self.class.map(|c| c.as_str()).unwrap_or("any");
        write!(
            f,
            "{}[{}={}]",
            class,
            self.attributes.join(","),
            self.values.join(",")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAttribute {
    pub attribute: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityOrigin {
    #[serde(default)]
    pub attributes: Vec<EntityAttribute>,
}

/// An unfiltered geometry-mapping match, as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntity {
    pub name: String,
    #[serde(default)]
    pub entity_class: Option<EntityClass>,
    #[serde(default)]
    pub originate_from: Vec<EntityOrigin>,
}

impl RawEntity {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef(self.name.clone())
    }

    /// First value of `attribute` across all origins.
    pub fn attribute_value(&self, attribute: &str) -> Option<&str> {
        self.originate_from
            .iter()
            .flat_map(|origin| origin.attributes.iter())
            .find(|attr| attr.attribute == attribute)
            .map(|attr| attr.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_query_pairs() {
        let filter = EntityFilter::new()
            .class(EntityClass::Face)
            .attribute_value("SDL/TYSA_NAME", "NS_Inlet");
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("_class".to_string(), "face".to_string()),
                ("attributes".to_string(), "SDL/TYSA_NAME".to_string()),
                ("values".to_string(), "NS_Inlet".to_string()),
            ]
        );
    }

    #[test]
    fn test_attribute_lookup_spans_origins() {
        let entity = RawEntity {
            name: "B1_TE5".to_string(),
            entity_class: Some(EntityClass::Body),
            originate_from: vec![
                EntityOrigin { attributes: vec![] },
                EntityOrigin {
                    attributes: vec![EntityAttribute {
                        attribute: "ATTRIB_XPARASOLID_NAME".to_string(),
                        value: "Steel".to_string(),
                    }],
                },
            ],
        };
        assert_eq!(entity.attribute_value("ATTRIB_XPARASOLID_NAME"), Some("Steel"));
        assert_eq!(entity.attribute_value("SDL/TYSA_COLOUR"), None);
    }
}
