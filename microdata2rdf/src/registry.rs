use indexmap::IndexMap;
use oxrdf::NamedNode;
use oxrdf::vocab::rdf;
use serde::Deserialize;

use crate::Error;

/// Vocabulary-specific behaviour, keyed by URI prefix.
///
/// See <https://w3c.github.io/microdata-rdf/#vocabulary-registry>. Prefixes
/// keep their declaration order, which matters because the first matching
/// prefix determines an item's vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabRegistry {
    entries: IndexMap<String, VocabEntry>,
}

/// Property expansions declared for one vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabEntry {
    /// property name → relation name (e.g. `subPropertyOf`) → expansion IRI
    properties: IndexMap<String, IndexMap<String, NamedNode>>,
}

// the JSON layout used by https://www.w3.org/ns/md
#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    properties: IndexMap<String, IndexMap<String, String>>,
}

const SUBPROPERTY_TOKENS: [&str; 2] = ["subPropertyOf", "equivalentProperty"];

impl VocabRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used when none is configured: `schema.org` (over `http` and
    /// `https`), where `additionalType` is a sub-property of `rdf:type`, and
    /// the hCard microformat profile.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for prefix in ["http://schema.org/", "https://schema.org/"] {
            registry.insert_property(
                prefix,
                "additionalType",
                "subPropertyOf",
                rdf::TYPE.into_owned(),
            );
        }
        registry.insert_prefix("http://microformats.org/profile/hcard");
        registry
    }

    /// Loads a registry from JSON shaped like `https://www.w3.org/ns/md`.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let raw: IndexMap<String, RawEntry> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (prefix, entry) in raw {
            registry.insert_prefix(&prefix);
            for (property, relations) in entry.properties {
                for (relation, iri) in relations {
                    let iri = NamedNode::new(iri.as_str()).map_err(|source| {
                        Error::IriParseError {
                            source,
                            iri: iri.clone(),
                        }
                    })?;
                    registry.insert_property(&prefix, &property, &relation, iri);
                }
            }
        }
        Ok(registry)
    }

    pub fn insert_prefix(&mut self, prefix: &str) -> &mut VocabEntry {
        self.entries.entry(prefix.to_string()).or_default()
    }

    pub fn insert_property(
        &mut self,
        prefix: &str,
        property: &str,
        relation: &str,
        iri: NamedNode,
    ) {
        self.insert_prefix(prefix)
            .properties
            .entry(property.to_string())
            .or_default()
            .insert(relation.to_string(), iri);
    }

    /// Registered prefixes, in declaration order.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, vocab: &str) -> Option<&VocabEntry> {
        self.entries.get(vocab)
    }

    /// Extra predicates implied by an `itemprop` value.
    ///
    /// A `subPropertyOf` or `equivalentProperty` token adds `rdf:type`. If
    /// `vocab` is registered, every token that names a registered property
    /// adds that property's expansions.
    pub(crate) fn expansions(&self, itemprop: &str, vocab: Option<&str>) -> Vec<NamedNode> {
        let tokens: Vec<&str> = itemprop.split_ascii_whitespace().collect();
        let mut predicates = Vec::new();

        if tokens.iter().any(|token| SUBPROPERTY_TOKENS.contains(token)) {
            predicates.push(rdf::TYPE.into_owned());
        }

        if let Some(entry) = vocab.and_then(|vocab| self.get(vocab)) {
            for (property, relations) in &entry.properties {
                if tokens.contains(&property.as_str()) {
                    predicates.extend(relations.values().cloned());
                }
            }
        }

        predicates
    }
}

impl VocabEntry {
    /// Expansion IRIs for `property`, keyed by relation name.
    pub fn property(&self, property: &str) -> Option<&IndexMap<String, NamedNode>> {
        self.properties.get(property)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builtin_covers_schema_org_and_hcard() {
        let registry = VocabRegistry::builtin();
        assert_eq!(
            registry.prefixes().collect::<Vec<_>>(),
            [
                "http://schema.org/",
                "https://schema.org/",
                "http://microformats.org/profile/hcard"
            ]
        );
        assert_eq!(
            registry.expansions("additionalType", Some("http://schema.org/")),
            [rdf::TYPE.into_owned()]
        );
    }

    #[test]
    fn subproperty_token_adds_type() {
        let registry = VocabRegistry::new();
        assert_eq!(
            registry.expansions("name subPropertyOf", None),
            [rdf::TYPE.into_owned()]
        );
        assert!(registry.expansions("name", None).is_empty());
    }

    #[test]
    fn both_expansions_are_additive() {
        let registry = VocabRegistry::builtin();
        assert_eq!(
            registry
                .expansions("equivalentProperty additionalType", Some("http://schema.org/"))
                .len(),
            2
        );
    }

    #[test]
    fn loads_json_in_declaration_order() {
        let registry = VocabRegistry::from_json(
            r#"{
                "http://z.example/": {},
                "http://a.example/": {
                    "properties": {
                        "kind": {
                            "subPropertyOf": "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
                            "equivalentProperty": "http://a.example/type"
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            registry.prefixes().collect::<Vec<_>>(),
            ["http://z.example/", "http://a.example/"]
        );
        let expansions = registry.expansions("kind", Some("http://a.example/"));
        assert_eq!(
            expansions.iter().map(NamedNode::as_str).collect::<Vec<_>>(),
            [
                "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
                "http://a.example/type"
            ]
        );
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(
            VocabRegistry::from_json("[1, 2]"),
            Err(Error::RegistryJson(_))
        ));
        assert!(matches!(
            VocabRegistry::from_json(r#"{"http://a/": {"properties": {"p": {"r": "not an iri"}}}}"#),
            Err(Error::IriParseError { .. })
        ));
    }
}
