//! IRI helpers: absolute-IRI detection, base resolution and vocabulary
//! derivation.

use oxiri::Iri;
use oxrdf::NamedNode;

use crate::registry::VocabRegistry;

/// Checks that `value` has the shape `scheme:rest`.
///
/// The scheme is a letter followed by letters, digits, `+`, `-` or `.`, or the
/// single character `_`. The rest must not contain whitespace or any of
/// ``"<>[\]^`{|}``. This is a cheap syntactic test; it does not validate the
/// full RFC 3987 grammar.
pub fn is_valid_absolute_iri(value: &str) -> bool {
    let Some((scheme, rest)) = value.split_once(':') else {
        return false;
    };

    let valid_scheme = scheme == "_"
        || (scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')));

    valid_scheme
        && !rest.chars().any(|c| {
            matches!(
                c,
                ' ' | '"' | '<' | '>' | '[' | '\\' | ']' | '^' | '`' | '{' | '|' | '}'
            )
        })
}

/// Resolves `reference` against `base`.
///
/// Without a base only absolute references can be resolved. Malformed input
/// yields [`None`]; nothing is guessed.
pub fn resolve_relative(base: Option<&Iri<String>>, reference: &str) -> Option<NamedNode> {
    let resolved = match base {
        Some(base) => base.resolve(reference),
        None => Iri::parse(reference.to_string()),
    };

    match resolved {
        Ok(iri) => Some(NamedNode::new_unchecked(iri.into_inner())),
        Err(err) => {
            tracing::trace!("- cannot resolve <{reference}>: {err}");
            None
        }
    }
}

/// Determines the vocabulary for an item from its first type.
///
/// The first registry prefix (in declaration order) that `type_iri` starts
/// with wins; a `#` is appended unless the prefix ends in `/`. Otherwise the
/// vocabulary is everything up to and including the first `#`, or, when
/// there is no fragment, the type IRI without its last path segment.
pub fn derive_vocab(type_iri: &str, registry: &VocabRegistry) -> String {
    if let Some(prefix) = registry.prefixes().find(|prefix| type_iri.starts_with(prefix)) {
        let mut vocab = prefix.to_string();
        if !vocab.ends_with('/') {
            vocab.push('#');
        }
        return vocab;
    }

    match type_iri.find('#') {
        Some(hash) if hash > 0 => type_iri[..=hash].to_string(),
        _ => Iri::parse(type_iri)
            .and_then(|iri| iri.resolve("."))
            .map(Iri::into_inner)
            .unwrap_or_else(|_| type_iri.to_string()),
    }
}

/// Turns an `itemid` into a subject IRI, resolving it against the base if
/// it is not absolute.
pub(crate) fn create_subject(base: Option<&Iri<String>>, itemid: &str) -> Option<NamedNode> {
    if is_valid_absolute_iri(itemid) {
        NamedNode::new(itemid).ok()
    } else {
        resolve_relative(base, itemid)
    }
}

/// Expands the whitespace-separated tokens of an `itemtype`, `itemprop` or
/// `itemprop-reverse` value.
///
/// Absolute tokens are used as-is. When `allow_relative` is set other tokens
/// are appended to the vocabulary, or to `{base}#` when no vocabulary is
/// active. Tokens that do not end up as valid IRIs are dropped.
pub(crate) fn vocab_iris(
    terms: &str,
    vocab: Option<&str>,
    base: Option<&Iri<String>>,
    allow_relative: bool,
) -> Vec<NamedNode> {
    terms
        .split_ascii_whitespace()
        .filter_map(|term| {
            if is_valid_absolute_iri(term) {
                return NamedNode::new(term).ok();
            }

            if !allow_relative {
                tracing::trace!("- ignoring non-absolute type: {term}");
                return None;
            }

            let iri = match vocab {
                Some(vocab) => format!("{vocab}{term}"),
                None => format!("{}#{term}", base.map(Iri::as_str).unwrap_or_default()),
            };
            NamedNode::new(iri).ok()
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn base() -> Iri<String> {
        Iri::parse("http://example.org/".to_string()).unwrap()
    }

    #[test]
    fn plain_string_is_not_an_iri() {
        assert!(!is_valid_absolute_iri("string"));
    }

    #[test]
    fn prefixed_name_is_an_iri() {
        assert!(is_valid_absolute_iri("ex:abc"));
        assert!(is_valid_absolute_iri("_:b0"));
        assert!(is_valid_absolute_iri("http://example.org/"));
    }

    #[test]
    fn rejects_forbidden_characters() {
        assert!(!is_valid_absolute_iri("http://example.org/a b"));
        assert!(!is_valid_absolute_iri("http://example.org/<a>"));
        assert!(!is_valid_absolute_iri("http://example.org/a^b"));
        assert!(!is_valid_absolute_iri("1http://example.org/"));
    }

    #[test]
    fn resolves_against_base() {
        let base = base();
        assert_eq!(
            resolve_relative(Some(&base), "a/b").unwrap().as_str(),
            "http://example.org/a/b"
        );
        assert_eq!(resolve_relative(None, "a/b"), None);
        assert_eq!(
            resolve_relative(None, "http://other.org/x").unwrap().as_str(),
            "http://other.org/x"
        );
    }

    #[test]
    fn derive_vocab_keeps_fragment_for_empty_registry() {
        let registry = VocabRegistry::new();
        assert_eq!(
            derive_vocab("http://ex.org/a/b/c#xyz", &registry),
            "http://ex.org/a/b/c#"
        );
    }

    #[test]
    fn derive_vocab_removes_last_path_segment() {
        let registry = VocabRegistry::new();
        assert_eq!(
            derive_vocab("http://ex.org/a/b/c", &registry),
            "http://ex.org/a/b/"
        );
        assert_eq!(
            derive_vocab("http://ex.org/a/b/c/", &registry),
            "http://ex.org/a/b/c/"
        );
    }

    #[test]
    fn derive_vocab_reuses_prefix_ending_in_slash() {
        let mut registry = VocabRegistry::new();
        registry.insert_prefix("http://ex.org/");
        assert_eq!(
            derive_vocab("http://ex.org/a/b/c#xyz", &registry),
            "http://ex.org/"
        );
    }

    #[test]
    fn derive_vocab_appends_fragment_to_other_prefixes() {
        let mut registry = VocabRegistry::new();
        registry.insert_prefix("http://ex.org/value");
        assert_eq!(
            derive_vocab("http://ex.org/value/b/c#xyz", &registry),
            "http://ex.org/value#"
        );
    }

    #[test]
    fn derive_vocab_first_prefix_wins() {
        let mut registry = VocabRegistry::new();
        registry.insert_prefix("http://ex.org/");
        registry.insert_prefix("http://ex.org/value/");
        assert_eq!(
            derive_vocab("http://ex.org/value/b", &registry),
            "http://ex.org/"
        );
    }

    #[test]
    fn relative_tokens_use_vocab_or_base() {
        let base = base();
        let iris = vocab_iris("name http://x.org/p", Some("http://schema.org/"), None, true);
        assert_eq!(
            iris.iter().map(NamedNode::as_str).collect::<Vec<_>>(),
            ["http://schema.org/name", "http://x.org/p"]
        );

        let iris = vocab_iris("name", None, Some(&base), true);
        assert_eq!(iris[0].as_str(), "http://example.org/#name");

        assert!(vocab_iris("name", None, None, true).is_empty());
        assert!(vocab_iris("Thing", Some("http://schema.org/"), None, false).is_empty());
    }

    #[test]
    fn relative_itemid_needs_a_base() {
        let base = base();
        assert_eq!(
            create_subject(Some(&base), "#me").unwrap().as_str(),
            "http://example.org/#me"
        );
        assert_eq!(create_subject(None, "#me"), None);
    }
}
