//! Property values taken from attributes rather than from element text.
//!
//! See <https://w3c.github.io/microdata-rdf/#dfn-property-value>.

use std::str::FromStr;

use oxiri::Iri;
use oxrdf::vocab::xsd;
use oxrdf::{Literal, NamedNodeRef, Term};

use crate::Attributes;
use crate::iri::resolve_relative;

/// How the object of a property is computed from one attribute of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueResolver {
    /// `@content` on any element: a plain literal.
    Content,
    /// An IRI resolved against the base.
    Url {
        tag: &'static str,
        attribute: &'static str,
    },
    /// A numeric literal.
    Number {
        tag: &'static str,
        attribute: &'static str,
    },
    /// `time/@datetime`: a temporal literal.
    Time,
}

/// Checked in order; the first resolver that applies wins.
static RESOLVERS: &[ValueResolver] = &[
    ValueResolver::Content,
    ValueResolver::Url {
        tag: "a",
        attribute: "href",
    },
    ValueResolver::Url {
        tag: "area",
        attribute: "href",
    },
    ValueResolver::Url {
        tag: "audio",
        attribute: "src",
    },
    ValueResolver::Url {
        tag: "embed",
        attribute: "src",
    },
    ValueResolver::Url {
        tag: "iframe",
        attribute: "src",
    },
    ValueResolver::Url {
        tag: "img",
        attribute: "src",
    },
    ValueResolver::Url {
        tag: "link",
        attribute: "href",
    },
    ValueResolver::Url {
        tag: "object",
        attribute: "data",
    },
    ValueResolver::Url {
        tag: "source",
        attribute: "src",
    },
    ValueResolver::Url {
        tag: "track",
        attribute: "src",
    },
    ValueResolver::Url {
        tag: "video",
        attribute: "src",
    },
    ValueResolver::Number {
        tag: "data",
        attribute: "value",
    },
    ValueResolver::Number {
        tag: "meter",
        attribute: "value",
    },
    ValueResolver::Time,
];

impl ValueResolver {
    /// The resolver for a tag, if any applies.
    pub fn find(tag: &str, attributes: &Attributes) -> Option<Self> {
        RESOLVERS
            .iter()
            .copied()
            .find(|resolver| resolver.applies(tag, attributes))
    }

    fn applies(&self, tag: &str, attributes: &Attributes) -> bool {
        match *self {
            ValueResolver::Content => attributes.contains_key("content"),
            ValueResolver::Url {
                tag: expected,
                attribute,
            }
            | ValueResolver::Number {
                tag: expected,
                attribute,
            } => tag == expected && attributes.contains_key(attribute),
            ValueResolver::Time => tag == "time" && attributes.contains_key("datetime"),
        }
    }

    /// Computes the object. [`None`] means the value could not be turned into
    /// a term (an unresolvable URL).
    pub fn object(
        &self,
        attributes: &Attributes,
        base: Option<&Iri<String>>,
        language: Option<&str>,
    ) -> Option<Term> {
        let attr = |name: &str| attributes.get(name).map(String::as_str).unwrap_or_default();

        match *self {
            ValueResolver::Content => Some(plain_literal(attr("content"), language).into()),
            ValueResolver::Url { attribute, .. } => {
                resolve_relative(base, attr(attribute)).map(Term::from)
            }
            ValueResolver::Number { attribute, .. } => {
                let value = attr(attribute);
                Some(maybe_typed_literal(value, number_datatype(value)).into())
            }
            ValueResolver::Time => {
                let value = attr("datetime");
                Some(maybe_typed_literal(value, temporal_datatype(value)).into())
            }
        }
    }
}

/// A literal carrying the item's language, if it has one.
pub(crate) fn plain_literal(value: &str, language: Option<&str>) -> Literal {
    match language {
        Some(language) => Literal::new_language_tagged_literal_unchecked(value, language),
        None => Literal::new_simple_literal(value),
    }
}

fn maybe_typed_literal(value: &str, datatype: Option<NamedNodeRef<'_>>) -> Literal {
    match datatype {
        Some(datatype) => Literal::new_typed_literal(value, datatype),
        None => Literal::new_simple_literal(value),
    }
}

/// `xsd:integer` for integers, `xsd:double` for other numbers.
fn number_datatype(value: &str) -> Option<NamedNodeRef<'static>> {
    if oxsdatatypes::Integer::from_str(value).is_ok() {
        Some(xsd::INTEGER)
    } else if oxsdatatypes::Double::from_str(value).is_ok() {
        Some(xsd::DOUBLE)
    } else {
        None
    }
}

/// The first of duration, dateTime, date, time, gYearMonth and gYear that
/// `value` is a lexical form of.
fn temporal_datatype(value: &str) -> Option<NamedNodeRef<'static>> {
    if oxsdatatypes::Duration::from_str(value).is_ok() {
        Some(xsd::DURATION)
    } else if oxsdatatypes::DateTime::from_str(value).is_ok() {
        Some(xsd::DATE_TIME)
    } else if oxsdatatypes::Date::from_str(value).is_ok() {
        Some(xsd::DATE)
    } else if oxsdatatypes::Time::from_str(value).is_ok() {
        Some(xsd::TIME)
    } else if oxsdatatypes::GYearMonth::from_str(value).is_ok() {
        Some(xsd::G_YEAR_MONTH)
    } else if oxsdatatypes::GYear::from_str(value).is_ok() {
        Some(xsd::G_YEAR)
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    fn attributes(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> Iri<String> {
        Iri::parse("http://example.org/doc".to_string()).unwrap()
    }

    #[test]
    fn content_wins_over_tag_rules() {
        let attrs = attributes(&[("href", "x"), ("content", "c")]);
        assert_eq!(ValueResolver::find("a", &attrs), Some(ValueResolver::Content));

        let object = ValueResolver::Content.object(&attrs, None, Some("en"));
        assert_eq!(
            object,
            Some(Literal::new_language_tagged_literal_unchecked("c", "en").into())
        );
    }

    #[test]
    fn needs_the_triggering_attribute() {
        assert_eq!(ValueResolver::find("a", &attributes(&[("src", "x")])), None);
        assert_eq!(ValueResolver::find("img", &attributes(&[("href", "x")])), None);
        assert_eq!(ValueResolver::find("span", &attributes(&[])), None);
    }

    #[test]
    fn urls_are_resolved_against_base() {
        let attrs = attributes(&[("src", "img.png")]);
        let resolver = ValueResolver::find("img", &attrs).unwrap();
        assert_eq!(
            resolver.object(&attrs, Some(&base()), None),
            Some(oxrdf::NamedNode::new_unchecked("http://example.org/img.png").into())
        );
        assert_eq!(resolver.object(&attrs, None, None), None);
    }

    #[rstest]
    #[case("42", Some(xsd::INTEGER))]
    #[case("-7", Some(xsd::INTEGER))]
    #[case("4.5", Some(xsd::DOUBLE))]
    #[case("1e3", Some(xsd::DOUBLE))]
    #[case(" 42", None)]
    #[case("many", None)]
    fn number_types(#[case] value: &str, #[case] expected: Option<NamedNodeRef<'static>>) {
        assert_eq!(number_datatype(value), expected);
    }

    #[rstest]
    #[case("P0Y", Some(xsd::DURATION))]
    #[case("PT2H30M", Some(xsd::DURATION))]
    #[case("2012-03-18T09:30:00Z", Some(xsd::DATE_TIME))]
    #[case("2012-03-18", Some(xsd::DATE))]
    #[case("09:30:00", Some(xsd::TIME))]
    #[case("2012-03", Some(xsd::G_YEAR_MONTH))]
    #[case("2012-03-18T09:30:00.5Z", Some(xsd::DATE_TIME))]
    #[case("2012", Some(xsd::G_YEAR))]
    #[case("12", None)]
    #[case("garbage", None)]
    fn temporal_types(#[case] value: &str, #[case] expected: Option<NamedNodeRef<'static>>) {
        assert_eq!(temporal_datatype(value), expected);
    }

    #[test]
    fn untyped_time_keeps_raw_text() {
        let attrs = attributes(&[("datetime", "garbage")]);
        assert_eq!(
            ValueResolver::Time.object(&attrs, None, Some("en")),
            Some(Literal::new_simple_literal("garbage").into())
        );
    }
}
