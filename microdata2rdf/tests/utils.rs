use itertools::Itertools;
use microdata2rdf::MicrodataParser;
use oxrdf::{Graph, Quad, Triple};

pub const BASE: &str = "http://example.org/";

pub fn parser() -> MicrodataParser {
    MicrodataParser::new().with_base_iri(BASE).unwrap()
}

pub fn quads(parser: MicrodataParser, html: &str) -> Vec<Quad> {
    parser
        .for_slice(html.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

pub fn to_graph(quads: impl IntoIterator<Item = Quad>) -> Graph {
    let mut graph = Graph::new();
    for quad in quads {
        graph.insert(&Triple::new(quad.subject, quad.predicate, quad.object));
    }
    graph
}

#[allow(unused)]
pub fn convert(html: &str) -> Graph {
    to_graph(quads(parser(), html))
}

/// One sorted N-Triples line per triple, with canonical blank node labels.
pub fn serialize_graph(graph: &Graph) -> String {
    // NB: we use rdf_canon here because the one provided by oxrdf hangs
    let idents = rdf_canon::issue_graph_with::<sha2::Sha256>(graph, &Default::default()).unwrap();
    let graph = rdf_canon::relabel_graph(graph, &idents).unwrap();

    graph.iter().map(|t| format!("{t} .")).sorted().join("\n")
}

#[allow(unused)]
pub fn assert_graph(html: &str, ttl: &str) {
    let mut expected = Graph::new();
    for triple in oxttl::TurtleParser::new()
        .with_base_iri(BASE)
        .unwrap()
        .for_slice(ttl.as_bytes())
    {
        expected.insert(&triple.unwrap());
    }

    pretty_assertions::assert_eq!(serialize_graph(&convert(html)), serialize_graph(&expected));
}
