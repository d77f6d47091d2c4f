//! Streaming conversion of HTML Microdata into RDF quads.
//!
//! The conversion follows the W3C [Microdata to RDF] algorithm: an
//! [`MicrodataProcessor`] consumes tag-open/text/tag-close events and emits
//! quads as soon as they are known. [`MicrodataParser`] wires the processor
//! to an HTML tokenizer so that input can be fed in chunks.
//!
//! [Microdata to RDF]: https://w3c.github.io/microdata-rdf/

use indexmap::IndexMap;

mod blank;
mod dom;
pub mod iri;
mod parser;
mod processor;
mod property;
mod references;
mod registry;
mod scope;
mod tokenizer;

pub use blank::{BlankNodeIssuer, RandomBlankNodes, SequentialBlankNodes};
pub use parser::{
    DocumentMicrodataParser, LowLevelMicrodataParser, MicrodataParser, ReaderMicrodataParser,
};
pub use processor::MicrodataProcessor;
pub use registry::{VocabEntry, VocabRegistry};

/// Attributes of an opened tag, in document order.
pub type Attributes = IndexMap<String, String>;

/// Failure raised by an [`HtmlParseListener`].
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives the HTML events that drive the conversion.
///
/// [`MicrodataProcessor`] implements this trait itself; a user supplied
/// listener (see [`MicrodataParser::with_html_listener`]) observes the same
/// events right after the processor has handled them. Any error aborts the
/// whole conversion.
pub trait HtmlParseListener {
    /// Called when a tag is opened.
    fn on_tag_open(&mut self, name: &str, attributes: &Attributes) -> Result<(), ListenerError>;

    /// Called for character data, after entity decoding.
    ///
    /// This can be called several times for a single run of text.
    fn on_text(&mut self, data: &str) -> Result<(), ListenerError>;

    /// Called when the most recently opened tag is closed.
    fn on_tag_close(&mut self) -> Result<(), ListenerError>;

    /// Called once, after the last event.
    fn on_end(&mut self) -> Result<(), ListenerError>;
}

#[derive(derive_more::Error, derive_more::Display, derive_more::From, Debug)]
pub enum Error {
    #[display("IRI parse error: `{iri}`")]
    IriParseError {
        source: oxiri::IriParseError,
        iri: String,
    },

    #[display("I/O error while reading input")]
    Io(std::io::Error),

    #[display("input is not valid UTF-8 (at byte {position})")]
    InvalidUtf8 { position: u64 },

    #[display("HTML parse listener failed: {_0}")]
    Listener(#[error(not(source))] ListenerError),

    #[display("invalid vocabulary registry")]
    RegistryJson(serde_json::Error),

    #[display("the parser has already finished")]
    Finished,
}
