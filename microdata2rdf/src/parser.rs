use std::io::{ErrorKind, Read};
use std::str::Utf8Error;

use oxiri::Iri;
use oxrdf::{GraphName, Quad};

use crate::processor::MicrodataProcessor;
use crate::tokenizer::HtmlTokenizer;
use crate::{
    Attributes, BlankNodeIssuer, Error, HtmlParseListener, ListenerError, RandomBlankNodes,
    VocabRegistry, dom,
};

const CHUNK_SIZE: usize = 8 * 1024;

/// A Microdata to RDF converter.
///
/// ```
/// use microdata2rdf::MicrodataParser;
///
/// let html = br#"<div itemscope itemtype="http://schema.org/Person">
///     <span itemprop="name">Jane</span>
/// </div>"#;
///
/// let quads = MicrodataParser::new()
///     .with_base_iri("http://example.com/")?
///     .for_slice(html)
///     .collect::<Result<Vec<_>, _>>()?;
/// assert_eq!(quads.len(), 2);
/// # Result::<_, microdata2rdf::Error>::Ok(())
/// ```
pub struct MicrodataParser {
    base: Option<Iri<String>>,
    graph: GraphName,
    registry: Option<VocabRegistry>,
    strict: bool,
    listener: Option<Box<dyn HtmlParseListener>>,
    issuer: Option<Box<dyn BlankNodeIssuer>>,
}

impl MicrodataParser {
    pub fn new() -> Self {
        Self {
            base: None,
            graph: GraphName::DefaultGraph,
            registry: None,
            strict: false,
            listener: None,
            issuer: None,
        }
    }

    /// Relative IRIs in the document are resolved against `base_iri`.
    pub fn with_base_iri(mut self, base_iri: impl Into<String>) -> Result<Self, Error> {
        let iri = base_iri.into();
        let base = Iri::parse(iri.clone()).map_err(|source| Error::IriParseError { source, iri })?;
        self.base = Some(base);
        Ok(self)
    }

    /// The graph every quad is placed in. Defaults to the default graph.
    pub fn with_default_graph(mut self, graph: impl Into<GraphName>) -> Self {
        self.graph = graph.into();
        self
    }

    /// Defaults to [`VocabRegistry::builtin`].
    pub fn with_vocab_registry(mut self, registry: VocabRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Treats the input as well-formed markup: elements are only closed by
    /// their end tag or self-closing syntax.
    pub fn strict_markup(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Observes the HTML events after they have been converted. An error from
    /// the listener stops the conversion.
    pub fn with_html_listener(mut self, listener: impl HtmlParseListener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Defaults to [`RandomBlankNodes`].
    pub fn with_blank_node_issuer(mut self, issuer: impl BlankNodeIssuer + 'static) -> Self {
        self.issuer = Some(Box::new(issuer));
        self
    }

    /// The bare conversion engine, to be driven by some other event source.
    ///
    /// Any configured HTML listener is dropped.
    pub fn into_processor(self) -> MicrodataProcessor {
        self.into_target().processor
    }

    /// A parser that is fed string chunks by hand.
    pub fn low_level(self) -> LowLevelMicrodataParser {
        let strict = self.strict;
        LowLevelMicrodataParser {
            tokenizer: HtmlTokenizer::new(self.into_target(), strict),
            ended: false,
        }
    }

    /// Reads UTF-8 encoded HTML from `reader`.
    pub fn for_reader<R: Read>(self, reader: R) -> ReaderMicrodataParser<R> {
        ReaderMicrodataParser {
            reader,
            parser: self.low_level(),
            buffer: Vec::new(),
            position: 0,
            error: None,
            done: false,
        }
    }

    pub fn for_slice(self, slice: &[u8]) -> ReaderMicrodataParser<&[u8]> {
        self.for_reader(slice)
    }

    /// Converts a document that was already parsed by `scraper`.
    ///
    /// Unlike the streaming parsers, this sees the tree built by the full
    /// HTML5 parsing algorithm.
    pub fn for_document(self, html: &scraper::Html) -> DocumentMicrodataParser {
        let mut target = self.into_target();
        let error = dom::walk(html, &mut target).err().map(Error::Listener);

        DocumentMicrodataParser {
            quads: target.processor.drain_quads().collect::<Vec<_>>().into_iter(),
            error,
        }
    }

    fn into_target(self) -> EventTarget {
        let issuer = self
            .issuer
            .unwrap_or_else(|| Box::new(RandomBlankNodes));
        let registry = self.registry.unwrap_or_else(VocabRegistry::builtin);

        EventTarget {
            processor: MicrodataProcessor::new(self.base, self.graph, registry, issuer),
            listener: self.listener,
        }
    }
}

impl Default for MicrodataParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands every event to the processor and then to the user's listener.
struct EventTarget {
    processor: MicrodataProcessor,
    listener: Option<Box<dyn HtmlParseListener>>,
}

impl HtmlParseListener for EventTarget {
    fn on_tag_open(&mut self, name: &str, attributes: &Attributes) -> Result<(), ListenerError> {
        self.processor.on_tag_open(name, attributes)?;
        match &mut self.listener {
            Some(listener) => listener.on_tag_open(name, attributes),
            None => Ok(()),
        }
    }

    fn on_text(&mut self, data: &str) -> Result<(), ListenerError> {
        self.processor.on_text(data)?;
        match &mut self.listener {
            Some(listener) => listener.on_text(data),
            None => Ok(()),
        }
    }

    fn on_tag_close(&mut self) -> Result<(), ListenerError> {
        self.processor.on_tag_close()?;
        match &mut self.listener {
            Some(listener) => listener.on_tag_close(),
            None => Ok(()),
        }
    }

    fn on_end(&mut self) -> Result<(), ListenerError> {
        self.processor.on_end()?;
        match &mut self.listener {
            Some(listener) => listener.on_end(),
            None => Ok(()),
        }
    }
}

/// Push-based parsing.
///
/// ```
/// use microdata2rdf::MicrodataParser;
///
/// let mut parser = MicrodataParser::new().low_level();
/// parser.extend_from_str(r#"<p itemscope itemtype="http://schema.org/Thing"#)?;
/// assert!(parser.read_next().is_none());
/// parser.extend_from_str(r#"">"#)?;
/// assert!(parser.read_next().is_some());
/// parser.end()?;
/// assert!(parser.is_end());
/// # Result::<_, microdata2rdf::Error>::Ok(())
/// ```
pub struct LowLevelMicrodataParser {
    tokenizer: HtmlTokenizer<EventTarget>,
    ended: bool,
}

impl LowLevelMicrodataParser {
    /// Adds more input. Quads that became known are available from
    /// [`Self::read_next`].
    pub fn extend_from_str(&mut self, chunk: &str) -> Result<(), Error> {
        if self.ended {
            return Err(Error::Finished);
        }

        self.tokenizer.feed(chunk);
        self.check()
    }

    /// Signals the end of input, closing any element still open.
    pub fn end(&mut self) -> Result<(), Error> {
        if self.ended {
            return Err(Error::Finished);
        }

        self.ended = true;
        self.tokenizer.end();
        self.check()
    }

    pub fn read_next(&mut self) -> Option<Quad> {
        self.tokenizer.with_listener(|target| target.processor.pop_quad())
    }

    /// Whether input has ended and all quads have been read.
    pub fn is_end(&self) -> bool {
        self.ended && self.tokenizer.with_listener(|target| target.processor.is_end())
    }

    fn check(&self) -> Result<(), Error> {
        match self.tokenizer.take_failure() {
            Some(failure) => Err(Error::Listener(failure)),
            None => Ok(()),
        }
    }
}

/// Parses HTML read from a [`Read`] implementation.
///
/// Quads produced before a failure are still returned, followed by the error.
pub struct ReaderMicrodataParser<R: Read> {
    reader: R,
    parser: LowLevelMicrodataParser,
    /// Bytes read but not yet handed to the parser: an incomplete UTF-8
    /// sequence at the end of the last chunk.
    buffer: Vec<u8>,
    /// Number of bytes handed to the parser so far.
    position: u64,
    error: Option<Error>,
    done: bool,
}

impl<R: Read> ReaderMicrodataParser<R> {
    fn step(&mut self) -> Result<(), Error> {
        let start = self.buffer.len();
        self.buffer.resize(start + CHUNK_SIZE, 0);

        let read = loop {
            match self.reader.read(&mut self.buffer[start..]) {
                Ok(read) => break read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(e.into());
                }
            }
        };
        self.buffer.truncate(start + read);

        if read == 0 {
            self.done = true;
            if !self.buffer.is_empty() {
                return Err(Error::InvalidUtf8 {
                    position: self.position,
                });
            }
            return self.parser.end();
        }

        let text = decoded_prefix(&self.buffer).map_err(|e| Error::InvalidUtf8 {
            position: self.position + e.valid_up_to() as u64,
        })?;
        let consumed = text.len();
        self.parser.extend_from_str(text)?;

        self.buffer.drain(..consumed);
        self.position += consumed as u64;
        Ok(())
    }
}

impl<R: Read> Iterator for ReaderMicrodataParser<R> {
    type Item = Result<Quad, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(quad) = self.parser.read_next() {
                return Some(Ok(quad));
            }

            if let Some(error) = self.error.take() {
                return Some(Err(error));
            }

            if self.done {
                return None;
            }

            if let Err(e) = self.step() {
                self.done = true;
                self.error = Some(e);
            }
        }
    }
}

/// The longest valid UTF-8 prefix of `bytes`, which may end in the middle of
/// a multi-byte sequence.
fn decoded_prefix(bytes: &[u8]) -> Result<&str, Utf8Error> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&bytes[..e.valid_up_to()]),
        Err(e) => Err(e),
    }
}

/// Quads converted from a `scraper` document. Yields the error last, if the
/// HTML listener failed.
pub struct DocumentMicrodataParser {
    quads: std::vec::IntoIter<Quad>,
    error: Option<Error>,
}

impl Iterator for DocumentMicrodataParser {
    type Item = Result<Quad, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.quads.next() {
            Some(quad) => Some(Ok(quad)),
            None => self.error.take().map(Err),
        }
    }
}
