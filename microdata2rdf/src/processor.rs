use std::collections::VecDeque;
use std::str::FromStr;

use icu::locale::LanguageIdentifier;
use itertools::Itertools;
use oxiri::Iri;
use oxrdf::vocab::rdf;
use oxrdf::{GraphName, NamedNode, NamedOrBlankNode, Quad, Subject, Term};

use crate::iri::{create_subject, derive_vocab, vocab_iris};
use crate::property::{ValueResolver, plain_literal};
use crate::references::{BufferedTagEvent, IdQueue, ReferenceResolver};
use crate::registry::VocabRegistry;
use crate::scope::{Direction, ItemScope, PendingPredicates, ScopeRef};
use crate::{Attributes, BlankNodeIssuer, HtmlParseListener, ListenerError};

/// The Microdata to RDF conversion state machine.
///
/// Feed it tag-open, text and tag-close events (it implements
/// [`HtmlParseListener`]) and collect the resulting quads with
/// [`Self::pop_quad`]. Quads are available as soon as they can be
/// determined: item types when the tag opens, text values when it closes and
/// `itemref` contributions as soon as both ends of the reference are known.
pub struct MicrodataProcessor {
    emitter: Emitter,
    live: Session,
    references: ReferenceResolver,
    rebased: bool,
    ended: bool,
}

/// Everything needed to build and queue quads. Shared by the live session
/// and every replay session.
struct Emitter {
    base: Option<Iri<String>>,
    graph: GraphName,
    registry: VocabRegistry,
    issuer: Box<dyn BlankNodeIssuer>,
    quads: VecDeque<Quad>,
}

/// One entry per open element.
#[derive(Default)]
struct Frame {
    /// The item created by this element, if it has `@itemscope`.
    scope: Option<ScopeRef>,
    /// Collected text, when a property of this element is waiting for it.
    text: Option<String>,
    /// Predicates of this element that take the text as their value.
    pending: Option<PendingPredicates>,
    /// The element's language, inherited from its ancestors.
    language: Option<String>,
}

/// A stack of open elements.
///
/// The document itself is processed by the live session. Replaying an
/// `itemref` runs the recorded events through a separate session rooted at
/// the referencing item.
struct Session {
    frames: Vec<Frame>,
    /// Subjects to reuse, when this session is a replay.
    replay: Option<IdQueue>,
}

impl MicrodataProcessor {
    pub(crate) fn new(
        base: Option<Iri<String>>,
        graph: GraphName,
        registry: VocabRegistry,
        issuer: Box<dyn BlankNodeIssuer>,
    ) -> Self {
        Self {
            emitter: Emitter {
                base,
                graph,
                registry,
                issuer,
                quads: VecDeque::new(),
            },
            live: Session::live(),
            references: ReferenceResolver::default(),
            rebased: false,
            ended: false,
        }
    }

    /// The next quad produced so far, in emission order.
    pub fn pop_quad(&mut self) -> Option<Quad> {
        self.emitter.quads.pop_front()
    }

    /// All quads produced so far.
    pub fn drain_quads(&mut self) -> impl Iterator<Item = Quad> + '_ {
        self.emitter.quads.drain(..)
    }

    /// Whether the end event was seen and every quad has been taken.
    pub fn is_end(&self) -> bool {
        self.ended && self.emitter.quads.is_empty()
    }

    pub fn tag_open(&mut self, name: &str, attributes: &Attributes) {
        if tracing::enabled!(tracing::Level::TRACE) {
            let attrs = attributes
                .iter()
                .map(|(n, v)| format!("@{n}='{v}'"))
                .join(" ");
            tracing::trace!("<{name}> {attrs} (depth {})", self.live.frames.len() + 1);
        }

        self.references.collect_open(name, attributes);

        // only the first <base> counts
        if name == "base" && !self.rebased {
            if let Some(href) = attributes.get("href") {
                self.rebased = true;
                self.emitter.rebase(href);
            }
        }

        let created = self.live.open_element(&mut self.emitter, attributes);
        if let Some(scope) = &created {
            self.references.record_subject(&scope.borrow().subject);

            if let Some(itemref) = attributes.get("itemref") {
                for reference in itemref.split_ascii_whitespace() {
                    self.references.add_domain(reference, scope.clone());
                    self.resolve_reference(reference, Some(scope));
                }
            }
        }

        self.live
            .element_properties(&mut self.emitter, name, attributes, created.as_ref());
    }

    pub fn text(&mut self, data: &str) {
        self.references.collect_text(data);
        self.live.text(data);
    }

    pub fn tag_close(&mut self) {
        tracing::trace!("</> (depth {})", self.live.frames.len());

        for reference in self.references.collect_close() {
            self.resolve_reference(&reference, None);
        }

        self.live.close_element(&mut self.emitter);
    }

    pub fn end(&mut self) {
        tracing::trace!("end of document");
        self.ended = true;
    }

    /// Replays the range for `reference` against the waiting items, if it is
    /// complete.
    fn resolve_reference(&mut self, reference: &str, only: Option<&ScopeRef>) {
        let Some((range, domains)) = self.references.take_ready(reference, only) else {
            return;
        };

        for domain in domains {
            tracing::debug!(
                "- replaying #{reference} onto {}",
                domain.borrow().subject
            );

            let mut session = Session::replaying(&domain, IdQueue::new(range.ids.clone()));
            for event in &range.events {
                match event {
                    BufferedTagEvent::Open { name, attributes } => {
                        let created = session.open_element(&mut self.emitter, attributes);
                        session.element_properties(
                            &mut self.emitter,
                            name,
                            attributes,
                            created.as_ref(),
                        );
                    }
                    BufferedTagEvent::Text(data) => session.text(data),
                    BufferedTagEvent::Close => session.close_element(&mut self.emitter),
                }
            }
        }
    }
}

impl HtmlParseListener for MicrodataProcessor {
    fn on_tag_open(&mut self, name: &str, attributes: &Attributes) -> Result<(), ListenerError> {
        self.tag_open(name, attributes);
        Ok(())
    }

    fn on_text(&mut self, data: &str) -> Result<(), ListenerError> {
        self.text(data);
        Ok(())
    }

    fn on_tag_close(&mut self) -> Result<(), ListenerError> {
        self.tag_close();
        Ok(())
    }

    fn on_end(&mut self) -> Result<(), ListenerError> {
        self.end();
        Ok(())
    }
}

impl Session {
    fn live() -> Self {
        Self {
            frames: Vec::new(),
            replay: None,
        }
    }

    fn replaying(domain: &ScopeRef, ids: IdQueue) -> Self {
        let language = domain.borrow().language.clone();
        Self {
            frames: vec![Frame {
                scope: Some(domain.clone()),
                text: None,
                pending: None,
                language,
            }],
            replay: Some(ids),
        }
    }

    /// The nearest item, starting at the top of the stack or, for `parent`,
    /// one element below it.
    fn scope(&self, parent: bool) -> Option<ScopeRef> {
        let end = self.frames.len().checked_sub(usize::from(parent))?;
        self.frames[..end]
            .iter()
            .rev()
            .find_map(|frame| frame.scope.clone())
    }

    /// Pushes a frame for the element and returns the item it created, if any.
    fn open_element(
        &mut self,
        emitter: &mut Emitter,
        attributes: &Attributes,
    ) -> Option<ScopeRef> {
        let inherited_language = self.frames.last().and_then(|f| f.language.clone());
        let own_language = language_attribute(attributes).map(parse_language);

        let (current, created) = if attributes.contains_key("itemscope") {
            let mut item = ItemScope::new(self.mint_subject(emitter, attributes));
            // the subject was already described when the range was recorded
            item.block_emission = self.replay.is_some();
            item.language = inherited_language.clone();
            if let Some(parent) = self.scope(false) {
                item.vocab = parent.borrow().vocab.clone();
            }
            tracing::trace!("- new item: {}", item.subject);

            let item = item.into_ref();
            (Some(item.clone()), Some(item))
        } else {
            (self.scope(false), None)
        };

        self.frames.push(Frame {
            scope: created.clone(),
            text: None,
            pending: None,
            language: own_language.clone().unwrap_or(inherited_language),
        });

        if let Some(scope) = &current {
            if let Some(itemtype) = attributes.get("itemtype") {
                add_types(emitter, scope, itemtype);
            }

            if let Some(language) = own_language {
                scope.borrow_mut().language = language;
            }
        }

        created
    }

    fn mint_subject(&mut self, emitter: &mut Emitter, attributes: &Attributes) -> NamedOrBlankNode {
        if let Some(id) = self.replay.as_mut().and_then(IdQueue::next_id) {
            return id;
        }

        attributes
            .get("itemid")
            .and_then(|itemid| create_subject(emitter.base.as_ref(), itemid))
            .map(NamedOrBlankNode::from)
            .unwrap_or_else(|| emitter.issuer.issue().into())
    }

    fn element_properties(
        &mut self,
        emitter: &mut Emitter,
        name: &str,
        attributes: &Attributes,
        created: Option<&ScopeRef>,
    ) {
        if let Some(itemprop) = attributes.get("itemprop") {
            self.item_properties(
                emitter,
                itemprop,
                Direction::Forward,
                name,
                attributes,
                created,
            );
        }

        // https://w3c.github.io/microdata-rdf/#reverse-itemprop
        if let Some(itemprop) = attributes.get("itemprop-reverse") {
            self.item_properties(
                emitter,
                itemprop,
                Direction::Reverse,
                name,
                attributes,
                created,
            );
        }
    }

    /// Properties belong to the item enclosing the element, so resolution
    /// starts one level below the top of the stack.
    fn item_properties(
        &mut self,
        emitter: &mut Emitter,
        itemprop: &str,
        direction: Direction,
        name: &str,
        attributes: &Attributes,
        created: Option<&ScopeRef>,
    ) {
        let Some(parent) = self.scope(true) else {
            return;
        };

        let (predicates, language) = {
            let parent = parent.borrow();
            let vocab = parent.vocab.as_deref();
            let mut predicates = vocab_iris(itemprop, vocab, emitter.base.as_ref(), true);
            predicates.extend(emitter.registry.expansions(itemprop, vocab));
            (predicates, parent.language.clone())
        };

        // a nested item wins over any attribute value
        if let Some(item) = created {
            let object = node_term(&item.borrow().subject);
            emitter.emit_properties(&parent.borrow(), &predicates, object, direction);
            return;
        }

        if let Some(resolver) = ValueResolver::find(name, attributes) {
            match resolver.object(attributes, emitter.base.as_ref(), language.as_deref()) {
                Some(object) => {
                    emitter.emit_properties(&parent.borrow(), &predicates, object, direction)
                }
                None => tracing::trace!("- no value for {resolver:?}"),
            }
            return;
        }

        if let Some(frame) = self.frames.last_mut() {
            frame
                .pending
                .get_or_insert_with(PendingPredicates::default)
                .set(direction, predicates);
            frame.text.get_or_insert_with(String::new);
        }
    }

    fn text(&mut self, data: &str) {
        for text in self.frames.iter_mut().filter_map(|f| f.text.as_mut()) {
            text.push_str(data);
        }
    }

    fn close_element(&mut self, emitter: &mut Emitter) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let (Some(pending), Some(parent)) = (frame.pending, self.scope(false)) else {
            return;
        };

        let item = parent.borrow();
        let text = frame.text.as_deref().unwrap_or_default();
        let object: Term = plain_literal(text, item.language.as_deref()).into();
        for (direction, predicates) in pending.drain() {
            emitter.emit_properties(&item, &predicates, object.clone(), direction);
        }
    }
}

impl Emitter {
    fn rebase(&mut self, href: &str) {
        let base = match &self.base {
            Some(base) => base.resolve(href),
            None => Iri::parse(href.to_string()),
        };

        match base {
            Ok(base) => {
                tracing::debug!("<base> found: {base}");
                self.base = Some(base);
            }
            Err(e) => tracing::warn!("Ignoring <base href=\"{href}\">: {e}"),
        }
    }

    fn emit(&mut self, subject: Subject, predicate: NamedNode, object: Term) {
        let quad = Quad::new(subject, predicate, object, self.graph.clone());
        tracing::debug!("- emitting: {quad}");
        self.quads.push_back(quad);
    }

    fn emit_properties(
        &mut self,
        item: &ItemScope,
        predicates: &[NamedNode],
        object: Term,
        direction: Direction,
    ) {
        if item.block_emission {
            return;
        }

        for predicate in predicates {
            match direction {
                Direction::Forward => {
                    self.emit(node_subject(&item.subject), predicate.clone(), object.clone())
                }
                Direction::Reverse => match &object {
                    Term::NamedNode(node) => {
                        self.emit(node.clone().into(), predicate.clone(), node_term(&item.subject))
                    }
                    Term::BlankNode(node) => {
                        self.emit(node.clone().into(), predicate.clone(), node_term(&item.subject))
                    }
                    // literals cannot be subjects
                    _ => {}
                },
            }
        }
    }
}

fn add_types(emitter: &mut Emitter, scope: &ScopeRef, itemtype: &str) {
    let mut item = scope.borrow_mut();
    let types = vocab_iris(itemtype, None, emitter.base.as_ref(), false);
    for ty in types.into_iter().unique() {
        // the first valid type determines the vocabulary
        if item.vocab.is_none() {
            let vocab = derive_vocab(ty.as_str(), &emitter.registry);
            tracing::trace!("- vocabulary is now: {vocab}");
            item.vocab = Some(vocab);
        }

        if !item.block_emission {
            let subject = node_subject(&item.subject);
            emitter.emit(subject, rdf::TYPE.into_owned(), ty.into());
        }
    }
}

/// `@xml:lang` takes precedence over `@lang`.
fn language_attribute(attributes: &Attributes) -> Option<&str> {
    attributes
        .get("xml:lang")
        .or_else(|| attributes.get("lang"))
        .map(String::as_str)
}

/// An empty value clears the language, as does an invalid one.
fn parse_language(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }

    match LanguageIdentifier::from_str(value) {
        Ok(language) => Some(language.to_string().to_ascii_lowercase()),
        Err(e) => {
            tracing::warn!("Invalid language identifier ({value}): {e}");
            None
        }
    }
}

fn node_subject(node: &NamedOrBlankNode) -> Subject {
    match node {
        NamedOrBlankNode::NamedNode(node) => node.clone().into(),
        NamedOrBlankNode::BlankNode(node) => node.clone().into(),
    }
}

fn node_term(node: &NamedOrBlankNode) -> Term {
    match node {
        NamedOrBlankNode::NamedNode(node) => node.clone().into(),
        NamedOrBlankNode::BlankNode(node) => node.clone().into(),
    }
}
