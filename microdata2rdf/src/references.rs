//! Bookkeeping for `itemref`.
//!
//! Every element with an `id` has its event subtree recorded. Items that
//! reference the `id` (the *domain*) get the recorded events (the *range*)
//! replayed against them once both sides are known, whichever comes first
//! in the document.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use oxrdf::NamedOrBlankNode;

use crate::Attributes;
use crate::scope::ScopeRef;

#[derive(Debug, Clone)]
pub(crate) enum BufferedTagEvent {
    Open { name: String, attributes: Attributes },
    Text(String),
    Close,
}

/// A fully recorded subtree.
#[derive(Debug)]
pub(crate) struct Range {
    pub events: Vec<BufferedTagEvent>,
    /// Subjects minted for the items inside the subtree, in document order.
    pub ids: Rc<[NamedOrBlankNode]>,
}

#[derive(Debug, Default)]
struct CollectingRange {
    events: Vec<BufferedTagEvent>,
    open: usize,
    ids: Vec<NamedOrBlankNode>,
}

/// Hands out the subjects recorded for a range, in order, so that every
/// replay of the same subtree reuses the same identifiers.
#[derive(Debug)]
pub(crate) struct IdQueue {
    ids: Rc<[NamedOrBlankNode]>,
    next: usize,
}

impl IdQueue {
    pub fn new(ids: Rc<[NamedOrBlankNode]>) -> Self {
        Self { ids, next: 0 }
    }

    pub fn next_id(&mut self) -> Option<NamedOrBlankNode> {
        let id = self.ids.get(self.next).cloned();
        self.next += 1;
        id
    }
}

#[derive(Debug, Default)]
pub(crate) struct ReferenceResolver {
    /// Items waiting for a range, per referenced id.
    domains: HashMap<String, Vec<ScopeRef>>,
    /// Subtrees still being recorded, in the order they were opened.
    collecting: IndexMap<String, CollectingRange>,
    finalized: HashMap<String, Rc<Range>>,
}

impl ReferenceResolver {
    pub fn collect_open(&mut self, name: &str, attributes: &Attributes) {
        if let Some(id) = attributes.get("id").filter(|id| !id.is_empty()) {
            // a repeated id restarts the recording
            self.collecting.insert(id.clone(), CollectingRange::default());
        }

        for range in self.collecting.values_mut() {
            range.open += 1;
            range.events.push(BufferedTagEvent::Open {
                name: name.to_string(),
                attributes: attributes.clone(),
            });
        }
    }

    pub fn collect_text(&mut self, data: &str) {
        for range in self.collecting.values_mut() {
            range.events.push(BufferedTagEvent::Text(data.to_string()));
        }
    }

    /// Records a close event and returns the ids whose subtrees it completed.
    pub fn collect_close(&mut self) -> Vec<String> {
        let mut completed = Vec::new();
        for (id, range) in self.collecting.iter_mut() {
            range.open -= 1;
            range.events.push(BufferedTagEvent::Close);
            if range.open == 0 {
                completed.push(id.clone());
            }
        }

        for id in &completed {
            if let Some(range) = self.collecting.shift_remove(id) {
                tracing::trace!("- finished recording #{id} ({} events)", range.events.len());
                self.finalized.insert(
                    id.clone(),
                    Rc::new(Range {
                        events: range.events,
                        ids: range.ids.into(),
                    }),
                );
            }
        }

        completed
    }

    /// Remembers a subject minted outside of a replay.
    pub fn record_subject(&mut self, subject: &NamedOrBlankNode) {
        for range in self.collecting.values_mut() {
            range.ids.push(subject.clone());
        }
    }

    pub fn add_domain(&mut self, reference: &str, scope: ScopeRef) {
        self.domains
            .entry(reference.to_string())
            .or_default()
            .push(scope);
    }

    /// If the range for `reference` is complete, removes and returns the items
    /// to replay it against: just `only` if given, otherwise every item still
    /// waiting.
    pub fn take_ready(
        &mut self,
        reference: &str,
        only: Option<&ScopeRef>,
    ) -> Option<(Rc<Range>, Vec<ScopeRef>)> {
        let range = self.finalized.get(reference)?.clone();

        let domains = match only {
            Some(scope) => {
                if let Some(waiting) = self.domains.get_mut(reference) {
                    waiting.retain(|other| !Rc::ptr_eq(other, scope));
                }
                vec![scope.clone()]
            }
            None => self.domains.remove(reference).unwrap_or_default(),
        };

        Some((range, domains))
    }
}
