use std::cell::RefCell;
use std::rc::Rc;

use oxrdf::{NamedNode, NamedOrBlankNode};

/// Item scopes are shared between the scope stack and any pending `itemref`
/// domains that are waiting on them.
pub(crate) type ScopeRef = Rc<RefCell<ItemScope>>;

/// The state of one Microdata item.
#[derive(Debug)]
pub(crate) struct ItemScope {
    pub subject: NamedOrBlankNode,
    /// Prefix for relative property names.
    pub vocab: Option<String>,
    pub language: Option<String>,
    /// Set on items re-created while replaying an `itemref`; their own
    /// statements were already emitted the first time round.
    pub block_emission: bool,
}

/// Predicates of a property element that are waiting for its text.
#[derive(Debug, Default)]
pub(crate) struct PendingPredicates {
    pub forward: Option<Vec<NamedNode>>,
    pub reverse: Option<Vec<NamedNode>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Reverse,
}

impl ItemScope {
    pub fn new(subject: NamedOrBlankNode) -> Self {
        Self {
            subject,
            vocab: None,
            language: None,
            block_emission: false,
        }
    }

    pub fn into_ref(self) -> ScopeRef {
        Rc::new(RefCell::new(self))
    }
}

impl PendingPredicates {
    pub fn set(&mut self, direction: Direction, predicates: Vec<NamedNode>) {
        match direction {
            Direction::Forward => self.forward = Some(predicates),
            Direction::Reverse => self.reverse = Some(predicates),
        }
    }

    /// Outstanding predicate sets, forward before reverse.
    pub fn drain(self) -> impl Iterator<Item = (Direction, Vec<NamedNode>)> {
        [
            self.forward.map(|p| (Direction::Forward, p)),
            self.reverse.map(|p| (Direction::Reverse, p)),
        ]
        .into_iter()
        .flatten()
    }
}
