use oxrdf::{BlankNode, BlankNodeIdParseError};

/// Mints the blank nodes used as subjects of items without an `itemid`.
pub trait BlankNodeIssuer {
    fn issue(&mut self) -> BlankNode;
}

/// Issues random, globally unique blank nodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBlankNodes;

impl BlankNodeIssuer for RandomBlankNodes {
    fn issue(&mut self) -> BlankNode {
        BlankNode::default()
    }
}

/// Issues `{prefix}0`, `{prefix}1`, … so that output is reproducible.
#[derive(Debug, Clone)]
pub struct SequentialBlankNodes {
    prefix: String,
    next: u64,
}

impl SequentialBlankNodes {
    pub fn new(prefix: impl Into<String>) -> Result<Self, BlankNodeIdParseError> {
        let prefix = prefix.into();
        // the first label is representative of all the others
        BlankNode::new(format!("{prefix}0"))?;
        Ok(Self { prefix, next: 0 })
    }
}

impl Default for SequentialBlankNodes {
    fn default() -> Self {
        Self {
            prefix: "b".to_string(),
            next: 0,
        }
    }
}

impl BlankNodeIssuer for SequentialBlankNodes {
    fn issue(&mut self) -> BlankNode {
        let node = BlankNode::new_unchecked(format!("{}{}", self.prefix, self.next));
        self.next += 1;
        node
    }
}
