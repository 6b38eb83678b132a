//! BXM tree types.

use crate::{BxmOptions, Result, TextEncoding};

/// A node of a BXM tree.
///
/// Attributes keep their insertion order; keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BxmNode {
    /// Element name.
    pub name: String,
    /// Text content (empty when absent).
    pub value: String,
    /// Attributes as ordered key-value pairs.
    pub attributes: Vec<(String, String)>,
    /// Child nodes.
    pub children: Vec<BxmNode>,
}

impl BxmNode {
    /// Create a new node with the given element name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the text content of this node.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Add an attribute to this node.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Add a child node.
    pub fn child(mut self, child: BxmNode) -> Self {
        self.children.push(child);
        self
    }

    /// Insert or replace an attribute. A replaced key keeps its position.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Look up an attribute value.
    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Number of nodes in this subtree, including this one.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(BxmNode::count).sum::<usize>()
    }
}

/// A decoded BXM file: the tree plus the character set of its string pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BxmDocument {
    pub root: BxmNode,
    pub encoding: TextEncoding,
}

impl BxmDocument {
    /// Create a document from a tree and a character set.
    pub fn new(root: BxmNode, encoding: TextEncoding) -> Self {
        Self { root, encoding }
    }

    /// Decode BXM bytes with default options.
    pub fn decode(data: &[u8]) -> Result<Self> {
        crate::decode::decode(data, &BxmOptions::default())
    }

    /// Decode BXM bytes with explicit options.
    pub fn decode_with(data: &[u8], options: &BxmOptions) -> Result<Self> {
        crate::decode::decode(data, options)
    }

    /// Encode to BXM bytes in this document's character set.
    pub fn encode(&self) -> Result<Vec<u8>> {
        crate::encode::encode(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_attr_keeps_position() {
        let mut node = BxmNode::new("n").attr("a", "1").attr("b", "2");
        node.set_attr("a", "3");
        assert_eq!(
            node.attributes,
            vec![("a".to_string(), "3".to_string()), ("b".to_string(), "2".to_string())]
        );
        assert_eq!(node.get_attr("a"), Some("3"));
        assert_eq!(node.get_attr("c"), None);
    }

    #[test]
    fn test_count() {
        let node = BxmNode::new("a").child(BxmNode::new("b").child(BxmNode::new("c")));
        assert_eq!(node.count(), 3);
    }
}
