//! BXM encoder.
//!
//! Layout: header, node table, data-offset table, string pool. Children of a
//! node occupy contiguous node slots reserved before any of them is visited,
//! so the tree is laid out breadth-first per parent and depth-first overall.

use std::collections::HashMap;

use zerocopy::IntoBytes;

use crate::{BxmDocument, BxmHeader, BxmNode, DataRecord, Error, NodeRecord, Result, TextEncoding, ABSENT};

pub(crate) fn encode(doc: &BxmDocument) -> Result<Vec<u8>> {
    let mut builder = Builder::new(doc.encoding);

    builder.nodes.push(NodeRecord::new(0, 0, 0, 0));
    builder.visit(&doc.root, 0)?;

    let node_count = to_u16("node count", builder.nodes.len())?;
    let pair_count = builder.pairs.len() / 2;
    let data_count = to_u16("data-offset count", pair_count)?;
    let pool_size = u32::try_from(builder.pool.len()).map_err(|_| Error::Overflow {
        what: "string pool size",
        value: builder.pool.len(),
    })?;

    let header = BxmHeader::new(node_count, data_count, pool_size);

    let total = BxmHeader::SIZE
        + builder.nodes.len() * NodeRecord::SIZE
        + pair_count * DataRecord::SIZE
        + builder.pool.len();
    let mut output = Vec::with_capacity(total);
    output.extend_from_slice(header.as_bytes());
    for node in &builder.nodes {
        output.extend_from_slice(node.as_bytes());
    }
    for pair in builder.pairs.chunks_exact(2) {
        output.extend_from_slice(DataRecord::new(pair[0], pair[1]).as_bytes());
    }
    output.extend_from_slice(&builder.pool);

    log::debug!(
        "encoded BXM: {} nodes, {} data offsets, {} pool bytes ({})",
        node_count,
        data_count,
        pool_size,
        doc.encoding.label()
    );

    Ok(output)
}

fn to_u16(what: &'static str, value: usize) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::Overflow { what, value })
}

struct Builder {
    encoding: TextEncoding,
    nodes: Vec<NodeRecord>,
    /// Flattened name/value offsets, two per pair.
    pairs: Vec<u16>,
    /// Pair index of every distinct group already written.
    groups: HashMap<Vec<u16>, u16>,
    pool: Vec<u8>,
    offsets: HashMap<String, u16>,
}

impl Builder {
    fn new(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            nodes: Vec::new(),
            pairs: Vec::new(),
            groups: HashMap::new(),
            pool: Vec::new(),
            offsets: HashMap::new(),
        }
    }

    fn visit(&mut self, node: &BxmNode, slot: usize) -> Result<()> {
        // Own slot is already reserved, so this is where the children go.
        let first_child = to_u16("first child index", self.nodes.len())?;

        let mut group = Vec::with_capacity(2 + node.attributes.len() * 2);
        group.push(self.intern(&node.name)?);
        group.push(self.intern_optional(&node.value)?);
        for (key, value) in &node.attributes {
            group.push(self.intern(key)?);
            group.push(self.intern_optional(value)?);
        }
        let data_index = self.add_group(group)?;

        self.nodes[slot] = NodeRecord::new(
            to_u16("child count", node.children.len())?,
            first_child,
            to_u16("attribute count", node.attributes.len())?,
            data_index,
        );

        let start = self.nodes.len();
        self.nodes
            .resize(start + node.children.len(), NodeRecord::new(0, 0, 0, 0));
        for (i, child) in node.children.iter().enumerate() {
            self.visit(child, start + i)?;
        }

        Ok(())
    }

    /// Reuse an identical group when one exists, otherwise append it.
    fn add_group(&mut self, group: Vec<u16>) -> Result<u16> {
        if let Some(&index) = self.groups.get(&group) {
            return Ok(index);
        }
        let index = to_u16("data index", self.pairs.len() / 2)?;
        self.pairs.extend_from_slice(&group);
        self.groups.insert(group, index);
        Ok(index)
    }

    fn intern_optional(&mut self, text: &str) -> Result<u16> {
        if text.is_empty() {
            Ok(ABSENT)
        } else {
            self.intern(text)
        }
    }

    fn intern(&mut self, text: &str) -> Result<u16> {
        if let Some(&offset) = self.offsets.get(text) {
            return Ok(offset);
        }

        let offset = self.pool.len();
        if offset >= ABSENT as usize {
            return Err(Error::Overflow {
                what: "string offset",
                value: offset,
            });
        }
        let offset = offset as u16;

        let bytes = self.encoding.encode(text)?;
        self.pool.extend_from_slice(&bytes);
        self.pool.push(0);
        self.offsets.insert(text.to_string(), offset);
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_root() {
        let doc = BxmDocument::new(BxmNode::new("root"), TextEncoding::ShiftJis);
        let bytes = doc.encode().unwrap();

        assert_eq!(bytes.len(), 33);
        assert_eq!(&bytes[..4], b"XML\0");
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        // node count 1, pair count 1, pool size 5
        assert_eq!(&bytes[8..16], &[0, 1, 0, 1, 0, 0, 0, 5]);
        // child count 0, first child 1, attribute count 0, data index 0
        assert_eq!(&bytes[16..24], &[0, 0, 0, 1, 0, 0, 0, 0]);
        // name offset 0, value absent
        assert_eq!(&bytes[24..28], &[0, 0, 0xFF, 0xFF]);
        assert_eq!(&bytes[28..], b"root\0");
    }

    #[test]
    fn test_round_trip() {
        let root = BxmNode::new("Quest")
            .attr("id", "q100")
            .attr("flag", "")
            .child(BxmNode::new("Step").attr("n", "1").value("Go north"))
            .child(
                BxmNode::new("Step")
                    .attr("n", "2")
                    .child(BxmNode::new("Note").value("テスト")),
            );
        let doc = BxmDocument::new(root, TextEncoding::ShiftJis);

        let bytes = doc.encode().unwrap();
        let decoded = BxmDocument::decode(&bytes).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn test_utf8_round_trip() {
        let root = BxmNode::new("root").value("クエスト");
        let doc = BxmDocument::new(root, TextEncoding::Utf8);

        let bytes = doc.encode().unwrap();
        let decoded = BxmDocument::decode(&bytes).unwrap();
        assert_eq!(decoded.encoding, TextEncoding::Utf8);
        assert_eq!(decoded.root.value, "クエスト");
    }

    #[test]
    fn test_children_are_contiguous() {
        let root = BxmNode::new("r")
            .child(BxmNode::new("a").child(BxmNode::new("a1")))
            .child(BxmNode::new("b"));
        let bytes = BxmDocument::new(root, TextEncoding::ShiftJis).encode().unwrap();

        let first_child = |i: usize| {
            let at = BxmHeader::SIZE + i * NodeRecord::SIZE + 2;
            u16::from_be_bytes([bytes[at], bytes[at + 1]])
        };
        // slots: r, a, b, a1
        assert_eq!(first_child(0), 1);
        assert_eq!(first_child(1), 3);
        assert_eq!(first_child(2), 4);
        assert_eq!(first_child(3), 4);
    }

    #[test]
    fn test_identical_groups_share_pairs() {
        let root = BxmNode::new("list")
            .child(BxmNode::new("item").attr("k", "v"))
            .child(BxmNode::new("item").attr("k", "v"));
        let bytes = BxmDocument::new(root, TextEncoding::ShiftJis).encode().unwrap();

        let data_count = u16::from_be_bytes([bytes[10], bytes[11]]);
        // list group (1 pair) + one shared item group (2 pairs)
        assert_eq!(data_count, 3);

        let decoded = BxmDocument::decode(&bytes).unwrap();
        assert_eq!(decoded.root.children[1].get_attr("k"), Some("v"));
    }

    #[test]
    fn test_unencodable_text() {
        let doc = BxmDocument::new(BxmNode::new("root").value("\u{1F600}"), TextEncoding::ShiftJis);
        assert!(matches!(doc.encode(), Err(Error::Unencodable { .. })));
    }

    #[test]
    fn test_pool_offset_overflow() {
        let mut root = BxmNode::new("root");
        for i in 0..700 {
            root.set_attr(format!("key{i:04}"), format!("{i}{}", "x".repeat(100)));
        }
        let doc = BxmDocument::new(root, TextEncoding::ShiftJis);
        assert!(matches!(
            doc.encode(),
            Err(Error::Overflow {
                what: "string offset",
                ..
            })
        ));
    }
}
