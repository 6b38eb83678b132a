//! BXM decoder.

use platinum_common::BinaryReader;

use crate::{
    BxmDocument, BxmHeader, BxmNode, DataRecord, Error, NodeRecord, Result, TextEncoding, ABSENT,
};

/// Pool size above which the declared data-offset count is doubled.
///
/// Route files under `ph_/` declare half of their data-offset pairs; the only
/// observable difference is an unusually large string pool. There is no known
/// rule behind this, so the threshold stays configurable.
pub const DEFAULT_POOL_DOUBLING_THRESHOLD: u32 = 90_000;

/// Deepest tree accepted by the decoder.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 512;

/// Tunables for BXM decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BxmOptions {
    /// Double the data-offset count when the declared pool size exceeds this.
    /// `None` disables the correction.
    pub pool_doubling_threshold: Option<u32>,
    /// Trees nested deeper than this are rejected as malformed.
    pub max_depth: usize,
}

impl Default for BxmOptions {
    fn default() -> Self {
        Self {
            pool_doubling_threshold: Some(DEFAULT_POOL_DOUBLING_THRESHOLD),
            max_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }
}

pub(crate) fn decode(data: &[u8], options: &BxmOptions) -> Result<BxmDocument> {
    // Too short to even hold a magic: by convention an empty document.
    if data.len() < 4 {
        return Ok(BxmDocument::default());
    }

    let mut reader = BinaryReader::new(data);
    let header: BxmHeader = reader
        .read_struct()
        .map_err(|_| Error::MalformedHeader(format!("{} bytes is shorter than the header", data.len())))?;

    let node_count = header.node_count.get() as usize;
    let mut data_count = header.data_count.get() as usize;
    let pool_size = header.pool_size.get();

    if let Some(threshold) = options.pool_doubling_threshold {
        if pool_size > threshold {
            log::debug!(
                "BXM pool size {} exceeds {}, doubling data-offset count {}",
                pool_size,
                threshold,
                data_count
            );
            data_count *= 2;
        }
    }

    let pool_start = BxmHeader::SIZE + node_count * NodeRecord::SIZE + data_count * DataRecord::SIZE;
    if pool_start > data.len() {
        return Err(Error::MalformedHeader(format!(
            "{} nodes and {} data offsets need {} bytes, file has {}",
            node_count,
            data_count,
            pool_start,
            data.len()
        )));
    }

    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        nodes.push(reader.read_struct::<NodeRecord>()?);
    }

    let mut records = Vec::with_capacity(data_count);
    for _ in 0..data_count {
        records.push(reader.read_struct::<DataRecord>()?);
    }

    let pool = &data[pool_start..];
    let declared_pool = &pool[..(pool_size as usize).min(pool.len())];
    let encoding = TextEncoding::detect(declared_pool);
    if encoding == TextEncoding::Utf8 {
        log::debug!("BXM string pool is not valid Shift-JIS, decoding as UTF-8");
    }

    if nodes.is_empty() {
        return Ok(BxmDocument::new(BxmNode::default(), encoding));
    }

    let mut tree = TreeReader {
        nodes: &nodes,
        records: &records,
        pool: declared_pool,
        encoding,
        max_depth: options.max_depth,
        visited: vec![false; nodes.len()],
    };
    let root = tree.read_node(0, 0)?;

    log::debug!(
        "decoded BXM: {} nodes, {} data offsets, {} pool bytes ({})",
        node_count,
        data_count,
        pool_size,
        encoding.label()
    );

    Ok(BxmDocument::new(root, encoding))
}

/// Rebuilds the tree from the flat tables.
///
/// Every node has exactly one parent, so each index is visited at most once.
struct TreeReader<'a> {
    nodes: &'a [NodeRecord],
    records: &'a [DataRecord],
    /// The string pool, limited to its declared size.
    pool: &'a [u8],
    encoding: TextEncoding,
    max_depth: usize,
    visited: Vec<bool>,
}

impl TreeReader<'_> {
    fn read_node(&mut self, index: usize, depth: usize) -> Result<BxmNode> {
        if depth > self.max_depth {
            return Err(Error::MalformedHeader(format!(
                "node tree is deeper than {} levels",
                self.max_depth
            )));
        }

        let nodes = self.nodes;
        let record = nodes.get(index).ok_or(Error::NodeIndexOutOfBounds {
            index,
            count: nodes.len(),
        })?;
        if std::mem::replace(&mut self.visited[index], true) {
            return Err(Error::Cycle(index));
        }

        let data_index = record.data_index.get() as usize;
        let (name, value) = self.read_pair(data_index)?;

        let mut node = BxmNode {
            name,
            value,
            ..BxmNode::default()
        };

        for i in 0..record.attribute_count.get() as usize {
            let (key, value) = self.read_pair(data_index + 1 + i)?;
            node.set_attr(key, value);
        }

        let first_child = record.first_child_index.get() as usize;
        let child_count = record.child_count.get() as usize;
        node.children.reserve(child_count);
        for child in first_child..first_child + child_count {
            node.children.push(self.read_node(child, depth + 1)?);
        }

        Ok(node)
    }

    fn read_pair(&self, index: usize) -> Result<(String, String)> {
        let record = self.records.get(index).ok_or(Error::DataIndexOutOfBounds {
            index,
            count: self.records.len(),
        })?;
        Ok((
            self.read_string(record.name_offset.get())?,
            self.read_string(record.value_offset.get())?,
        ))
    }

    fn read_string(&self, offset: u16) -> Result<String> {
        if offset == ABSENT {
            return Ok(String::new());
        }

        let start = offset as usize;
        if start >= self.pool.len() {
            return Err(Error::StringOffsetOutOfBounds {
                offset,
                size: self.pool.len(),
            });
        }

        let bytes = &self.pool[start..];
        let end = platinum_common::memchr::memchr(0, bytes).unwrap_or(bytes.len());
        Ok(self.encoding.decode(&bytes[..end]))
    }
}
