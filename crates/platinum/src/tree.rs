//! Decoded file trees.

use std::sync::Arc;

use parking_lot::Mutex;
use platinum_bxm::BxmDocument;
use platinum_common::ByteSource;
use platinum_pkz::{CompressionAlgorithm, Decompressed, Decompressors, PkzArchive, PkzEntry};

use crate::{CodecId, Result};

/// A PKZ entry that has not been decompressed yet.
///
/// Clones share the decompressed payload once any of them has produced it.
#[derive(Debug, Clone)]
pub struct PartialEntry {
    archive: Arc<PkzArchive>,
    index: usize,
    payload: Arc<Mutex<Option<Decompressed>>>,
}

impl PartialEntry {
    pub(crate) fn new(archive: Arc<PkzArchive>, index: usize) -> Self {
        Self {
            archive,
            index,
            payload: Arc::default(),
        }
    }

    /// Directory information for this entry.
    pub fn entry(&self) -> &PkzEntry {
        &self.archive.entries()[self.index]
    }

    /// The archive this entry belongs to.
    pub fn archive(&self) -> &PkzArchive {
        &self.archive
    }

    /// Recorded compression, if the label is recognized.
    pub fn algorithm(&self) -> Option<CompressionAlgorithm> {
        self.entry().algorithm()
    }

    /// Whether the payload has already been decompressed.
    pub fn is_loaded(&self) -> bool {
        self.payload.lock().is_some()
    }

    /// Decompress the payload, or return the cached result of an earlier call.
    pub fn decompress(&self, decompressors: &Decompressors) -> Result<Decompressed> {
        let mut payload = self.payload.lock();
        if let Some(decompressed) = payload.as_ref() {
            return Ok(decompressed.clone());
        }

        let decompressed = self.archive.read(self.entry(), decompressors)?;
        *payload = Some(decompressed.clone());
        Ok(decompressed)
    }

    /// The decompressed bytes alone.
    pub fn payload(&self, decompressors: &Decompressors) -> Result<ByteSource> {
        self.decompress(decompressors).map(|decompressed| decompressed.data)
    }
}

/// Contents of a leaf.
#[derive(Debug, Clone)]
pub enum Content {
    /// Bytes with no registered codec, or that failed to decode.
    Raw(ByteSource),
    /// A decoded BXM tree.
    Bxm(BxmDocument),
    /// A PKZ entry awaiting decompression.
    Partial(PartialEntry),
}

/// A file in a decoded tree.
#[derive(Debug, Clone)]
pub struct Leaf {
    pub name: String,
    pub codec: Option<CodecId>,
    pub content: Content,
    /// Set when the bytes were recovered from a PKZ entry but may be wrong.
    pub warning: Option<String>,
}

impl Leaf {
    pub fn raw(source: ByteSource) -> Self {
        Self {
            name: source.name().to_string(),
            codec: None,
            content: Content::Raw(source),
            warning: None,
        }
    }

    /// Whether this leaf can be encoded back to bytes by its codec.
    pub fn repackable(&self) -> bool {
        self.codec.is_some_and(CodecId::is_repackable)
    }

    /// Whether this leaf still holds an undecoded PKZ entry.
    pub fn is_partial(&self) -> bool {
        matches!(self.content, Content::Partial(_))
    }

    /// Size in bytes, when known without decoding.
    pub fn size(&self) -> Option<u64> {
        match &self.content {
            Content::Raw(source) => Some(source.len() as u64),
            Content::Partial(partial) => Some(partial.entry().size),
            Content::Bxm(_) => None,
        }
    }
}

/// A folder, or a decoded archive when `codec` is set.
#[derive(Debug, Clone)]
pub struct Directory {
    pub name: String,
    pub codec: Option<CodecId>,
    pub children: Vec<FileNode>,
    /// Set when the archive was decoded from a suspect PKZ payload.
    pub warning: Option<String>,
}

impl Directory {
    pub fn new(name: impl Into<String>, codec: Option<CodecId>) -> Self {
        Self {
            name: name.into(),
            codec,
            children: Vec::new(),
            warning: None,
        }
    }
}

/// A node in a decoded tree.
#[derive(Debug, Clone)]
pub enum FileNode {
    Leaf(Leaf),
    Directory(Directory),
}

impl FileNode {
    pub fn name(&self) -> &str {
        match self {
            FileNode::Leaf(leaf) => &leaf.name,
            FileNode::Directory(dir) => &dir.name,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        match self {
            FileNode::Leaf(leaf) => leaf.name = name.into(),
            FileNode::Directory(dir) => dir.name = name.into(),
        }
    }

    pub fn codec(&self) -> Option<CodecId> {
        match self {
            FileNode::Leaf(leaf) => leaf.codec,
            FileNode::Directory(dir) => dir.codec,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, FileNode::Leaf(leaf) if leaf.is_partial())
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            FileNode::Leaf(leaf) => leaf.warning.as_deref(),
            FileNode::Directory(dir) => dir.warning.as_deref(),
        }
    }

    pub fn set_warning(&mut self, warning: Option<String>) {
        match self {
            FileNode::Leaf(leaf) => leaf.warning = warning,
            FileNode::Directory(dir) => dir.warning = warning,
        }
    }

    /// Children of a directory; empty for leaves.
    pub fn children(&self) -> &[FileNode] {
        match self {
            FileNode::Leaf(_) => &[],
            FileNode::Directory(dir) => &dir.children,
        }
    }

    /// Find a descendant by `/`-separated path relative to this node.
    pub fn find(&self, path: &str) -> Option<&FileNode> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, segment| node.children().iter().find(|c| c.name() == segment))
    }

    /// Mutable variant of [`FileNode::find`].
    pub fn find_mut(&mut self, path: &str) -> Option<&mut FileNode> {
        let mut node = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let FileNode::Directory(dir) = node else {
                return None;
            };
            node = dir.children.iter_mut().find(|c| c.name() == segment)?;
        }
        Some(node)
    }

    /// Visit every node depth-first with its path relative to this node's parent.
    pub fn walk<F: FnMut(&str, &FileNode)>(&self, f: &mut F) {
        self.walk_from("", f);
    }

    fn walk_from<F: FnMut(&str, &FileNode)>(&self, prefix: &str, f: &mut F) {
        let path = join(prefix, self.name());
        f(&path, self);
        for child in self.children() {
            child.walk_from(&path, f);
        }
    }

    /// Number of nodes still holding undecoded PKZ entries.
    pub fn partial_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_, node| {
            if node.is_partial() {
                count += 1;
            }
        });
        count
    }
}

/// One row of a tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ListingEntry {
    pub path: String,
    pub directory: bool,
    pub codec: Option<CodecId>,
    pub size: Option<u64>,
    pub partial: bool,
    /// Compression label of a pending PKZ entry.
    pub compression: Option<String>,
    /// Data-integrity warning carried by the node.
    pub warning: Option<String>,
}

impl ListingEntry {
    pub(crate) fn new(path: &str, node: &FileNode) -> Self {
        let (size, compression) = match node {
            FileNode::Leaf(leaf) => {
                let compression = match &leaf.content {
                    Content::Partial(partial) => Some(partial.entry().label.clone()),
                    _ => None,
                };
                (leaf.size(), compression)
            }
            FileNode::Directory(_) => (None, None),
        };
        Self {
            path: path.to_string(),
            directory: matches!(node, FileNode::Directory(_)),
            codec: node.codec(),
            size,
            partial: node.is_partial(),
            compression,
            warning: node.warning().map(str::to_string),
        }
    }
}

/// Join two path fragments with `/`.
pub(crate) fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Arrange decoded archive entries into a folder tree.
///
/// Each entry name is split on `/`; folders are created once for every
/// leading segment and the node is stored under the final segment. When no
/// entry name contains a separator and `wrap_flat` is given, all nodes are
/// placed in a single folder with that name instead. Returns the nodes and
/// whether wrapping happened.
pub fn materialize(entries: Vec<(String, FileNode)>, wrap_flat: Option<&str>) -> (Vec<FileNode>, bool) {
    let nested = entries.iter().any(|(path, _)| path.contains('/'));

    if !nested {
        let nodes = entries
            .into_iter()
            .map(|(path, mut node)| {
                node.set_name(path);
                node
            })
            .collect();
        return match wrap_flat {
            Some(name) => {
                let mut dir = Directory::new(name, None);
                dir.children = nodes;
                (vec![FileNode::Directory(dir)], true)
            }
            None => (nodes, false),
        };
    }

    let mut root = Vec::new();
    for (path, node) in entries {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        insert(&mut root, &segments, node);
    }
    (root, false)
}

fn insert(children: &mut Vec<FileNode>, segments: &[&str], mut node: FileNode) {
    match segments {
        [] => children.push(node),
        [name] => {
            node.set_name(*name);
            children.push(node);
        }
        [folder, rest @ ..] => {
            let position = children
                .iter()
                .position(|c| matches!(c, FileNode::Directory(d) if d.codec.is_none() && d.name == *folder));
            let index = match position {
                Some(index) => index,
                None => {
                    children.push(FileNode::Directory(Directory::new(*folder, None)));
                    children.len() - 1
                }
            };
            if let FileNode::Directory(dir) = &mut children[index] {
                insert(&mut dir.children, rest, node);
            }
        }
    }
}
