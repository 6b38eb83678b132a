//! Recursive extraction and repacking.
//!
//! [`Extractor::extract`] resolves a source's codec, decodes it and turns
//! archive contents into a folder tree. DAT entries are decoded eagerly, PKZ
//! entries stay [`Content::Partial`] until [`Extractor::extract_partial`] is
//! called on them. [`Extractor::repack`] runs the codecs in reverse.

use std::sync::Arc;

use platinum_bxm::{BxmDocument, BxmOptions};
use platinum_common::ByteSource;
use platinum_dat::{DatArchive, DatFile, DatOptions};
use platinum_pkz::{CompressionAlgorithm, Decompressors, KrakenDecoder, PkzArchive, PkzFile, RepackOptions};

use crate::format::resolve;
use crate::tree::{join, materialize, Content, Directory, FileNode, Leaf, ListingEntry, PartialEntry};
use crate::{CodecId, Error, Result};

/// Default nesting ceiling.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Default ceiling on bytes handed to codecs during one extraction (8 GiB).
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 8 << 30;

/// Tunables for extraction and repacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Deepest nesting level at which a codec still runs. The source passed
    /// to [`Extractor::extract`] is level 0.
    pub max_depth: usize,
    /// Total bytes that may be handed to codecs during one call, counted at
    /// every nesting level. A PKZ counts only its directory until an entry
    /// is decompressed.
    pub max_total_bytes: u64,
    pub bxm: BxmOptions,
    pub dat: DatOptions,
    pub repack: RepackOptions,
    /// Compression for PKZ entries that no longer carry their original one.
    pub pkz_compression: CompressionAlgorithm,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            bxm: BxmOptions::default(),
            dat: DatOptions::default(),
            repack: RepackOptions::default(),
            pkz_compression: CompressionAlgorithm::ZStandard,
        }
    }
}

/// The decoded form of one top-level source.
#[derive(Debug, Clone)]
pub struct Extracted {
    /// Name of the source.
    pub name: String,
    /// Codec of the source.
    pub codec: CodecId,
    /// Whether `nodes` is a single folder named after the source, added
    /// because no entry name had a folder component.
    pub wrapped: bool,
    /// Top-level nodes. A BXM source yields a single leaf.
    pub nodes: Vec<FileNode>,
}

impl Extracted {
    pub fn repackable(&self) -> bool {
        self.codec.is_repackable()
    }

    /// Number of PKZ entries not yet decompressed.
    pub fn partial_count(&self) -> usize {
        self.nodes.iter().map(FileNode::partial_count).sum()
    }

    pub fn has_partial_files(&self) -> bool {
        self.partial_count() > 0
    }

    /// Find a node by `/`-separated path from the top level.
    pub fn find(&self, path: &str) -> Option<&FileNode> {
        let (head, rest) = split_first(path);
        self.nodes.iter().find(|n| n.name() == head)?.find(rest)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut FileNode> {
        let (head, rest) = split_first(path);
        self.nodes.iter_mut().find(|n| n.name() == head)?.find_mut(rest)
    }

    /// Visit every node depth-first with its full path.
    pub fn walk<F: FnMut(&str, &FileNode)>(&self, f: &mut F) {
        for node in &self.nodes {
            node.walk(f);
        }
    }

    /// Every node with its full path, depth-first.
    pub fn listing(&self) -> Vec<ListingEntry> {
        let mut rows = Vec::new();
        self.walk(&mut |path, node| rows.push(ListingEntry::new(path, node)));
        rows
    }

    /// The archive's own entries, with the wrapping folder removed.
    fn entries(&self) -> &[FileNode] {
        if self.wrapped {
            self.nodes.first().map(FileNode::children).unwrap_or_default()
        } else {
            &self.nodes
        }
    }
}

fn split_first(path: &str) -> (&str, &str) {
    let path = path.trim_start_matches('/');
    path.split_once('/').unwrap_or((path, ""))
}

/// Tracks nesting depth and bytes handed to codecs.
struct Budget {
    max_depth: usize,
    remaining: u64,
}

impl Budget {
    fn new(options: &ExtractOptions) -> Self {
        Self {
            max_depth: options.max_depth,
            remaining: options.max_total_bytes,
        }
    }

    fn enter(&self, name: &str, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::LimitExceeded(format!(
                "{} is nested {} levels deep (max {})",
                name, depth, self.max_depth
            )));
        }
        Ok(())
    }

    /// Fail unless `bytes` still fit in the budget.
    fn check(&self, name: &str, bytes: u64) -> Result<()> {
        if bytes > self.remaining {
            return Err(Error::LimitExceeded(format!(
                "decoded size budget exhausted at {} ({} bytes, {} left)",
                name, bytes, self.remaining
            )));
        }
        Ok(())
    }

    fn charge(&mut self, name: &str, bytes: u64) -> Result<()> {
        self.check(name, bytes)?;
        self.remaining -= bytes;
        Ok(())
    }
}

/// Output of one codec run, before it is placed in a tree.
enum Decoded {
    Leaf(Content),
    Entries(Vec<(String, FileNode)>),
}

/// Drives the codecs over byte sources and decoded trees.
#[derive(Debug, Clone)]
pub struct Extractor {
    options: ExtractOptions,
    decompressors: Arc<Decompressors>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(ExtractOptions::default())
    }
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self {
            options,
            decompressors: Arc::new(Decompressors::new()),
        }
    }

    /// Register a Kraken backend for PKZ entries.
    pub fn with_kraken(mut self, kraken: Arc<dyn KrakenDecoder>) -> Self {
        self.decompressors = Arc::new(Decompressors::new().with_kraken(kraken));
        self
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn decompressors(&self) -> &Decompressors {
        &self.decompressors
    }

    /// Decode a top-level source.
    ///
    /// Fails with [`Error::EmptyInput`] for an empty source and
    /// [`Error::UnsupportedFormat`] when no codec matches. Errors from the
    /// source's own codec are returned; nested entries that fail to decode
    /// are kept as raw leaves.
    pub fn extract(&self, source: ByteSource) -> Result<Extracted> {
        let name = source.name().to_string();
        if source.is_empty() {
            return Err(Error::EmptyInput { name });
        }
        let codec = resolve(source.magic(), &name).ok_or_else(|| Error::UnsupportedFormat { name: name.clone() })?;

        let mut budget = Budget::new(&self.options);
        budget.enter(&name, 0)?;

        let (nodes, wrapped) = match self.decode(codec, &source, 0, &mut budget)? {
            Decoded::Leaf(content) => (vec![FileNode::Leaf(Leaf {
                name: name.clone(),
                codec: Some(codec),
                content,
                warning: None,
            })], false),
            Decoded::Entries(entries) => materialize(entries, Some(name.as_str())),
        };

        log::debug!("extracted {} as {} ({} top-level nodes)", name, codec, nodes.len());

        Ok(Extracted {
            name,
            codec,
            wrapped,
            nodes,
        })
    }

    /// Decode a batch of sources, continuing past failures.
    pub fn import(&self, sources: Vec<ByteSource>) -> Vec<(String, Result<Extracted>)> {
        sources
            .into_iter()
            .map(|source| {
                let name = source.name().to_string();
                let result = self.extract(source);
                if let Err(e) = &result {
                    log::warn!("skipping {}: {}", name, e);
                }
                (name, result)
            })
            .collect()
    }

    /// Decompress and decode a partial leaf in place.
    ///
    /// Returns `false` without touching the node when it holds no pending
    /// PKZ entry. Decompression failures and limit violations are returned
    /// and leave the node unchanged; a payload its codec rejects becomes a
    /// raw leaf. A data-integrity warning from decompression is kept on the
    /// resolved node.
    pub fn extract_partial(&self, node: &mut FileNode) -> Result<bool> {
        let FileNode::Leaf(Leaf {
            name,
            content: Content::Partial(partial),
            ..
        }) = node
        else {
            return Ok(false);
        };

        let mut budget = Budget::new(&self.options);
        budget.check(name.as_str(), partial.entry().size)?;

        let decompressed = partial.decompress(&self.decompressors)?;
        let payload = decompressed.data.renamed(name.as_str());
        let mut resolved = self.decode_nested(payload, 1, &mut budget)?;
        resolved.set_warning(decompressed.warning);
        *node = resolved;
        Ok(true)
    }

    /// Resolve every partial leaf below `node`, including ones uncovered by
    /// earlier resolutions. Returns the number of leaves resolved.
    pub fn resolve_all(&self, node: &mut FileNode) -> Result<usize> {
        let mut count = usize::from(self.extract_partial(node)?);
        if let FileNode::Directory(dir) = node {
            for child in &mut dir.children {
                count += self.resolve_all(child)?;
            }
        }
        Ok(count)
    }

    /// Like [`Extractor::decode_node`], but a codec failure leaves the source
    /// as a raw leaf. Only limit violations are returned.
    fn decode_nested(&self, source: ByteSource, depth: usize, budget: &mut Budget) -> Result<FileNode> {
        match self.decode_node(source.clone(), depth, budget) {
            Ok(node) => Ok(node),
            Err(e @ Error::LimitExceeded(_)) => Err(e),
            Err(e) => {
                log::warn!("keeping {} undecoded: {}", source.name(), e);
                Ok(FileNode::Leaf(Leaf::raw(source)))
            }
        }
    }

    /// Decode a nested source into a node, recursing into archives.
    fn decode_node(&self, source: ByteSource, depth: usize, budget: &mut Budget) -> Result<FileNode> {
        let name = source.name().to_string();
        let codec = if source.is_empty() {
            None
        } else {
            resolve(source.magic(), &name)
        };
        let Some(codec) = codec else {
            return Ok(FileNode::Leaf(Leaf::raw(source)));
        };

        budget.enter(&name, depth)?;
        Ok(match self.decode(codec, &source, depth, budget)? {
            Decoded::Leaf(content) => FileNode::Leaf(Leaf {
                name,
                codec: Some(codec),
                content,
                warning: None,
            }),
            Decoded::Entries(entries) => FileNode::Directory(Directory {
                name,
                codec: Some(codec),
                children: materialize(entries, None).0,
                warning: None,
            }),
        })
    }

    fn decode(&self, codec: CodecId, source: &ByteSource, depth: usize, budget: &mut Budget) -> Result<Decoded> {
        match codec {
            CodecId::Bxm => {
                budget.charge(source.name(), source.len() as u64)?;
                let document = BxmDocument::decode_with(source.as_bytes(), &self.options.bxm)?;
                Ok(Decoded::Leaf(Content::Bxm(document)))
            }
            CodecId::Dat => {
                budget.charge(source.name(), source.len() as u64)?;
                let archive = DatArchive::parse_with(source.as_bytes(), &self.options.dat)?;
                if archive.is_empty() {
                    return Err(Error::EmptyDirectory {
                        name: source.name().to_string(),
                    });
                }
                let mut entries = Vec::with_capacity(archive.len());
                for entry in archive.entries() {
                    let slice = source.slice(entry.name.as_str(), entry.offset, entry.end())?;
                    entries.push((entry.name.clone(), self.decode_nested(slice, depth + 1, budget)?));
                }
                Ok(Decoded::Entries(entries))
            }
            CodecId::Pkz => {
                let archive = Arc::new(PkzArchive::from_source(source.clone())?);
                budget.charge(source.name(), archive.directory_len() as u64)?;
                if archive.entry_count() == 0 {
                    return Err(Error::EmptyDirectory {
                        name: source.name().to_string(),
                    });
                }
                let entries = archive
                    .entries()
                    .iter()
                    .enumerate()
                    .map(|(index, entry)| {
                        let leaf = Leaf {
                            name: entry.name.clone(),
                            codec: resolve(&[], &entry.name),
                            content: Content::Partial(PartialEntry::new(archive.clone(), index)),
                            warning: None,
                        };
                        (entry.name.clone(), FileNode::Leaf(leaf))
                    })
                    .collect();
                Ok(Decoded::Entries(entries))
            }
        }
    }

    /// Encode a node back into bytes.
    ///
    /// BXM leaves are encoded, raw leaves return their bytes and partial
    /// leaves their decompressed payload. A PKZ directory becomes a PKZ
    /// archive; any other directory becomes a DAT archive with one entry per
    /// file, nested folders flattened into `/`-separated names.
    pub fn repack(&self, node: &FileNode) -> Result<Vec<u8>> {
        match node {
            FileNode::Leaf(leaf) => self.repack_leaf(leaf),
            FileNode::Directory(dir) => self.repack_children(dir.codec, &dir.name, &dir.children),
        }
    }

    /// Encode an extracted source back into the format it was read from.
    pub fn repack_extracted(&self, extracted: &Extracted) -> Result<Vec<u8>> {
        if extracted.codec.is_archive() {
            return self.repack_children(Some(extracted.codec), &extracted.name, extracted.entries());
        }
        match extracted.nodes.as_slice() {
            [node] => self.repack(node),
            _ => Err(Error::EmptyDirectory {
                name: extracted.name.clone(),
            }),
        }
    }

    fn repack_leaf(&self, leaf: &Leaf) -> Result<Vec<u8>> {
        match &leaf.content {
            Content::Raw(source) => Ok(source.to_vec()),
            Content::Bxm(document) => Ok(document.encode()?),
            Content::Partial(partial) => Ok(partial.payload(&self.decompressors)?.to_vec()),
        }
    }

    fn repack_children(&self, codec: Option<CodecId>, name: &str, children: &[FileNode]) -> Result<Vec<u8>> {
        let mut files = Vec::new();
        self.flatten("", children, &mut files)?;
        if files.is_empty() {
            return Err(Error::EmptyDirectory { name: name.to_string() });
        }

        let bytes = match codec {
            Some(CodecId::Pkz) => {
                let files: Vec<PkzFile> = files
                    .into_iter()
                    .map(|(path, compression, data)| {
                        PkzFile::new(path, data, compression.unwrap_or(self.options.pkz_compression))
                    })
                    .collect();
                platinum_pkz::encode(&files, &self.decompressors, &self.options.repack)?
            }
            _ => {
                let files: Vec<DatFile> = files
                    .into_iter()
                    .map(|(path, _, data)| DatFile::new(path, data))
                    .collect();
                platinum_dat::encode(&files)?
            }
        };

        log::debug!("repacked {} ({} bytes)", name, bytes.len());
        Ok(bytes)
    }

    /// Collect `(path, original compression, bytes)` for every file below a
    /// folder. Plain folders contribute their path; archives and leaves are
    /// encoded as single files.
    fn flatten(
        &self,
        prefix: &str,
        children: &[FileNode],
        out: &mut Vec<(String, Option<CompressionAlgorithm>, Vec<u8>)>,
    ) -> Result<()> {
        for child in children {
            let path = join(prefix, child.name());
            match child {
                FileNode::Directory(dir) if dir.codec.is_none() => self.flatten(&path, &dir.children, out)?,
                FileNode::Leaf(Leaf {
                    content: Content::Partial(partial),
                    ..
                }) => {
                    // Unknown labels are stored uncompressed.
                    let compression = partial.algorithm().unwrap_or(CompressionAlgorithm::None);
                    out.push((path, Some(compression), partial.payload(&self.decompressors)?.to_vec()));
                }
                _ => out.push((path, None, self.repack(child)?)),
            }
        }
        Ok(())
    }
}
