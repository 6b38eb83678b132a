//! Platinum CLI - Command-line tool for PlatinumGames archive extraction.
//!
//! This is the main entry point for the Platinum command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::{MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use platinum::bxm::BxmOptions;
use platinum::dat::DatOptions;
use platinum::pkz::RepackOptions;
use platinum::prelude::*;

/// Platinum - PlatinumGames archive extraction tool
#[derive(Parser)]
#[command(name = "platinum")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Commands,
}

/// Decoder limits and heuristics.
#[derive(Args)]
struct Options {
    /// Deepest archive nesting that is still decoded
    #[arg(long, global = true, env = "PLATINUM_MAX_DEPTH", default_value_t = platinum::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Ceiling on bytes handed to codecs per input file
    #[arg(long, global = true, env = "PLATINUM_MAX_BYTES", default_value_t = platinum::DEFAULT_MAX_TOTAL_BYTES)]
    max_bytes: u64,

    /// BXM pool size above which the data-offset count is doubled (0 disables)
    #[arg(long, global = true, env = "PLATINUM_BXM_DOUBLING", default_value_t = platinum::bxm::DEFAULT_POOL_DOUBLING_THRESHOLD)]
    bxm_doubling: u32,

    /// DAT file count above which the header is read as big-endian
    #[arg(long, global = true, env = "PLATINUM_DAT_BE_THRESHOLD", default_value_t = platinum::dat::DEFAULT_BIG_ENDIAN_THRESHOLD)]
    dat_be_threshold: u32,

    /// Zstandard level used when repacking PKZ entries
    #[arg(long, global = true, env = "PLATINUM_ZSTD_LEVEL", default_value_t = 3)]
    zstd_level: i32,
}

impl Options {
    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            max_depth: self.max_depth,
            max_total_bytes: self.max_bytes,
            bxm: BxmOptions {
                pool_doubling_threshold: (self.bxm_doubling > 0).then_some(self.bxm_doubling),
                ..BxmOptions::default()
            },
            dat: DatOptions {
                big_endian_threshold: self.dat_be_threshold,
            },
            repack: RepackOptions {
                zstd_level: self.zstd_level,
                ..RepackOptions::default()
            },
            ..ExtractOptions::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the decoded tree of a DAT, PKZ or BXM file
    List {
        /// Input file
        #[arg(short, long, env = "INPUT_FILE")]
        input: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Decompress PKZ entries to list their contents
        #[arg(short, long)]
        resolve: bool,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract a file's decoded tree to a folder
    Extract {
        /// Input file
        #[arg(short, long, env = "INPUT_FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Convert a BXM file to XML
    BxmToXml {
        /// Input BXM file
        #[arg(short, long)]
        input: PathBuf,

        /// Output XML file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Convert an XML file to BXM
    XmlToBxm {
        /// Input XML file
        #[arg(short, long)]
        input: PathBuf,

        /// Output BXM file
        #[arg(short, long)]
        output: PathBuf,

        /// Store strings as UTF-8 instead of Shift-JIS
        #[arg(long)]
        utf8: bool,
    },

    /// Pack a folder into a DAT archive
    DatPack {
        /// Input directory
        #[arg(short, long)]
        input: PathBuf,

        /// Output DAT file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Decode a file and encode it again
    Repack {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let extractor = Extractor::new(cli.options.extract_options());

    match cli.command {
        Commands::List {
            input,
            filter,
            resolve,
            json,
        } => {
            cmd_list(&extractor, &input, filter.as_deref(), resolve, json)?;
        }
        Commands::Extract { input, output, filter } => {
            cmd_extract(&extractor, &input, &output, filter.as_deref())?;
        }
        Commands::BxmToXml { input, output } => {
            cmd_bxm_to_xml(&extractor, &input, &output)?;
        }
        Commands::XmlToBxm { input, output, utf8 } => {
            cmd_xml_to_bxm(&input, &output, utf8)?;
        }
        Commands::DatPack { input, output } => {
            cmd_dat_pack(&input, &output)?;
        }
        Commands::Repack { input, output } => {
            cmd_repack(extractor, &input, &output)?;
        }
    }

    Ok(())
}

fn open(extractor: &Extractor, path: &Path) -> Result<Extracted> {
    let start = Instant::now();
    let source = ByteSource::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let extracted = extractor
        .extract(source)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    log::info!("Decoded {} as {} in {:?}", extracted.name, extracted.codec, start.elapsed());
    Ok(extracted)
}

fn resolve_partials(extractor: &Extractor, extracted: &mut Extracted) -> Result<()> {
    let total = extracted.partial_count();
    if total == 0 {
        return Ok(());
    }

    let pb = progress_bar(total as u64)?;
    let mut resolved = 0;
    for node in &mut extracted.nodes {
        resolved += extractor.resolve_all(node).context("Failed to decompress entry")?;
        pb.set_position(resolved.min(total) as u64);
    }
    pb.finish_and_clear();
    log::info!("Decompressed {} entries", resolved);
    Ok(())
}

fn cmd_list(extractor: &Extractor, input: &Path, filter: Option<&str>, resolve: bool, json: bool) -> Result<()> {
    let mut extracted = open(extractor, input)?;
    if resolve {
        resolve_partials(extractor, &mut extracted)?;
    }

    let filter = filter.map(Pattern::new).transpose().context("Invalid filter pattern")?;
    let rows: Vec<_> = extracted
        .listing()
        .into_iter()
        .filter(|row| filter.as_ref().map_or(true, |p| glob_match(p, &row.path)))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in &rows {
        let codec = row.codec.map(|c| c.to_string()).unwrap_or_default();
        let size = row.size.map(|s| s.to_string()).unwrap_or_default();
        println!(
            "{:>12} {:<4} {} {}{}",
            size,
            codec,
            if row.partial { "P" } else { " " },
            row.path,
            if row.directory { "/" } else { "" }
        );
        if let Some(warning) = &row.warning {
            println!("{:>12} warning: {}", "", warning);
        }
    }

    println!("\nTotal: {} entries", rows.len());

    Ok(())
}

fn cmd_extract(extractor: &Extractor, input: &Path, output: &Path, filter: Option<&str>) -> Result<()> {
    let mut extracted = open(extractor, input)?;
    resolve_partials(extractor, &mut extracted)?;

    let filter = filter.map(Pattern::new).transpose().context("Invalid filter pattern")?;
    let mut leaves = Vec::new();
    extracted.walk(&mut |path, node| {
        if let FileNode::Leaf(leaf) = node {
            if filter.as_ref().map_or(true, |p| glob_match(p, path)) {
                leaves.push((path.to_string(), leaf.clone()));
            }
        }
    });

    println!("Extracting {} files...", leaves.len());

    let pb = progress_bar(leaves.len() as u64)?;
    fs::create_dir_all(output)?;

    let start = Instant::now();
    let mut errors = 0;
    for (path, leaf) in &leaves {
        let output_path = output.join(path.replace('/', std::path::MAIN_SEPARATOR_STR));
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let written = match &leaf.content {
            Content::Bxm(document) => document
                .to_xml_string()
                .map_err(anyhow::Error::from)
                .and_then(|xml| Ok(fs::write(output_path.with_extension("xml"), xml)?)),
            _ => extractor
                .repack(&FileNode::Leaf(leaf.clone()))
                .map_err(anyhow::Error::from)
                .and_then(|bytes| Ok(fs::write(&output_path, bytes)?)),
        };
        if let Err(e) = written {
            log::error!("Error extracting {}: {:#}", path, e);
            errors += 1;
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!("Extraction completed in {:?} ({} errors)", start.elapsed(), errors);

    Ok(())
}

fn cmd_bxm_to_xml(extractor: &Extractor, input: &Path, output: &Path) -> Result<()> {
    println!("Converting: {} -> {}", input.display(), output.display());

    let data = fs::read(input).context("Failed to read input file")?;
    let document = BxmDocument::decode_with(&data, &extractor.options().bxm).context("Failed to parse BXM")?;
    let xml = document.to_xml_string().context("Failed to convert to XML")?;
    fs::write(output, xml).context("Failed to write output file")?;

    println!("Conversion complete ({})", document.encoding.label());

    Ok(())
}

fn cmd_xml_to_bxm(input: &Path, output: &Path, utf8: bool) -> Result<()> {
    println!("Converting: {} -> {}", input.display(), output.display());

    let xml = fs::read(input).context("Failed to read input file")?;
    let encoding = if utf8 {
        TextEncoding::Utf8
    } else {
        TextEncoding::ShiftJis
    };
    let document = BxmDocument::from_xml_bytes(&xml, encoding).context("Failed to parse XML")?;
    let bytes = document.encode().context("Failed to encode BXM")?;
    fs::write(output, bytes).context("Failed to write output file")?;

    println!("Conversion complete");

    Ok(())
}

fn cmd_dat_pack(input: &Path, output: &Path) -> Result<()> {
    println!("Packing: {} -> {}", input.display(), output.display());

    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.context("Failed to walk input directory")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(input)?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let data = fs::read(entry.path()).with_context(|| format!("Failed to read {}", entry.path().display()))?;
        files.push(DatFile::new(name, data));
    }

    let bytes = platinum::dat::encode(&files).context("Failed to encode DAT")?;
    fs::write(output, &bytes).context("Failed to write output file")?;

    println!("Packed {} files ({} bytes)", files.len(), bytes.len());

    Ok(())
}

fn cmd_repack(extractor: Extractor, input: &Path, output: &Path) -> Result<()> {
    println!("Repacking: {} -> {}", input.display(), output.display());

    let start = Instant::now();
    let source = ByteSource::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let worker = CodecWorker::spawn(extractor).context("Failed to start codec worker")?;

    let extracted = worker.extract(source).context("Failed to decode input")?;
    let codec = extracted.codec;
    let bytes = worker.repack(extracted).context("Failed to encode output")?;
    fs::write(output, &bytes).context("Failed to write output file")?;

    println!("Repacked {} ({} bytes) in {:?}", codec, bytes.len(), start.elapsed());

    Ok(())
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Case-insensitive glob match against a `/`-separated tree path.
fn glob_match(pattern: &Pattern, path: &str) -> bool {
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    pattern.matches_with(path, options)
}
