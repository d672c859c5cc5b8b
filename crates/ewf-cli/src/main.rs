//! `ewf` - thin command-line front-end over the handle API.
//!
//! Exercises `Handle::open_read`/`open_write`/`close` the way a real
//! acquisition or triage tool would, but does none of the container
//! logic itself; everything here is a few lines of glue around
//! `ewf_handle`/`ewf_format`.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ewf_format::segment_file::SegmentFileKind;
use ewf_format::segment_table;
use ewf_format::CompressionLevel;
use ewf_handle::{EngineConfig, Handle, Hasher, MediaFlags, MediaType, MediaValues};
use std::path::{Path, PathBuf};

fn parse_compression_level(text: &str) -> std::result::Result<CompressionLevel, String> {
    match text {
        "none" => Ok(CompressionLevel::None),
        "fast" => Ok(CompressionLevel::Fast),
        "default" => Ok(CompressionLevel::Default),
        "best" => Ok(CompressionLevel::Best),
        other => Err(format!("unknown compression level '{other}'; expected none/fast/default/best")),
    }
}

#[derive(Parser)]
#[command(name = "ewf", about = "Inspect, verify, export, and acquire EWF disk images", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print media values and segment-file layout for an existing image.
    Info { image: PathBuf },
    /// Re-hash the media and compare it against the stored hash section.
    Verify { image: PathBuf },
    /// Stream the decoded media to a raw output file.
    Export { image: PathBuf, out: PathBuf },
    /// Acquire a source into a new EWF1 image set.
    Acquire {
        source: PathBuf,
        image_base: PathBuf,
        #[arg(long, default_value_t = 64)]
        sectors_per_chunk: u32,
        #[arg(long, default_value_t = 2u64 * 1024 * 1024 * 1024)]
        segment_size: u64,
        /// Chunk compression level: none, fast, default, or best.
        #[arg(long, value_parser = parse_compression_level, default_value = "default")]
        compression: CompressionLevel,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Info { image } => cmd_info(&image),
        Command::Verify { image } => cmd_verify(&image),
        Command::Export { image, out } => cmd_export(&image, &out),
        Command::Acquire { source, image_base, sectors_per_chunk, segment_size, compression } => {
            cmd_acquire(&source, &image_base, sectors_per_chunk, segment_size, compression)
        }
    }
}

/// First segment file of a set only tells us its extension's first
/// character; the exact four-byte signature inside it is what actually
/// decides EWF1 vs EWF2, but `segment_table::glob` needs a `kind` to know
/// the extension family before it can even open that first file. This is
/// the one guess the CLI has to make from the path alone.
fn kind_from_first_segment(path: &Path) -> Result<SegmentFileKind> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .context("image path has no extension (expected .E01/.L01/.d01)")?;
    let mut chars = ext.chars();
    match chars.next() {
        Some('E') => Ok(SegmentFileKind::Ewf1Image),
        Some('L') => Ok(SegmentFileKind::Ewf1Logical),
        Some('d') => Ok(SegmentFileKind::Ewf1Delta),
        _ => bail!("unrecognized segment file extension '.{ext}'; expected .E01/.L01/.d01"),
    }
}

fn base_path_of(first_segment: &Path) -> PathBuf {
    match first_segment.extension() {
        Some(_) => first_segment.with_extension(""),
        None => first_segment.to_path_buf(),
    }
}

fn open_for_read(image: &Path) -> Result<Handle> {
    let kind = kind_from_first_segment(image)?;
    let base = base_path_of(image);
    let paths = segment_table::glob(&base, kind).context("globbing segment files")?;
    if paths.is_empty() {
        bail!("no segment files found for {}", base.display());
    }
    Handle::open_read(paths, EngineConfig::default()).context("opening image for reading")
}

fn cmd_info(image: &Path) -> Result<()> {
    let handle = open_for_read(image)?;
    let media = handle.media();
    println!("Media type:        {}", media.media_type);
    println!("Media flags:       {:?}", media.media_flags);
    println!("Bytes per sector:  {}", media.bytes_per_sector);
    println!("Number of sectors: {}", media.number_of_sectors);
    println!("Sectors per chunk: {}", media.sectors_per_chunk);
    println!("Media size:        {} bytes", handle.media_size()?);
    println!("Chunk size:        {} bytes", handle.chunk_size()?);
    println!("Number of chunks:  {}", handle.number_of_chunks());
    println!("Set identifier:    {}", media.set_identifier);

    match handle.stored_hash() {
        Some(hash) => {
            println!("Stored MD5:        {}", hash.md5_hex());
            if let Some(sha1) = hash.sha1_hex() {
                println!("Stored SHA-1:      {sha1}");
            }
        }
        None => println!("Stored hash:       (none recorded)"),
    }

    Ok(())
}

fn cmd_verify(image: &Path) -> Result<()> {
    let handle = open_for_read(image)?;
    let stored = handle
        .stored_hash()
        .context("image has no stored hash section to verify against")?;

    let media_size = handle.media_size()?;
    let mut hasher = Hasher::all();
    let mut offset = 0u64;
    const STRIDE: usize = 1024 * 1024;

    while offset < media_size {
        let take = STRIDE.min((media_size - offset) as usize);
        let bytes = handle.read_buffer(offset, take)?;
        hasher.update(&bytes);
        offset += bytes.len() as u64;
    }

    let computed = hasher.finalize();
    let computed_md5 = computed
        .iter()
        .find(|r| r.algorithm == ewf_handle::HashAlgorithm::Md5)
        .context("MD5 missing from computed digest set")?;

    if computed_md5.hex == stored.md5_hex() {
        println!("MD5 OK: {}", computed_md5.hex);
        Ok(())
    } else {
        bail!("MD5 mismatch: stored {} != computed {}", stored.md5_hex(), computed_md5.hex);
    }
}

fn cmd_export(image: &Path, out: &Path) -> Result<()> {
    use std::io::Write;

    let handle = open_for_read(image)?;
    let media_size = handle.media_size()?;
    let mut file = std::fs::File::create(out).with_context(|| format!("creating {}", out.display()))?;

    let mut offset = 0u64;
    const STRIDE: usize = 1024 * 1024;
    while offset < media_size {
        let take = STRIDE.min((media_size - offset) as usize);
        let bytes = handle.read_buffer(offset, take)?;
        file.write_all(&bytes)?;
        offset += bytes.len() as u64;
    }

    println!("Exported {media_size} bytes to {}", out.display());
    Ok(())
}

fn cmd_acquire(source: &Path, image_base: &Path, sectors_per_chunk: u32, segment_size: u64, compression: CompressionLevel) -> Result<()> {
    use std::io::Read;

    let mut source_file = std::fs::File::open(source).with_context(|| format!("opening {}", source.display()))?;
    let source_len = source_file.metadata()?.len();

    let mut config = EngineConfig::default();
    config.sectors_per_chunk = sectors_per_chunk;
    config.max_segment_size = segment_size;
    config.compression_level = compression;
    let chunk_size = config.chunk_size()?;
    let number_of_sectors = source_len / config.bytes_per_sector as u64;

    let media = MediaValues::new(MediaType::Fixed, MediaFlags::PHYSICAL, config.bytes_per_sector, number_of_sectors, sectors_per_chunk)
        .context("constructing media values for acquisition")?;

    let handle = Handle::open_write(image_base, SegmentFileKind::Ewf1Image, media, config)?;

    let mut buf = vec![0u8; chunk_size as usize];
    loop {
        let n = source_file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        handle.write_buffer(&buf[..n])?;
    }

    handle.close()?;
    println!("Acquired {} bytes from {} into {}.E01", source_len, source.display(), image_base.display());
    Ok(())
}
