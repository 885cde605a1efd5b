//! Kanzi entropy CLI - a thin driver over `kanzi-entropy::factory`.
//!
//! Compresses/decompresses a file through a chosen entropy coder kind, or
//! benchmarks every coder kind against a file in one pass. Performs no
//! framing beyond what the factory itself emits: there is no container
//! format here, only the chunked entropy stream (see `kanzi-entropy::factory`).

use clap::{Parser, Subcommand, ValueEnum};
use kanzi_core::bitstream::{BitReader, BitWriter};
use kanzi_core::error::EntropyError;
use kanzi_entropy::factory::{self, EntropyKind, DEFAULT_CHUNK_SIZE};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "kanzi-entropy-cli")]
#[command(author, version, about = "Entropy coding driver for the Kanzi toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file with one entropy coder.
    Encode {
        /// Input file to compress.
        input: PathBuf,
        /// Output file for the compressed stream.
        output: PathBuf,
        /// Entropy coder to use.
        #[arg(short, long, value_enum)]
        coder: CoderArg,
        /// Chunk size in bytes; each chunk is independently decodable.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Log2 of the frequency-table scale used by the range/ANS coders.
        #[arg(long, default_value_t = 14)]
        log_range: u32,
    },

    /// Decompress a file written by `encode`.
    Decode {
        /// Input file to decompress.
        input: PathBuf,
        /// Output file for the decompressed data.
        output: PathBuf,
        /// Entropy coder the input was encoded with (the stream is
        /// self-describing per chunk; this is accepted for symmetry with
        /// `encode` and is not required to match for decoding to succeed).
        #[arg(short, long, value_enum)]
        coder: Option<CoderArg>,
    },

    /// Round-trip a file through every coder kind and report size/timing.
    Bench {
        /// File to benchmark.
        input: PathBuf,
    },
}

/// Entropy coder kind (for clap `ValueEnum`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CoderArg {
    Huffman,
    Range,
    Ans0,
    Ans1,
    Fpaq,
    Cm,
    /// Historical-naming alias for `Cm`.
    Paq,
    Tpaq,
    Tpaqx,
}

impl From<CoderArg> for EntropyKind {
    fn from(arg: CoderArg) -> Self {
        match arg {
            CoderArg::Huffman => EntropyKind::Huffman,
            CoderArg::Range => EntropyKind::Range,
            CoderArg::Ans0 => EntropyKind::Ans0,
            CoderArg::Ans1 => EntropyKind::Ans1,
            CoderArg::Fpaq => EntropyKind::Fpaq,
            CoderArg::Cm => EntropyKind::Cm,
            CoderArg::Paq => EntropyKind::Paq,
            CoderArg::Tpaq => EntropyKind::Tpaq,
            CoderArg::Tpaqx => EntropyKind::TpaqX,
        }
    }
}

fn cmd_encode(
    input: &PathBuf,
    output: &PathBuf,
    coder: CoderArg,
    chunk_size: usize,
    log_range: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input)?;
    let out = BufWriter::new(File::create(output)?);
    let mut writer = BitWriter::new(out);
    factory::compress(&mut writer, coder.into(), &data, chunk_size, log_range)?;
    writer.close()?;

    let compressed_len = writer.bits_written().div_ceil(8);
    println!(
        "{} -> {} ({} -> {} bytes, {:.1}%)",
        input.display(),
        output.display(),
        data.len(),
        compressed_len,
        if data.is_empty() {
            0.0
        } else {
            100.0 * compressed_len as f64 / data.len() as f64
        }
    );
    Ok(())
}

fn cmd_decode(input: &PathBuf, output: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let file = BufReader::new(File::open(input)?);
    let mut reader = BitReader::new(file);
    let data = factory::decompress(&mut reader)?;
    std::fs::write(output, &data)?;
    println!("{} -> {} ({} bytes)", input.display(), output.display(), data.len());
    Ok(())
}

fn cmd_bench(input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input)?;
    let kinds = [
        EntropyKind::Huffman,
        EntropyKind::Range,
        EntropyKind::Ans0,
        EntropyKind::Ans1,
        EntropyKind::Fpaq,
        EntropyKind::Cm,
        EntropyKind::Paq,
        EntropyKind::Tpaq,
        EntropyKind::TpaqX,
    ];

    println!("Benchmark: {} ({} bytes)", input.display(), data.len());
    println!("===================================================");
    println!(
        "{:<10} {:>12} {:>8} {:>12} {:>12}",
        "coder", "bytes", "ratio", "encode", "decode"
    );

    for kind in kinds {
        let encode_start = Instant::now();
        let mut buf = Vec::new();
        let mut writer = BitWriter::new(&mut buf);
        factory::compress(&mut writer, kind, &data, DEFAULT_CHUNK_SIZE, 14)?;
        writer.close()?;
        let encode_time = encode_start.elapsed();

        let decode_start = Instant::now();
        let mut reader = BitReader::new(std::io::Cursor::new(&buf));
        let decoded = factory::decompress(&mut reader)?;
        let decode_time = decode_start.elapsed();

        if decoded != data {
            return Err(Box::new(EntropyError::invalid_stream(
                0,
                format!("{kind:?} failed to round-trip"),
            )));
        }

        let ratio = if data.is_empty() {
            0.0
        } else {
            100.0 * buf.len() as f64 / data.len() as f64
        };
        println!(
            "{:<10} {:>12} {:>7.1}% {:>10.2?} {:>10.2?}",
            format!("{kind:?}"),
            buf.len(),
            ratio,
            encode_time,
            decode_time
        );
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Encode {
            input,
            output,
            coder,
            chunk_size,
            log_range,
        } => cmd_encode(&input, &output, coder, chunk_size, log_range),
        Commands::Decode { input, output, coder: _ } => cmd_decode(&input, &output),
        Commands::Bench { input } => cmd_bench(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
