//! Argument parsing and stdio/file/gzip glue for the `popvcf` binary
//! (ground: `anni`'s `clap::Parser` derive CLI, reshaped around this crate's
//! two subcommands).

use clap::{Args, Parser, Subcommand, ValueEnum};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use popvcf_base::Result;
use popvcf_core::{parse_region, run_decode, run_encode, DecodeState, EncodeState};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "popvcf", version, about = "Streaming codec for a compressed VCF dialect")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a VCF stream into the compressed dialect.
    Encode(EncodeArgs),
    /// Decode a compressed stream back into VCF.
    Decode(DecodeArgs),
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Input file; omitted or `-` reads stdin.
    pub input: Option<PathBuf>,

    #[arg(short = 'I', long = "input-format", value_enum, default_value_t = InputFormat::Guess)]
    pub input_format: InputFormat,

    /// Output file; omitted writes stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    #[arg(short = 'O', long = "output-format", value_enum, default_value_t = OutputFormat::Vcf)]
    pub output_format: OutputFormat,

    /// gzip compression level, used when `-O z`.
    #[arg(short = 'l', long = "compression-level", default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=9))]
    pub compression_level: u32,

    /// Accepted for interface compatibility with multi-threaded bgzf
    /// encoders; this implementation runs a single synchronous deflate
    /// stream regardless of the value given.
    #[arg(short = '@', long = "threads", default_value_t = 1)]
    pub threads: usize,

    /// Disable cross-line back-references: every line is encoded as if it
    /// were the first data line.
    #[arg(long)]
    pub no_previous_line: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Input file; omitted or `-` reads stdin.
    pub input: Option<PathBuf>,

    #[arg(short = 'I', long = "input-format", value_enum, default_value_t = InputFormat::Guess)]
    pub input_format: InputFormat,

    /// Restrict output to `chrom[:begin[-end]]`.
    #[arg(short = 'r', long = "region")]
    pub region: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    /// Plain, uncompressed text.
    #[value(name = "v")]
    Vcf,
    /// gzip-compressed text.
    #[value(name = "z")]
    Gz,
    /// Sniff the gzip magic bytes off the stream itself.
    #[value(name = "g")]
    Guess,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain, uncompressed text.
    #[value(name = "v")]
    Vcf,
    /// gzip-compressed text.
    #[value(name = "z")]
    Gz,
}

/// Initializes the global tracing subscriber from `RUST_LOG`, following the
/// teacher's plain `tracing`/`tracing-subscriber` setup (ground:
/// `submerge-base`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Encode(args) => encode(args),
        Command::Decode(args) => decode(args),
    }
}

fn encode(args: EncodeArgs) -> Result<()> {
    if args.threads > 1 {
        debug!(
            threads = args.threads,
            "multiple threads requested; this implementation uses a single synchronous deflate stream"
        );
    }

    let mut source = open_input(args.input.as_deref(), args.input_format)?;
    let mut sink = open_output(args.output.as_deref(), args.output_format, args.compression_level)?;
    let mut state = EncodeState::with_no_previous_line(args.no_previous_line);
    run_encode(&mut state, &mut source, &mut sink)?;
    sink.finish()
}

fn decode(args: DecodeArgs) -> Result<()> {
    let region = args.region.as_deref().map(parse_region).transpose()?;
    let mut source = open_input(args.input.as_deref(), args.input_format)?;
    let mut sink = io::BufWriter::new(io::stdout());
    let mut state = DecodeState::new(region);
    run_decode(&mut state, &mut source, &mut sink)?;
    Ok(sink.flush()?)
}

/// Either a plain file/stdin reader or a gzip-wrapped one, hidden behind a
/// single `Box<dyn Read>` seam so the driver never needs to know which.
fn open_input(path: Option<&Path>, format: InputFormat) -> Result<Box<dyn Read>> {
    let raw: Box<dyn Read> = match path {
        Some(path) if path != Path::new("-") => Box::new(BufReader::new(File::open(path)?)),
        _ => Box::new(BufReader::new(io::stdin())),
    };

    match format {
        InputFormat::Vcf => Ok(raw),
        InputFormat::Gz => Ok(Box::new(MultiGzDecoder::new(raw))),
        InputFormat::Guess => sniff_gzip(raw),
    }
}

/// Peeks the first two bytes for the gzip magic number (`1f 8b`), then
/// stitches them back onto the front of the stream either way so the caller
/// never loses them.
fn sniff_gzip(mut raw: Box<dyn Read>) -> Result<Box<dyn Read>> {
    let mut magic = [0u8; 2];
    let mut filled = 0;
    while filled < magic.len() {
        let n = raw.read(&mut magic[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    let prefix = Cursor::new(magic[..filled].to_vec());
    let chained: Box<dyn Read> = Box::new(prefix.chain(raw));

    if filled == 2 && magic == [0x1f, 0x8b] {
        Ok(Box::new(MultiGzDecoder::new(chained)))
    } else {
        Ok(chained)
    }
}

/// A gzip member needs an explicit `finish()` to flush its trailing deflate
/// block and CRC footer; a plain `flush()` is not enough to produce a valid
/// gzip stream, so the two output kinds can't just share a `Box<dyn Write>`.
enum OutputSink {
    Plain(Box<dyn Write>),
    Gz(GzEncoder<Box<dyn Write>>),
}

impl OutputSink {
    fn finish(self) -> Result<()> {
        match self {
            OutputSink::Plain(mut w) => Ok(w.flush()?),
            OutputSink::Gz(w) => {
                w.finish()?;
                Ok(())
            }
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputSink::Plain(w) => w.write(buf),
            OutputSink::Gz(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputSink::Plain(w) => w.flush(),
            OutputSink::Gz(w) => w.flush(),
        }
    }
}

fn open_output(path: Option<&Path>, format: OutputFormat, compression_level: u32) -> Result<OutputSink> {
    let raw: Box<dyn Write> = match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    Ok(match format {
        OutputFormat::Vcf => OutputSink::Plain(raw),
        OutputFormat::Gz => {
            OutputSink::Gz(GzEncoder::new(raw, Compression::new(compression_level)))
        }
    })
}
