use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use genpept_fasta::chunk::{
    ChunkOptions, ChunkTarget, DEFAULT_MINIMUM_OUTPUT_LEN, read_fasta, split_records, write_chunks,
};
use genpept_fasta::error::PipelineError;

#[derive(Parser)]
#[command(name = "split-long-seqs")]
#[command(
    about = "Split FASTA entries longer than a maximum length into PART<n>_ prefixed windows"
)]
#[command(version, author)]
struct Cli {
    /// Input FASTA (may be gzip-compressed)
    #[arg(short = 'i', long = "in-fasta")]
    in_fasta: PathBuf,

    /// Output FASTA, or the output directory with --individual
    #[arg(short = 'o', long = "out-fasta")]
    out_fasta: PathBuf,

    /// Longest sequence written unchanged; longer ones are windowed
    #[arg(short = 'm', long = "max-seq-length")]
    max_seq_length: usize,

    /// Sequences and windows shorter than this are dropped
    #[arg(short = 's', long = "minimum-sequence-output-size", default_value_t = DEFAULT_MINIMUM_OUTPUT_LEN)]
    minimum_sequence_output_size: usize,

    /// Overlap windows by half their length (max length must be even)
    #[arg(short = 'v', long = "overlapping-chunks")]
    overlapping_chunks: bool,

    /// Write each entry to its own `<id>.fasta`
    #[arg(short = 'n', long)]
    individual: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(PipelineError::InvalidChunkConfig(_)) = report.downcast_ref::<PipelineError>() {
            return ExitCode::from(2);
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = ChunkOptions::new(cli.max_seq_length, cli.overlapping_chunks)?
        .with_minimum_output_len(cli.minimum_sequence_output_size);

    let records = read_fasta(&cli.in_fasta)?;
    let chunks = split_records(&records, &options);
    info!(
        input = records.len(),
        output = chunks.len(),
        "split sequences"
    );

    let target = if cli.individual {
        ChunkTarget::Individual(&cli.out_fasta)
    } else {
        ChunkTarget::SingleFile(&cli.out_fasta)
    };
    write_chunks(&chunks, target)?;
    Ok(())
}
