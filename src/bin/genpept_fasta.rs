use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use genpept_fasta::config::{ConfigLoader, ConfigOverrides, ResolvedConfig, TaxonomySource};
use genpept_fasta::error::PipelineError;
use genpept_fasta::genpept::read_genpept;
use genpept_fasta::output::{JsonOutput, OutputRouter};
use genpept_fasta::pipeline::{LogProgress, Pipeline, ProgressSink, RunSummary};
use genpept_fasta::taxonomy::{
    DatasetsTaxonomyClient, OfflineTaxonomy, TaxdumpTaxonomy, TaxonomyClient,
};

#[derive(Parser)]
#[command(name = "genpept-fasta")]
#[command(
    about = "Convert GenPept records into FASTA with `description__name__organism__taxonID` headers, splitting polyproteins into mature peptides"
)]
#[command(version, author)]
struct Cli {
    /// GenPept input (may be gzip-compressed)
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Write every record to this file
    #[arg(short = 's', long = "single-output")]
    single_output: Option<PathBuf>,

    /// Write one `<header>.fasta` per record into this directory
    #[arg(short = 'm', long = "per-record-dir")]
    per_record_dir: Option<PathBuf>,

    /// Write one `<family>.fasta` per taxonomic family into this directory
    #[arg(short = 'f', long = "per-family-dir")]
    per_family_dir: Option<PathBuf>,

    /// Shortest polyprotein stretch without a mature peptide that is still emitted
    #[arg(long)]
    minimum_uncovered_length: Option<usize>,

    /// Fail on polyproteins whose mature peptides only partly carry a protein_id
    #[arg(long)]
    strict_protein_ids: bool,

    /// NCBI taxdump directory holding nodes.dmp and names.dmp
    #[arg(long, conflicts_with = "offline")]
    taxdump: Option<PathBuf>,

    /// Skip taxonomy lookups; every record gets taxon X and unknown_family
    #[arg(long)]
    offline: bool,

    /// Look up every record's organism, even repeated ones
    #[arg(long)]
    no_cache: bool,

    /// JSON config file; command-line flags take precedence
    #[arg(long)]
    config: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<PipelineError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PipelineError) -> u8 {
    match error {
        PipelineError::MissingInput
        | PipelineError::NoOutputConfigured
        | PipelineError::ConfigRead(_)
        | PipelineError::ConfigParse(_) => 2,
        PipelineError::InputParse { .. }
        | PipelineError::MissingField { .. }
        | PipelineError::InvalidRange { .. }
        | PipelineError::MixedProteinIds { .. }
        | PipelineError::HeaderDelimiter { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        input: cli.input,
        single_output: cli.single_output,
        per_record_dir: cli.per_record_dir,
        per_family_dir: cli.per_family_dir,
        minimum_uncovered_length: cli.minimum_uncovered_length,
        strict_protein_ids: cli.strict_protein_ids,
        no_cache: cli.no_cache,
        taxdump_dir: cli.taxdump,
        offline: cli.offline,
    };
    let config = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;
    // Sinks are created before any record is read.
    let router = OutputRouter::from_targets(&config.outputs)?;

    let client: Box<dyn TaxonomyClient> = match &config.taxonomy {
        TaxonomySource::Offline => Box::new(OfflineTaxonomy),
        TaxonomySource::Taxdump(dir) => Box::new(TaxdumpTaxonomy::load(dir)?),
        TaxonomySource::Datasets => Box::new(DatasetsTaxonomyClient::new()?),
    };

    let summary = run_pipeline(&config, client, router, &LogProgress)?;
    if cli.json {
        JsonOutput::print_summary(&summary).into_diagnostic()?;
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn run_pipeline<C: TaxonomyClient>(
    config: &ResolvedConfig,
    client: C,
    router: OutputRouter,
    sink: &dyn ProgressSink,
) -> Result<RunSummary, PipelineError> {
    let records = read_genpept(&config.input)?;
    Pipeline::from_config(config, client).run(records, router, sink)
}

fn print_summary(summary: &RunSummary) {
    println!("records read:            {}", summary.records_read);
    println!("polyproteins decomposed: {}", summary.polyproteins_decomposed);
    println!("mature peptides:         {}", summary.mature_peptides);
    println!("uncovered regions:       {}", summary.uncovered_regions);
    println!("duplicates dropped:      {}", summary.duplicates_dropped);
    println!("unresolved organisms:    {}", summary.unresolved_records);
    println!("records written:         {}", summary.records_written);
    for (family, count) in &summary.families {
        println!("  {family}: {count}");
    }
}
