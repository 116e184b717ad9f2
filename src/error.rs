use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("no input file given (use --input or the `input` config key)")]
    MissingInput,

    #[error(
        "no output configured: at least one of --single-output, --per-record-dir or --per-family-dir is required"
    )]
    NoOutputConfigured,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to parse {path}: {message}")]
    InputParse { path: PathBuf, message: String },

    #[error("record {record} has a mature peptide without the `{field}` qualifier")]
    MissingField { record: String, field: String },

    #[error(
        "record {record} has a mature peptide with invalid range {start}..{end} (sequence length {len})"
    )]
    InvalidRange {
        record: String,
        start: i64,
        end: i64,
        len: usize,
    },

    #[error("record {record} mixes mature peptides with and without protein_id")]
    MixedProteinIds { record: String },

    #[error("header contains the `__` delimiter inside a field: {header}")]
    #[diagnostic(help("every header must have exactly four `__`-separated fields"))]
    HeaderDelimiter { header: String },

    #[error("invalid taxon id: {0}")]
    InvalidTaxonId(String),

    #[error("taxonomy lookup failed: {0}")]
    Taxonomy(String),

    #[error("NCBI request failed: {0}")]
    NcbiHttp(String),

    #[error("NCBI returned status {status}: {message}")]
    NcbiStatus { status: u16, message: String },

    #[error("invalid chunking parameters: {0}")]
    InvalidChunkConfig(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
