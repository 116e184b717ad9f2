use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::OutputTargets;
use crate::domain::SequenceRecord;
use crate::error::PipelineError;
use crate::fs_util::{create_output, ensure_dir};
use crate::pipeline::{ProgressEvent, ProgressSink, RunSummary};

pub const DELIMITER: &str = "__";
const HEADER_FIELDS: usize = 4;

/// `description__name__organism__taxonId`, checked to split back into
/// exactly four fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header(String);

impl Header {
    pub fn synthesize(record: &SequenceRecord) -> Result<Self, PipelineError> {
        let taxon_id = record.taxon_id.to_string();
        let fields: [&str; HEADER_FIELDS] = [
            &record.description,
            &record.name,
            &record.organism,
            &taxon_id,
        ];
        let header = fields.join(DELIMITER);

        // An edge underscore would merge with the delimiter into `___`.
        if fields.iter().any(|field| {
            field.contains(DELIMITER) || field.starts_with('_') || field.ends_with('_')
        }) {
            return Err(PipelineError::HeaderDelimiter { header });
        }
        Ok(Self(header))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalRecord {
    header: Header,
    family: String,
    sequence: String,
}

impl FinalRecord {
    pub fn from_record(record: SequenceRecord) -> Result<Self, PipelineError> {
        let header = Header::synthesize(&record)?;
        Ok(Self {
            header,
            family: record.family,
            sequence: record.sequence,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    fn write_fasta<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, ">{}", self.header)?;
        writeln!(out, "{}", self.sequence)
    }
}

fn write_error(path: &Utf8Path, err: io::Error) -> PipelineError {
    PipelineError::Filesystem(format!("write {path}: {err}"))
}

pub trait FastaSink {
    fn write(&mut self, record: &FinalRecord) -> Result<(), PipelineError>;
    fn finish(&mut self) -> Result<(), PipelineError>;
}

pub struct SingleFileSink {
    path: Utf8PathBuf,
    writer: Option<BufWriter<fs::File>>,
}

impl SingleFileSink {
    pub fn create(path: &Utf8Path) -> Result<Self, PipelineError> {
        let writer = create_output(path.as_std_path())?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
        })
    }
}

impl FastaSink for SingleFileSink {
    fn write(&mut self, record: &FinalRecord) -> Result<(), PipelineError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PipelineError::Filesystem(format!("{} already closed", self.path)))?;
        record
            .write_fasta(writer)
            .map_err(|err| write_error(&self.path, err))
    }

    fn finish(&mut self) -> Result<(), PipelineError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|err| write_error(&self.path, err))?;
        }
        Ok(())
    }
}

pub struct PerRecordSink {
    dir: Utf8PathBuf,
}

impl PerRecordSink {
    pub fn create(dir: &Utf8Path) -> Result<Self, PipelineError> {
        ensure_dir(dir.as_std_path())?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn record_path(&self, record: &FinalRecord) -> Utf8PathBuf {
        self.dir.join(format!("{}.fasta", record.header()))
    }
}

impl FastaSink for PerRecordSink {
    fn write(&mut self, record: &FinalRecord) -> Result<(), PipelineError> {
        let path = self.record_path(record);
        let mut writer = create_output(path.as_std_path())?;
        record
            .write_fasta(&mut writer)
            .and_then(|_| writer.flush())
            .map_err(|err| write_error(&path, err))
    }

    fn finish(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// One `<family>.fasta` per family. Files are opened the first time their
/// family shows up and closed together, in that same order, by `finish`.
pub struct PerFamilySink {
    dir: Utf8PathBuf,
    writers: Vec<(String, BufWriter<fs::File>)>,
    index: HashMap<String, usize>,
}

impl PerFamilySink {
    pub fn create(dir: &Utf8Path) -> Result<Self, PipelineError> {
        ensure_dir(dir.as_std_path())?;
        Ok(Self {
            dir: dir.to_path_buf(),
            writers: Vec::new(),
            index: HashMap::new(),
        })
    }

    pub fn family_path(&self, family: &str) -> Utf8PathBuf {
        self.dir.join(format!("{family}.fasta"))
    }

    fn writer_for(&mut self, family: &str) -> Result<&mut BufWriter<fs::File>, PipelineError> {
        let slot = match self.index.get(family) {
            Some(slot) => *slot,
            None => {
                let path = self.family_path(family);
                debug!(family, path = %path, "opening family output");
                let writer = create_output(path.as_std_path())?;
                self.writers.push((family.to_string(), writer));
                self.index.insert(family.to_string(), self.writers.len() - 1);
                self.writers.len() - 1
            }
        };
        Ok(&mut self.writers[slot].1)
    }
}

impl FastaSink for PerFamilySink {
    fn write(&mut self, record: &FinalRecord) -> Result<(), PipelineError> {
        let path = self.family_path(record.family());
        let writer = self.writer_for(record.family())?;
        record
            .write_fasta(writer)
            .map_err(|err| write_error(&path, err))
    }

    fn finish(&mut self) -> Result<(), PipelineError> {
        self.index.clear();
        for (family, mut writer) in self.writers.drain(..) {
            let path = self.dir.join(format!("{family}.fasta"));
            writer.flush().map_err(|err| write_error(&path, err))?;
        }
        Ok(())
    }
}

pub struct OutputRouter {
    sinks: Vec<Box<dyn FastaSink>>,
    written: usize,
}

impl fmt::Debug for OutputRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputRouter")
            .field("sinks", &self.sinks.len())
            .field("written", &self.written)
            .finish()
    }
}

impl OutputRouter {
    pub fn from_targets(targets: &OutputTargets) -> Result<Self, PipelineError> {
        if targets.is_empty() {
            return Err(PipelineError::NoOutputConfigured);
        }
        let mut sinks: Vec<Box<dyn FastaSink>> = Vec::new();
        if let Some(path) = &targets.single_output {
            info!(path = %path, "writing all records to one file");
            sinks.push(Box::new(SingleFileSink::create(path)?));
        }
        if let Some(dir) = &targets.per_record_dir {
            info!(dir = %dir, "writing one file per record");
            sinks.push(Box::new(PerRecordSink::create(dir)?));
        }
        if let Some(dir) = &targets.per_family_dir {
            info!(dir = %dir, "writing one file per family");
            sinks.push(Box::new(PerFamilySink::create(dir)?));
        }
        Ok(Self { sinks, written: 0 })
    }

    pub fn with_sinks(sinks: Vec<Box<dyn FastaSink>>) -> Result<Self, PipelineError> {
        if sinks.is_empty() {
            return Err(PipelineError::NoOutputConfigured);
        }
        Ok(Self { sinks, written: 0 })
    }

    pub fn write(&mut self, record: &FinalRecord) -> Result<(), PipelineError> {
        for sink in &mut self.sinks {
            sink.write(record)?;
        }
        self.written += 1;
        Ok(())
    }

    /// Closes every sink; returns the number of records routed.
    pub fn finish(mut self) -> Result<usize, PipelineError> {
        for sink in &mut self.sinks {
            sink.finish()?;
        }
        Ok(self.written)
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
