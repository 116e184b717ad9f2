//! Fixed-length windowing of long FASTA entries.
//!
//! Structure predictors reject or choke on very long chains, so sequences
//! longer than `max_len` are cut into `max_len` windows, optionally
//! overlapping by half a window. Windows are named `PART<i>_<id>`.

use std::io::Write;
use std::ops::Range;
use std::path::Path;

use bio::io::fasta;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::fs_util::{create_output, ensure_dir, open_input};

pub const DEFAULT_MINIMUM_OUTPUT_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub max_len: usize,
    pub minimum_output_len: usize,
    pub overlapping: bool,
}

impl ChunkOptions {
    pub fn new(max_len: usize, overlapping: bool) -> Result<Self, PipelineError> {
        Self {
            max_len,
            minimum_output_len: DEFAULT_MINIMUM_OUTPUT_LEN,
            overlapping,
        }
        .validated()
    }

    pub fn with_minimum_output_len(mut self, minimum_output_len: usize) -> Self {
        self.minimum_output_len = minimum_output_len;
        self
    }

    pub fn validated(self) -> Result<Self, PipelineError> {
        if self.max_len == 0 {
            return Err(PipelineError::InvalidChunkConfig(
                "max_len must be positive".to_string(),
            ));
        }
        if self.overlapping && self.max_len % 2 != 0 {
            return Err(PipelineError::InvalidChunkConfig(format!(
                "overlapping chunks need an even max_len, got {}",
                self.max_len
            )));
        }
        Ok(self)
    }

    fn step(&self) -> usize {
        if self.overlapping {
            self.max_len - self.max_len / 2
        } else {
            self.max_len
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub sequence: String,
}

/// Window ranges over a sequence of `len` residues. Every start below
/// `len` opens a window, so the tail can appear in more than one window
/// when they overlap.
pub fn windows(len: usize, max_len: usize, step: usize) -> Vec<Range<usize>> {
    (0..len)
        .step_by(step.max(1))
        .map(|start| start..(start + max_len).min(len))
        .collect()
}

pub fn split_sequence(id: &str, sequence: &str, options: &ChunkOptions) -> Vec<Chunk> {
    if sequence.len() <= options.max_len {
        if sequence.len() < options.minimum_output_len {
            debug!(id, len = sequence.len(), "dropping short sequence");
            return Vec::new();
        }
        return vec![Chunk {
            id: id.to_string(),
            sequence: sequence.to_string(),
        }];
    }

    windows(sequence.len(), options.max_len, options.step())
        .into_iter()
        .enumerate()
        .filter(|(_, range)| range.len() >= options.minimum_output_len)
        .filter_map(|(index, range)| {
            sequence.get(range).map(|window| Chunk {
                id: format!("PART{index}_{id}"),
                sequence: window.to_string(),
            })
        })
        .collect()
}

pub fn read_fasta(path: &Path) -> Result<Vec<(String, String)>, PipelineError> {
    let reader = fasta::Reader::new(open_input(path)?);
    reader
        .records()
        .map(|record| {
            let record = record.map_err(|err| PipelineError::InputParse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
            Ok((
                record.id().to_string(),
                String::from_utf8_lossy(record.seq()).into_owned(),
            ))
        })
        .collect()
}

pub fn split_records(records: &[(String, String)], options: &ChunkOptions) -> Vec<Chunk> {
    records
        .iter()
        .flat_map(|(id, sequence)| split_sequence(id, sequence, options))
        .collect()
}

#[derive(Debug, Clone)]
pub enum ChunkTarget<'a> {
    SingleFile(&'a Path),
    Individual(&'a Path),
}

pub fn write_chunks(chunks: &[Chunk], target: ChunkTarget<'_>) -> Result<(), PipelineError> {
    let io_err = |path: &Path, err: std::io::Error| {
        PipelineError::Filesystem(format!("write {}: {err}", path.display()))
    };
    match target {
        ChunkTarget::SingleFile(path) => {
            let mut writer = create_output(path)?;
            for chunk in chunks {
                write!(writer, ">{}\n{}\n", chunk.id, chunk.sequence)
                    .map_err(|err| io_err(path, err))?;
            }
            writer.flush().map_err(|err| io_err(path, err))?;
        }
        ChunkTarget::Individual(dir) => {
            ensure_dir(dir)?;
            for chunk in chunks {
                let path = dir.join(format!("{}.fasta", chunk.id));
                let mut writer = create_output(&path)?;
                write!(writer, ">{}\n{}\n", chunk.id, chunk.sequence)
                    .and_then(|_| writer.flush())
                    .map_err(|err| io_err(&path, err))?;
            }
        }
    }
    info!(chunks = chunks.len(), "wrote chunked FASTA");
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn consecutive_windows() {
        assert_eq!(windows(2300, 1000, 1000), vec![0..1000, 1000..2000, 2000..2300]);
    }

    #[test]
    fn overlapping_windows_repeat_the_tail() {
        assert_eq!(
            windows(2300, 1000, 500),
            vec![0..1000, 500..1500, 1000..2000, 1500..2300, 2000..2300]
        );
    }

    #[test]
    fn odd_overlap_is_rejected() {
        assert_matches!(
            ChunkOptions::new(999, true),
            Err(PipelineError::InvalidChunkConfig(_))
        );
        assert_matches!(
            ChunkOptions::new(0, false),
            Err(PipelineError::InvalidChunkConfig(_))
        );
    }
}
