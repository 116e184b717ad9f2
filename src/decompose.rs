use std::ops::Range;

use tracing::debug;

use crate::domain::{Feature, Provenance, SequenceRecord};
use crate::error::PipelineError;

pub const DEFAULT_MINIMUM_UNCOVERED_LENGTH: usize = 50;

/// Splits polyproteins into their mature peptides plus any long stretch
/// that no mature peptide claims.
#[derive(Debug, Clone)]
pub struct Decomposer {
    minimum_uncovered_length: usize,
    strict_protein_ids: bool,
}

impl Default for Decomposer {
    fn default() -> Self {
        Self::new(DEFAULT_MINIMUM_UNCOVERED_LENGTH)
    }
}

impl Decomposer {
    pub fn new(minimum_uncovered_length: usize) -> Self {
        Self {
            minimum_uncovered_length,
            strict_protein_ids: false,
        }
    }

    pub fn strict_protein_ids(mut self, strict: bool) -> Self {
        self.strict_protein_ids = strict;
        self
    }

    pub fn decompose(&self, parent: SequenceRecord) -> Result<Vec<SequenceRecord>, PipelineError> {
        let peptides = parent
            .features
            .iter()
            .filter(|feature| feature.is_mature_peptide())
            .collect::<Vec<_>>();

        if peptides.is_empty() {
            return Ok(vec![SequenceRecord {
                provenance: Provenance::Original,
                ..parent
            }]);
        }

        if self.strict_protein_ids {
            let declared = peptides.iter().filter(|f| f.protein_id.is_some()).count();
            if declared != 0 && declared != peptides.len() {
                return Err(PipelineError::MixedProteinIds {
                    record: parent.name.clone(),
                });
            }
        }

        let mut out = Vec::with_capacity(peptides.len() + 1);
        let mut ranges = Vec::with_capacity(peptides.len());
        for feature in &peptides {
            let (child, range) = extract_child(&parent, feature)?;
            out.push(child);
            ranges.push(range);
        }

        let covered = merge_ranges(ranges);
        for run in uncovered_runs(&covered, parent.len()) {
            if run.len() < self.minimum_uncovered_length {
                debug!(
                    record = %parent.name,
                    start = run.start,
                    end = run.end,
                    "dropping short uncovered run"
                );
                continue;
            }
            let residues =
                parent
                    .sequence
                    .get(run.clone())
                    .ok_or_else(|| PipelineError::InvalidRange {
                        record: parent.name.clone(),
                        start: run.start as i64,
                        end: run.end as i64,
                        len: parent.len(),
                    })?;
            out.push(parent.derive(
                format!("{}_{}-{}", parent.name, run.start, run.end),
                format!("uncovered_polypeptide_{}", parent.description),
                residues,
                Provenance::DecomposedResidual,
            ));
        }

        debug!(
            record = %parent.name,
            peptides = peptides.len(),
            emitted = out.len(),
            "decomposed polyprotein"
        );
        Ok(out)
    }
}

fn extract_child(
    parent: &SequenceRecord,
    feature: &Feature,
) -> Result<(SequenceRecord, Range<usize>), PipelineError> {
    let product = feature
        .product
        .as_deref()
        .ok_or_else(|| PipelineError::MissingField {
            record: parent.name.clone(),
            field: "product".to_string(),
        })?;

    let invalid = || PipelineError::InvalidRange {
        record: parent.name.clone(),
        start: feature.start,
        end: feature.end,
        len: parent.len(),
    };
    let range = feature.checked_range(parent.len()).ok_or_else(invalid)?;
    let residues = parent.sequence.get(range.clone()).ok_or_else(invalid)?;

    let name = match feature.protein_id.as_deref() {
        Some(protein_id) => strip_version(protein_id).to_string(),
        None => format!("{}_{}", parent.name, product),
    };

    let child = parent.derive(
        name,
        product.to_string(),
        residues,
        Provenance::DecomposedChild,
    );
    Ok((child, range))
}

fn strip_version(accession: &str) -> &str {
    accession
        .split_once('.')
        .map(|(base, _)| base)
        .unwrap_or(accession)
}

/// Union of `ranges` as sorted, disjoint runs. Overlapping and touching
/// ranges collapse into one run.
pub fn merge_ranges(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    ranges.retain(|range| !range.is_empty());
    ranges.sort_by_key(|range| (range.start, range.end));

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Maximal runs of `[0, len)` not covered by `covered`, which must be the
/// output of [`merge_ranges`].
pub fn uncovered_runs(covered: &[Range<usize>], len: usize) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut cursor = 0;
    for range in covered {
        let start = range.start.min(len);
        if start > cursor {
            runs.push(cursor..start);
        }
        cursor = cursor.max(range.end.min(len));
    }
    if cursor < len {
        runs.push(cursor..len);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_a_union_not_a_sum() {
        let merged = merge_ranges(vec![0..100, 50..150]);
        assert_eq!(merged, vec![0..150]);
        let covered: usize = merged.iter().map(|r| r.len()).sum();
        assert_eq!(covered, 150);
    }

    #[test]
    fn merge_joins_adjacent_and_sorts() {
        let merged = merge_ranges(vec![200..250, 0..10, 10..20, 30..40, 35..36]);
        assert_eq!(merged, vec![0..20, 30..40, 200..250]);
    }

    #[test]
    fn uncovered_runs_cover_gaps_and_tails() {
        let runs = uncovered_runs(&[10..20, 30..40], 50);
        assert_eq!(runs, vec![0..10, 20..30, 40..50]);
        assert!(uncovered_runs(&[0..50], 50).is_empty());
        assert_eq!(uncovered_runs(&[], 5), vec![0..5]);
    }

    #[test]
    fn strip_version_keeps_base_accession() {
        assert_eq!(strip_version("YP_009725297.1"), "YP_009725297");
        assert_eq!(strip_version("YP_009725297"), "YP_009725297");
    }
}
