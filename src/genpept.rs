use std::io::Read;
use std::path::Path;

use gb_io::reader::SeqReader;
use gb_io::seq::{Location, Seq};
use tracing::info;

use crate::domain::{Feature, FeatureKind, SequenceRecord};
use crate::error::PipelineError;
use crate::fs_util::open_input;

pub fn read_genpept(path: &Path) -> Result<Vec<SequenceRecord>, PipelineError> {
    let records = parse_genpept(open_input(path)?, path)?;
    info!(path = %path.display(), records = records.len(), "read GenPept input");
    Ok(records)
}

pub fn parse_genpept<R: Read>(reader: R, path: &Path) -> Result<Vec<SequenceRecord>, PipelineError> {
    SeqReader::new(reader)
        .map(|seq| {
            let seq = seq.map_err(|err| PipelineError::InputParse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
            to_record(seq, path)
        })
        .collect()
}

fn to_record(seq: Seq, path: &Path) -> Result<SequenceRecord, PipelineError> {
    let name = seq
        .name
        .clone()
        .or_else(|| seq.accession.clone())
        .ok_or_else(|| PipelineError::InputParse {
            path: path.to_path_buf(),
            message: "record without LOCUS name or accession".to_string(),
        })?;
    let description = seq.definition.clone().unwrap_or_default();
    let organism = seq
        .source
        .as_ref()
        .and_then(|source| source.organism.as_deref())
        .and_then(|organism| organism.lines().next())
        .map(|organism| organism.trim().to_string())
        .unwrap_or_default();
    let sequence = String::from_utf8_lossy(&seq.seq).to_uppercase();

    let features = seq
        .features
        .iter()
        .map(|feature| {
            // Only a single span can be cut out; joins and unbounded
            // locations become an invalid range for the decomposer to reject.
            let (start, end) = match feature.location {
                Location::Range(..) => feature.location.find_bounds().unwrap_or((-1, -1)),
                _ => (-1, -1),
            };
            Feature {
                kind: FeatureKind::from_key(&feature.kind.to_string()),
                start,
                end,
                product: first_qualifier(feature, "product"),
                protein_id: first_qualifier(feature, "protein_id"),
            }
        })
        .collect();

    Ok(SequenceRecord::new(&name, &description, &organism, &sequence).with_features(features))
}

fn first_qualifier(feature: &gb_io::seq::Feature, key: &str) -> Option<String> {
    feature
        .qualifier_values(key.into())
        .next()
        .map(|value| value.split_whitespace().collect::<Vec<_>>().join(" "))
}
