use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::classify::Classifier;
use crate::config::ResolvedConfig;
use crate::decompose::Decomposer;
use crate::dedup::Deduplicator;
use crate::domain::{Provenance, SequenceRecord, TaxonId};
use crate::error::PipelineError;
use crate::output::{FinalRecord, OutputRouter};
use crate::sanitize::sanitize_record;
use crate::taxonomy::TaxonomyClient;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub records_read: usize,
    pub polyproteins_decomposed: usize,
    pub mature_peptides: usize,
    pub uncovered_regions: usize,
    pub duplicates_dropped: usize,
    pub unresolved_records: usize,
    pub taxonomy_lookups: usize,
    pub records_written: usize,
    pub families: BTreeMap<String, usize>,
}

pub struct Pipeline<C: TaxonomyClient> {
    decomposer: Decomposer,
    classifier: Classifier<C>,
}

impl<C: TaxonomyClient> Pipeline<C> {
    pub fn new(decomposer: Decomposer, classifier: Classifier<C>) -> Self {
        Self {
            decomposer,
            classifier,
        }
    }

    pub fn from_config(config: &ResolvedConfig, client: C) -> Self {
        let decomposer = Decomposer::new(config.minimum_uncovered_length)
            .strict_protein_ids(config.strict_protein_ids);
        let classifier = if config.cache {
            Classifier::new(client)
        } else {
            Classifier::without_cache(client)
        };
        Self::new(decomposer, classifier)
    }

    /// Runs every stage up to header synthesis. Nothing is written, so a
    /// structural or header error leaves no partial output behind.
    pub fn process(
        &mut self,
        records: Vec<SequenceRecord>,
        sink: &dyn ProgressSink,
    ) -> Result<(Vec<FinalRecord>, RunSummary), PipelineError> {
        let mut summary = RunSummary {
            started_at: chrono::Utc::now().to_rfc3339(),
            records_read: records.len(),
            ..RunSummary::default()
        };

        let started = Instant::now();
        let mut decomposed = Vec::with_capacity(records.len());
        for record in records {
            let pieces = self.decomposer.decompose(record)?;
            if pieces
                .iter()
                .any(|piece| piece.provenance != Provenance::Original)
            {
                summary.polyproteins_decomposed += 1;
            }
            for piece in &pieces {
                match piece.provenance {
                    Provenance::DecomposedChild => summary.mature_peptides += 1,
                    Provenance::DecomposedResidual => summary.uncovered_regions += 1,
                    Provenance::Original => {}
                }
            }
            decomposed.extend(pieces);
        }
        sink.event(ProgressEvent {
            message: format!(
                "phase=Decompose; {} polyproteins split into {} mature peptides and {} uncovered regions",
                summary.polyproteins_decomposed, summary.mature_peptides, summary.uncovered_regions
            ),
            elapsed: Some(started.elapsed()),
        });

        let started = Instant::now();
        let classified = decomposed
            .into_iter()
            .map(sanitize_record)
            .map(|record| self.classifier.apply(record))
            .collect::<Vec<_>>();
        summary.taxonomy_lookups = self.classifier.lookups();
        sink.event(ProgressEvent {
            message: format!(
                "phase=Classify; {} records, {} taxonomy lookups",
                classified.len(),
                summary.taxonomy_lookups
            ),
            elapsed: Some(started.elapsed()),
        });

        let mut dedup = Deduplicator::new();
        let mut finals = Vec::with_capacity(classified.len());
        for record in classified {
            let Some(record) = dedup.admit(record) else {
                continue;
            };
            if record.taxon_id == TaxonId::Unresolved {
                summary.unresolved_records += 1;
            }
            *summary.families.entry(record.family.clone()).or_default() += 1;
            finals.push(FinalRecord::from_record(record)?);
        }
        summary.duplicates_dropped = dedup.dropped();
        sink.event(ProgressEvent {
            message: format!(
                "phase=Finalize; {} records kept, {} duplicates dropped",
                finals.len(),
                summary.duplicates_dropped
            ),
            elapsed: None,
        });

        Ok((finals, summary))
    }

    pub fn run(
        &mut self,
        records: Vec<SequenceRecord>,
        mut router: OutputRouter,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, PipelineError> {
        let (finals, mut summary) = self.process(records, sink)?;

        let started = Instant::now();
        for record in &finals {
            router.write(record)?;
        }
        summary.records_written = router.finish()?;
        sink.event(ProgressEvent {
            message: format!("phase=Write; {} records written", summary.records_written),
            elapsed: Some(started.elapsed()),
        });
        Ok(summary)
    }
}
