use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{CanonicalRank, Lineage, SequenceRecord, TaxonId, UNKNOWN_FAMILY};
use crate::taxonomy::TaxonomyClient;

const UNKNOWN_NAME: &str = "UNKNOWN";

/// Resolves free organism text to a taxon id. A miss is retried once with
/// trailing digits and then trailing whitespace removed (`"Foo virus 12"`
/// becomes `"Foo virus"`); anything else ends as [`TaxonId::Unresolved`].
pub fn resolve_organism<C: TaxonomyClient + ?Sized>(client: &C, organism: &str) -> TaxonId {
    if let Some(id) = lookup(client, organism) {
        return TaxonId::Resolved(id);
    }
    let repaired = organism
        .trim_end_matches(|ch: char| ch.is_ascii_digit())
        .trim_end();
    if repaired != organism && !repaired.is_empty() {
        if let Some(id) = lookup(client, repaired) {
            debug!(organism, repaired, taxid = id, "resolved organism after repair");
            return TaxonId::Resolved(id);
        }
    }
    TaxonId::Unresolved
}

fn lookup<C: TaxonomyClient + ?Sized>(client: &C, name: &str) -> Option<u32> {
    match client.name_to_taxid(name) {
        Ok(Some(id)) if id > 0 => Some(id),
        Ok(_) => None,
        Err(err) => {
            debug!(name, error = %err, "taxonomy name lookup failed");
            None
        }
    }
}

/// Projects the taxon's ancestor path onto the nine canonical ranks. Never
/// fails: missing data leaves slots empty.
pub fn canonical_lineage<C: TaxonomyClient + ?Sized>(client: &C, taxon: TaxonId) -> Lineage {
    let path = match taxon {
        TaxonId::Resolved(id) => client.lineage(id).unwrap_or_else(|err| {
            warn!(taxid = id, error = %err, "lineage lookup failed");
            vec![id]
        }),
        TaxonId::Unresolved => Vec::new(),
    };

    let labels = path
        .iter()
        .map(|id| client.rank(*id).ok().flatten())
        .collect::<Vec<_>>();

    let mut lineage = Lineage::default();
    for rank in CanonicalRank::ALL {
        let hit = labels
            .iter()
            .position(|label| label.as_deref().is_some_and(|label| rank.matches(label)));
        let Some(index) = hit else {
            continue;
        };
        let name = client
            .scientific_name(path[index])
            .ok()
            .flatten()
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        lineage.set(rank, format!("{}{}", rank.prefix(), name.replace(' ', "_")));
    }
    lineage
}

pub fn family_bucket(lineage: &Lineage) -> String {
    lineage
        .get(CanonicalRank::Family)
        .and_then(|family| family.strip_prefix(CanonicalRank::Family.prefix()))
        .filter(|family| !family.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_FAMILY.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub taxon_id: TaxonId,
    pub lineage: Lineage,
    pub family: String,
}

/// Taxonomy assignment for sanitized records, with an optional
/// per-organism cache so recurring organisms hit the backend once.
pub struct Classifier<C: TaxonomyClient> {
    client: C,
    cache: Option<HashMap<String, Classification>>,
    lookups: usize,
}

impl<C: TaxonomyClient> Classifier<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            cache: Some(HashMap::new()),
            lookups: 0,
        }
    }

    pub fn without_cache(client: C) -> Self {
        Self {
            client,
            cache: None,
            lookups: 0,
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups
    }

    /// `organism` is sanitized text; underscores stand for spaces.
    pub fn classify(&mut self, organism: &str) -> Classification {
        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(organism)) {
            debug!(organism, "classification cache hit");
            return hit.clone();
        }

        self.lookups += 1;
        let query = organism.replace('_', " ");
        let taxon_id = resolve_organism(&self.client, query.trim());
        if taxon_id == TaxonId::Unresolved {
            warn!(organism, "organism could not be resolved to a taxon id");
        }
        let lineage = canonical_lineage(&self.client, taxon_id);
        let family = family_bucket(&lineage);
        let classification = Classification {
            taxon_id,
            lineage,
            family,
        };

        if let Some(cache) = self.cache.as_mut() {
            cache.insert(organism.to_string(), classification.clone());
        }
        classification
    }

    pub fn apply(&mut self, record: SequenceRecord) -> SequenceRecord {
        let classification = self.classify(&record.organism);
        SequenceRecord {
            taxon_id: classification.taxon_id,
            family: classification.family,
            ..record
        }
    }
}
