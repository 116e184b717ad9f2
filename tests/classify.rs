use std::collections::HashMap;
use std::sync::Mutex;

use genpept_fasta::classify::{Classifier, canonical_lineage, family_bucket, resolve_organism};
use genpept_fasta::domain::{CanonicalRank, TaxonId, UNKNOWN_FAMILY};
use genpept_fasta::error::PipelineError;
use genpept_fasta::taxonomy::TaxonomyClient;

#[derive(Default)]
struct MockTaxonomy {
    names: HashMap<String, u32>,
    nodes: HashMap<u32, (u32, String, String)>,
    name_calls: Mutex<Vec<String>>,
}

impl MockTaxonomy {
    fn viruses() -> Self {
        let mut taxonomy = Self::default();
        taxonomy.node(1, 1, "no rank", "root");
        taxonomy.node(10239, 1, "superkingdom", "Viruses");
        taxonomy.node(2559587, 10239, "no rank", "Riboviria");
        taxonomy.node(11308, 2559587, "family", "Orthomyxoviridae");
        taxonomy.node(197911, 11308, "genus", "Alphainfluenzavirus");
        taxonomy.node(11320, 197911, "species", "Influenza A virus");
        taxonomy.names.insert("Influenzavirus".to_string(), 197911);
        taxonomy.names.insert("Influenza A virus".to_string(), 11320);
        taxonomy
    }

    fn node(&mut self, taxid: u32, parent: u32, rank: &str, name: &str) {
        self.nodes
            .insert(taxid, (parent, rank.to_string(), name.to_string()));
    }
}

impl TaxonomyClient for MockTaxonomy {
    fn name_to_taxid(&self, name: &str) -> Result<Option<u32>, PipelineError> {
        self.name_calls.lock().unwrap().push(name.to_string());
        Ok(self.names.get(name).copied())
    }

    fn rank(&self, taxid: u32) -> Result<Option<String>, PipelineError> {
        Ok(self.nodes.get(&taxid).map(|(_, rank, _)| rank.clone()))
    }

    fn scientific_name(&self, taxid: u32) -> Result<Option<String>, PipelineError> {
        Ok(self.nodes.get(&taxid).map(|(_, _, name)| name.clone()))
    }

    fn lineage(&self, taxid: u32) -> Result<Vec<u32>, PipelineError> {
        if !self.nodes.contains_key(&taxid) {
            return Err(PipelineError::Taxonomy(format!("unknown taxid {taxid}")));
        }
        let mut path = vec![taxid];
        let mut current = taxid;
        while let Some((parent, _, _)) = self.nodes.get(&current) {
            if *parent == current {
                break;
            }
            current = *parent;
            path.push(current);
        }
        path.reverse();
        Ok(path)
    }
}

struct BrokenTaxonomy;

impl TaxonomyClient for BrokenTaxonomy {
    fn name_to_taxid(&self, _name: &str) -> Result<Option<u32>, PipelineError> {
        Err(PipelineError::Taxonomy("database unavailable".to_string()))
    }

    fn rank(&self, _taxid: u32) -> Result<Option<String>, PipelineError> {
        Err(PipelineError::Taxonomy("database unavailable".to_string()))
    }

    fn scientific_name(&self, _taxid: u32) -> Result<Option<String>, PipelineError> {
        Err(PipelineError::Taxonomy("database unavailable".to_string()))
    }

    fn lineage(&self, _taxid: u32) -> Result<Vec<u32>, PipelineError> {
        Err(PipelineError::Taxonomy("database unavailable".to_string()))
    }
}

#[test]
fn trailing_digits_are_repaired_once() {
    let taxonomy = MockTaxonomy::viruses();
    let direct = resolve_organism(&taxonomy, "Influenzavirus");
    let repaired = resolve_organism(&taxonomy, "Influenzavirus 123");
    assert_eq!(direct, TaxonId::Resolved(197911));
    assert_eq!(repaired, direct);

    let calls = taxonomy.name_calls.lock().unwrap();
    assert_eq!(
        calls.as_slice(),
        ["Influenzavirus", "Influenzavirus 123", "Influenzavirus"]
    );
}

#[test]
fn unrepairable_name_is_unresolved() {
    let taxonomy = MockTaxonomy::viruses();
    assert_eq!(
        resolve_organism(&taxonomy, "Unknown phage 7"),
        TaxonId::Unresolved
    );
    // Nothing to strip, so no second lookup.
    assert_eq!(
        resolve_organism(&taxonomy, "Unknown phage"),
        TaxonId::Unresolved
    );
    assert_eq!(taxonomy.name_calls.lock().unwrap().len(), 3);
}

#[test]
fn backend_errors_degrade_to_unresolved() {
    assert_eq!(
        resolve_organism(&BrokenTaxonomy, "Influenza A virus"),
        TaxonId::Unresolved
    );
    let lineage = canonical_lineage(&BrokenTaxonomy, TaxonId::Resolved(11320));
    assert!(lineage.slots().iter().all(Option::is_none));
    assert_eq!(family_bucket(&lineage), UNKNOWN_FAMILY);
}

#[test]
fn lineage_fills_known_ranks_only() {
    let taxonomy = MockTaxonomy::viruses();
    let lineage = canonical_lineage(&taxonomy, TaxonId::Resolved(11320));

    assert_eq!(lineage.slots().len(), 9);
    assert_eq!(lineage.get(CanonicalRank::Superkingdom), Some("sk__Viruses"));
    assert_eq!(lineage.get(CanonicalRank::Family), Some("f__Orthomyxoviridae"));
    assert_eq!(lineage.get(CanonicalRank::Genus), Some("g__Alphainfluenzavirus"));
    assert_eq!(lineage.get(CanonicalRank::Species), Some("s__Influenza_A_virus"));
    assert_eq!(lineage.get(CanonicalRank::Kingdom), None);
    assert_eq!(lineage.get(CanonicalRank::Strain), None);
    assert_eq!(family_bucket(&lineage), "Orthomyxoviridae");
}

#[test]
fn lineage_is_total_for_unknown_and_unresolved_ids() {
    let taxonomy = MockTaxonomy::viruses();
    for taxon in [TaxonId::Unresolved, TaxonId::Resolved(424242)] {
        let lineage = canonical_lineage(&taxonomy, taxon);
        assert_eq!(lineage.slots().len(), 9);
        assert!(lineage.slots().iter().all(Option::is_none));
        assert_eq!(family_bucket(&lineage), UNKNOWN_FAMILY);
    }
}

#[test]
fn absent_family_never_collides_with_a_named_family() {
    let mut taxonomy = MockTaxonomy::viruses();
    // A family literally called "unknown_family" is still a present slot.
    taxonomy.node(999, 10239, "family", "unknown family");
    taxonomy.node(1000, 999, "species", "odd virus");
    let lineage = canonical_lineage(&taxonomy, TaxonId::Resolved(1000));
    assert_eq!(lineage.get(CanonicalRank::Family), Some("f__unknown_family"));

    let empty = canonical_lineage(&taxonomy, TaxonId::Unresolved);
    assert_ne!(empty.get(CanonicalRank::Family), lineage.get(CanonicalRank::Family));
}

#[test]
fn classifier_queries_with_spaces_and_caches() {
    let taxonomy = MockTaxonomy::viruses();
    let mut classifier = Classifier::new(taxonomy);

    let first = classifier.classify("Influenza_A_virus");
    let second = classifier.classify("Influenza_A_virus");
    assert_eq!(first.taxon_id, TaxonId::Resolved(11320));
    assert_eq!(first.family, "Orthomyxoviridae");
    assert_eq!(first, second);
    assert_eq!(classifier.lookups(), 1);
}

#[test]
fn cache_does_not_change_results() {
    let organisms = ["Influenza_A_virus", "Influenzavirus_12", "Nope", "Influenza_A_virus"];
    let mut cached = Classifier::new(MockTaxonomy::viruses());
    let mut uncached = Classifier::without_cache(MockTaxonomy::viruses());
    for organism in organisms {
        assert_eq!(cached.classify(organism), uncached.classify(organism));
    }
    assert_eq!(cached.lookups(), 3);
    assert_eq!(uncached.lookups(), 4);
}
