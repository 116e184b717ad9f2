use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::Serialize;

use crate::error::PipelineError;

pub const UNKNOWN_FAMILY: &str = "unknown_family";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaxonId {
    Resolved(u32),
    Unresolved,
}

impl TaxonId {
    pub fn resolved(self) -> Option<u32> {
        match self {
            TaxonId::Resolved(id) => Some(id),
            TaxonId::Unresolved => None,
        }
    }
}

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxonId::Resolved(id) => write!(f, "{id}"),
            TaxonId::Unresolved => write!(f, "X"),
        }
    }
}

impl FromStr for TaxonId {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed == "X" {
            return Ok(TaxonId::Unresolved);
        }
        match trimmed.parse::<u32>() {
            Ok(id) if id > 0 => Ok(TaxonId::Resolved(id)),
            _ => Err(PipelineError::InvalidTaxonId(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Original,
    DecomposedChild,
    DecomposedResidual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureKind {
    MaturePeptide,
    Other(String),
}

impl FeatureKind {
    pub fn from_key(key: &str) -> Self {
        match key {
            "mat_peptide" => FeatureKind::MaturePeptide,
            other => FeatureKind::Other(other.to_string()),
        }
    }
}

/// A feature-table entry. Coordinates are 0-based and half-open; they are
/// signed so malformed input survives parsing and can be rejected later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub kind: FeatureKind,
    pub start: i64,
    pub end: i64,
    pub product: Option<String>,
    pub protein_id: Option<String>,
}

impl Feature {
    pub fn mature_peptide(start: i64, end: i64, product: &str) -> Self {
        Self {
            kind: FeatureKind::MaturePeptide,
            start,
            end,
            product: Some(product.to_string()),
            protein_id: None,
        }
    }

    pub fn with_protein_id(mut self, protein_id: &str) -> Self {
        self.protein_id = Some(protein_id.to_string());
        self
    }

    pub fn is_mature_peptide(&self) -> bool {
        self.kind == FeatureKind::MaturePeptide
    }

    /// Returns the range as indices into a sequence of `len` residues, or
    /// `None` when it is negative, empty or runs past the end.
    pub fn checked_range(&self, len: usize) -> Option<Range<usize>> {
        if self.start < 0 || self.end <= self.start {
            return None;
        }
        let (start, end) = (self.start as usize, self.end as usize);
        (end <= len).then_some(start..end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub name: String,
    pub description: String,
    pub organism: String,
    pub taxon_id: TaxonId,
    pub family: String,
    pub sequence: String,
    pub provenance: Provenance,
    pub features: Vec<Feature>,
}

impl SequenceRecord {
    pub fn new(name: &str, description: &str, organism: &str, sequence: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            organism: organism.to_string(),
            taxon_id: TaxonId::Unresolved,
            family: UNKNOWN_FAMILY.to_string(),
            sequence: sequence.to_string(),
            provenance: Provenance::Original,
            features: Vec::new(),
        }
    }

    pub fn with_features(mut self, features: Vec<Feature>) -> Self {
        self.features = features;
        self
    }

    pub fn derive(
        &self,
        name: String,
        description: String,
        sequence: &str,
        provenance: Provenance,
    ) -> Self {
        Self {
            name,
            description,
            organism: self.organism.clone(),
            taxon_id: TaxonId::Unresolved,
            family: UNKNOWN_FAMILY.to_string(),
            sequence: sequence.to_string(),
            provenance,
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalRank {
    Superkingdom,
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
    Strain,
}

impl CanonicalRank {
    pub const ALL: [CanonicalRank; 9] = [
        CanonicalRank::Superkingdom,
        CanonicalRank::Kingdom,
        CanonicalRank::Phylum,
        CanonicalRank::Class,
        CanonicalRank::Order,
        CanonicalRank::Family,
        CanonicalRank::Genus,
        CanonicalRank::Species,
        CanonicalRank::Strain,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            CanonicalRank::Superkingdom => "sk__",
            CanonicalRank::Kingdom => "k__",
            CanonicalRank::Phylum => "p__",
            CanonicalRank::Class => "c__",
            CanonicalRank::Order => "o__",
            CanonicalRank::Family => "f__",
            CanonicalRank::Genus => "g__",
            CanonicalRank::Species => "s__",
            CanonicalRank::Strain => "st__",
        }
    }

    /// Whether an NCBI rank label fills this slot. NCBI renamed
    /// `superkingdom` to `domain` in 2025; both are accepted.
    pub fn matches(self, label: &str) -> bool {
        let label = label.trim();
        match self {
            CanonicalRank::Superkingdom => {
                label.eq_ignore_ascii_case("superkingdom") || label.eq_ignore_ascii_case("domain")
            }
            other => label.eq_ignore_ascii_case(other.label()),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CanonicalRank::Superkingdom => "superkingdom",
            CanonicalRank::Kingdom => "kingdom",
            CanonicalRank::Phylum => "phylum",
            CanonicalRank::Class => "class",
            CanonicalRank::Order => "order",
            CanonicalRank::Family => "family",
            CanonicalRank::Genus => "genus",
            CanonicalRank::Species => "species",
            CanonicalRank::Strain => "strain",
        }
    }

    fn index(self) -> usize {
        CanonicalRank::ALL
            .iter()
            .position(|rank| *rank == self)
            .unwrap_or_default()
    }
}

/// Fixed-width lineage; `None` marks a rank the taxon has no ancestor at.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Lineage(pub [Option<String>; 9]);

impl Lineage {
    pub fn get(&self, rank: CanonicalRank) -> Option<&str> {
        self.0[rank.index()].as_deref()
    }

    pub fn set(&mut self, rank: CanonicalRank, value: String) {
        self.0[rank.index()] = Some(value);
    }

    pub fn slots(&self) -> &[Option<String>; 9] {
        &self.0
    }
}
