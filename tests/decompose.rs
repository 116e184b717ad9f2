use assert_matches::assert_matches;

use genpept_fasta::decompose::{Decomposer, merge_ranges, uncovered_runs};
use genpept_fasta::domain::{Feature, FeatureKind, Provenance, SequenceRecord};
use genpept_fasta::error::PipelineError;

fn polyprotein(len: usize, features: Vec<Feature>) -> SequenceRecord {
    SequenceRecord::new(
        "YP_009109565",
        "polyprotein [Dengue virus 2]",
        "Dengue virus 2",
        &"M".repeat(len),
    )
    .with_features(features)
}

#[test]
fn record_without_mature_peptides_passes_through() {
    let other = Feature {
        kind: FeatureKind::Other("Region".to_string()),
        start: 0,
        end: 10,
        product: None,
        protein_id: None,
    };
    let parent = polyprotein(120, vec![other]);
    let out = Decomposer::default().decompose(parent.clone()).unwrap();
    assert_eq!(out, vec![parent]);
    assert_eq!(out[0].provenance, Provenance::Original);
}

#[test]
fn residual_covers_unclaimed_tail() {
    let parent = polyprotein(300, vec![Feature::mature_peptide(0, 200, "capsid")]);
    let out = Decomposer::new(50).decompose(parent).unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].provenance, Provenance::DecomposedChild);
    assert_eq!(out[0].name, "YP_009109565_capsid");
    assert_eq!(out[0].description, "capsid");
    assert_eq!(out[0].len(), 200);

    let residual = &out[1];
    assert_eq!(residual.provenance, Provenance::DecomposedResidual);
    assert_eq!(residual.name, "YP_009109565_200-300");
    assert_eq!(
        residual.description,
        "uncovered_polypeptide_polyprotein [Dengue virus 2]"
    );
    assert_eq!(residual.organism, "Dengue virus 2");
    assert_eq!(residual.len(), 100);
}

#[test]
fn residual_below_threshold_is_dropped() {
    let parent = polyprotein(300, vec![Feature::mature_peptide(0, 200, "capsid")]);
    let out = Decomposer::new(150).decompose(parent).unwrap();
    assert_eq!(out.len(), 1);
    assert!(
        out.iter()
            .all(|record| record.provenance == Provenance::DecomposedChild)
    );
}

#[test]
fn overlapping_peptides_merge_before_complement() {
    let parent = polyprotein(
        260,
        vec![
            Feature::mature_peptide(0, 100, "pr"),
            Feature::mature_peptide(50, 150, "M"),
        ],
    );
    let out = Decomposer::new(50).decompose(parent).unwrap();

    // Children keep their own extents; the residual starts after the union.
    assert_eq!(out[0].len(), 100);
    assert_eq!(out[1].len(), 100);
    assert_eq!(out.len(), 3);
    assert_eq!(out[2].name, "YP_009109565_150-260");
    assert_eq!(out[2].len(), 110);
}

#[test]
fn emitted_ranges_account_for_the_whole_parent() {
    let features = vec![
        Feature::mature_peptide(10, 60, "a"),
        Feature::mature_peptide(60, 100, "b"),
        Feature::mature_peptide(170, 200, "c"),
        Feature::mature_peptide(180, 190, "d"),
    ];
    let len = 400;
    let minimum = 40;

    let covered = merge_ranges(
        features
            .iter()
            .map(|f| f.start as usize..f.end as usize)
            .collect(),
    );
    assert_eq!(covered, vec![10..100, 170..200]);
    let gaps = uncovered_runs(&covered, len);
    assert_eq!(gaps, vec![0..10, 100..170, 200..400]);

    let out = Decomposer::new(minimum)
        .decompose(polyprotein(len, features))
        .unwrap();
    let residual_len: usize = out
        .iter()
        .filter(|r| r.provenance == Provenance::DecomposedResidual)
        .map(SequenceRecord::len)
        .sum();
    let covered_len: usize = covered.iter().map(|r| r.len()).sum();
    let short_gaps: usize = gaps
        .iter()
        .filter(|g| g.len() < minimum)
        .map(|g| g.len())
        .sum();

    assert_eq!(covered_len + residual_len, len - short_gaps);
    assert_eq!(residual_len, 70 + 200);
}

#[test]
fn declared_protein_id_names_the_child() {
    let parent = polyprotein(
        200,
        vec![
            Feature::mature_peptide(0, 100, "capsid").with_protein_id("YP_009164956.1"),
            Feature::mature_peptide(100, 200, "envelope"),
        ],
    );
    let out = Decomposer::default().decompose(parent).unwrap();
    assert_eq!(out[0].name, "YP_009164956");
    assert_eq!(out[1].name, "YP_009109565_envelope");
}

#[test]
fn strict_mode_rejects_mixed_protein_ids() {
    let parent = polyprotein(
        200,
        vec![
            Feature::mature_peptide(0, 100, "capsid").with_protein_id("YP_009164956.1"),
            Feature::mature_peptide(100, 200, "envelope"),
        ],
    );
    let err = Decomposer::default()
        .strict_protein_ids(true)
        .decompose(parent)
        .unwrap_err();
    assert_matches!(err, PipelineError::MixedProteinIds { record } if record == "YP_009109565");
}

#[test]
fn missing_product_is_fatal() {
    let mut feature = Feature::mature_peptide(0, 10, "x");
    feature.product = None;
    let err = Decomposer::default()
        .decompose(polyprotein(100, vec![feature]))
        .unwrap_err();
    assert_matches!(
        err,
        PipelineError::MissingField { record, field } if record == "YP_009109565" && field == "product"
    );
}

#[test]
fn out_of_bounds_range_is_fatal() {
    for (start, end) in [(-5, 10), (20, 20), (30, 10), (90, 101)] {
        let err = Decomposer::default()
            .decompose(polyprotein(
                100,
                vec![Feature::mature_peptide(start, end, "x")],
            ))
            .unwrap_err();
        assert_matches!(
            err,
            PipelineError::InvalidRange { record, len: 100, .. } if record == "YP_009109565"
        );
    }
}
