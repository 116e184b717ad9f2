use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use genpept_fasta::config::OutputTargets;
use genpept_fasta::domain::{SequenceRecord, TaxonId};
use genpept_fasta::error::PipelineError;
use genpept_fasta::output::{FinalRecord, OutputRouter};

fn final_record(name: &str, family: &str, sequence: &str) -> FinalRecord {
    let mut record = SequenceRecord::new(name, "capsid_protein", "Dengue_virus_2", sequence);
    record.taxon_id = TaxonId::Resolved(11060);
    record.family = family.to_string();
    FinalRecord::from_record(record).unwrap()
}

fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).unwrap()
}

#[test]
fn all_sinks_receive_identical_content() {
    let temp = tempfile::tempdir().unwrap();
    let targets = OutputTargets {
        single_output: Some(utf8(temp.path().join("out/all.fasta"))),
        per_record_dir: Some(utf8(temp.path().join("records"))),
        per_family_dir: Some(utf8(temp.path().join("families"))),
    };
    let records = vec![
        final_record("YP_1", "Flaviviridae", "MNNQRKK"),
        final_record("YP_2", "unknown_family", "MSGRKAQ"),
        final_record("YP_3", "Flaviviridae", "MRCIGIS"),
    ];

    let mut router = OutputRouter::from_targets(&targets).unwrap();
    for record in &records {
        router.write(record).unwrap();
    }
    assert_eq!(router.finish().unwrap(), 3);

    let single = fs::read_to_string(temp.path().join("out/all.fasta")).unwrap();
    assert_eq!(
        single,
        ">capsid_protein__YP_1__Dengue_virus_2__11060\nMNNQRKK\n\
         >capsid_protein__YP_2__Dengue_virus_2__11060\nMSGRKAQ\n\
         >capsid_protein__YP_3__Dengue_virus_2__11060\nMRCIGIS\n"
    );

    let per_record = records
        .iter()
        .map(|record| {
            let path = temp
                .path()
                .join("records")
                .join(format!("{}.fasta", record.header()));
            fs::read_to_string(path).unwrap()
        })
        .collect::<String>();
    assert_eq!(per_record, single);

    let flavi = fs::read_to_string(temp.path().join("families/Flaviviridae.fasta")).unwrap();
    let unknown = fs::read_to_string(temp.path().join("families/unknown_family.fasta")).unwrap();
    assert_eq!(
        flavi,
        ">capsid_protein__YP_1__Dengue_virus_2__11060\nMNNQRKK\n\
         >capsid_protein__YP_3__Dengue_virus_2__11060\nMRCIGIS\n"
    );
    assert_eq!(
        unknown,
        ">capsid_protein__YP_2__Dengue_virus_2__11060\nMSGRKAQ\n"
    );
}

#[test]
fn family_writers_flush_when_dropped_on_error_paths() {
    let temp = tempfile::tempdir().unwrap();
    let targets = OutputTargets {
        per_family_dir: Some(utf8(temp.path().join("families"))),
        ..OutputTargets::default()
    };
    let mut router = OutputRouter::from_targets(&targets).unwrap();
    router
        .write(&final_record("YP_1", "Flaviviridae", "MNNQRKK"))
        .unwrap();
    drop(router);

    let flavi = fs::read_to_string(temp.path().join("families/Flaviviridae.fasta")).unwrap();
    assert!(flavi.ends_with("MNNQRKK\n"));
}

#[test]
fn no_targets_is_rejected_up_front() {
    assert_matches!(
        OutputRouter::from_targets(&OutputTargets::default()),
        Err(PipelineError::NoOutputConfigured)
    );
}

#[test]
fn delimiter_inside_a_field_names_the_header() {
    let mut record = SequenceRecord::new("YP__1", "capsid", "Dengue_virus_2", "M");
    record.taxon_id = TaxonId::Resolved(11060);
    let err = FinalRecord::from_record(record).unwrap_err();
    assert_matches!(
        err,
        PipelineError::HeaderDelimiter { header } if header == "capsid__YP__1__Dengue_virus_2__11060"
    );
}
