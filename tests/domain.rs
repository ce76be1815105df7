use std::collections::BTreeMap;

use assert_matches::assert_matches;
use serde_json::Value;

use clb_exporter::domain::{DatasetMeta, DatasetRecord, ReferenceMeta, ReferenceRecord, UsageRecord};
use clb_exporter::error::ExportError;
use clb_exporter::transform::transform;

fn page_records() -> Vec<UsageRecord> {
    let page: Value = serde_json::from_str(include_str!("fixtures/nameusage_page.json")).unwrap();
    serde_json::from_value(page["result"].clone()).unwrap()
}

fn wsc() -> DatasetMeta {
    let record: DatasetRecord =
        serde_json::from_str(include_str!("fixtures/dataset.json")).unwrap();
    DatasetMeta::from_record("2144", record)
}

#[test]
fn dataset_fixture_is_shaped() {
    let meta = wsc();
    assert_eq!(meta.dataset_id, "2144");
    assert_eq!(meta.alias, "WSC");
    assert_eq!(meta.display_alias(), "WSC");
    assert_eq!(meta.contact, "Wolfgang Nentwig");
    assert_eq!(meta.creator, "Wolfgang Nentwig; Theo Blick");
    assert_eq!(meta.editor, "");
    assert_eq!(meta.contributor, "");
    assert_eq!(meta.publisher, "Natural History Museum Bern");
    assert_eq!(meta.confidence, "5");
    assert_eq!(meta.completeness, "100");
    assert_eq!(meta.kind, "taxonomic");
    assert_eq!(meta.temporal_scope, "");
}

#[test]
fn reference_fixture_is_shaped() {
    let record: ReferenceRecord =
        serde_json::from_str(include_str!("fixtures/reference.json")).unwrap();
    let meta = ReferenceMeta::from_record("R-9", record);
    assert_eq!(meta.reference_id, "R-9");
    assert_eq!(meta.source_id, "hentz1845");
    assert_eq!(meta.kind, "article-journal");
    assert_eq!(meta.authors, "Hentz, N. M.; Anonymous");
    assert_eq!(meta.year, "1845");
    assert_eq!(meta.journal, "Boston Journal of Natural History");
    assert_eq!(meta.volume, "5");
    assert_eq!(meta.page, "352-370");
    assert!(meta.citation.starts_with("Hentz, N. M. (1845)"));
}

#[test]
fn accepted_usage_row() {
    let records = page_records();
    let datasets = BTreeMap::from([("2144".to_string(), wsc())]);
    let row = transform(&records[0], &datasets).unwrap();

    assert_eq!(row.taxon_id, "4QHKG");
    assert_eq!(row.name_id, "N-4QHKG");
    assert_eq!(row.parent_id, "Q2");
    assert_eq!(row.dataset_id, "2144");
    assert_eq!(row.dataset_alias, "WSC");
    assert_eq!(row.rank, "species");
    assert_eq!(row.authorship, "(Hentz, 1845)");
    assert_eq!(row.authors, "Hentz");
    assert_eq!(row.year, "1845");
    assert_eq!(row.extinct, "False");
    assert_eq!(row.accepted_id, "");
    assert_eq!(row.reference_id, "R-9|R-3");
    assert_eq!(row.identifiers, "wsc:urn:lsid:nmbe.ch:spidersp:1|tsn:3384");

    let slots = &row.classification;
    assert_eq!(slots.get("kingdom"), Some("Animalia"));
    assert_eq!(slots.get("tribe"), Some("Phidippini"));
    assert_eq!(slots.get("species"), Some("Phidippus audax"));
    assert_eq!(slots.get("subfamily"), Some(""));
    assert_eq!(slots.get("other"), Some(""));
    assert!(slots.names().all(|name| name != "Cladus incertus"));
}

#[test]
fn synonym_row() {
    let records = page_records();
    let datasets = BTreeMap::from([("2144".to_string(), wsc())]);
    let row = transform(&records[1], &datasets).unwrap();

    assert_eq!(row.status, "synonym");
    assert_eq!(row.accepted_id, "4QHKG");
    assert_eq!(row.accepted_name, "Phidippus audax");
    assert_eq!(row.accepted_author, "(Hentz, 1845)");
    assert_eq!(row.temporal_range_start, "Eocene");
    assert_eq!(row.extinct, "");
    assert_eq!(row.reference_id, "");
    assert_eq!(row.classification.get("phylum"), Some(""));
}

#[test]
fn unresolved_dataset_is_an_error() {
    let records = page_records();
    let err = transform(&records[0], &BTreeMap::new()).unwrap_err();
    assert_matches!(err, ExportError::UnknownDataset(key) if key == "2144");
}
