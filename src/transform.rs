use std::collections::BTreeMap;

use crate::classification::{ClassificationSlots, flatten};
use crate::domain::{DatasetMeta, UsageRecord, flag_text};
use crate::error::ExportError;

/// Marker the catalog puts in front of extinct names in display labels.
pub const EXTINCT_GLYPH: char = '†';

const LIST_DELIMITER: &str = "|";

/// One row of the name usage table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageRow {
    pub classification: ClassificationSlots,
    pub dataset_id: String,
    pub dataset_alias: String,
    pub parent_id: String,
    pub taxon_id: String,
    pub name_id: String,
    pub rank: String,
    pub accepted_id: String,
    pub accepted_name: String,
    pub accepted_author: String,
    pub scientific_name: String,
    pub authorship: String,
    pub authors: String,
    pub year: String,
    pub status: String,
    pub extinct: String,
    pub temporal_range_start: String,
    pub temporal_range_end: String,
    pub link: String,
    pub reference_id: String,
    pub identifiers: String,
}

#[derive(Debug, Clone, Default)]
struct Accepted {
    id: String,
    name: String,
    author: String,
}

fn accepted_fields(record: &UsageRecord) -> Result<Accepted, ExportError> {
    if !record.is_synonym() {
        return Ok(Accepted::default());
    }
    let missing = |field: &str| ExportError::MalformedRecord {
        context: record.describe(),
        field: field.to_string(),
    };
    let accepted = record.accepted().ok_or_else(|| missing("usage.accepted"))?;
    let id = accepted.id().ok_or_else(|| missing("usage.accepted.id"))?;

    let mut name = accepted.scientific_name().to_string();
    if accepted.label().contains(EXTINCT_GLYPH) {
        name.insert(0, EXTINCT_GLYPH);
    }
    Ok(Accepted {
        id: id.to_string(),
        name,
        author: accepted.authorship().to_string(),
    })
}

fn dataset_fields(
    record: &UsageRecord,
    datasets: &BTreeMap<String, DatasetMeta>,
) -> Result<(String, String), ExportError> {
    let Some(key) = record.sector_dataset_key() else {
        return Ok((String::new(), String::new()));
    };
    let meta = datasets
        .get(key)
        .ok_or_else(|| ExportError::UnknownDataset(key.to_string()))?;
    Ok((key.to_string(), meta.display_alias().to_string()))
}

/// Builds the output row for one usage. Missing usage or name ids are fatal.
pub fn transform(
    record: &UsageRecord,
    datasets: &BTreeMap<String, DatasetMeta>,
) -> Result<UsageRow, ExportError> {
    let taxon_id = record
        .usage_id()
        .ok_or_else(|| ExportError::MalformedRecord {
            context: record.describe(),
            field: "usage.id".to_string(),
        })?;
    let name_id = record
        .name_id()
        .ok_or_else(|| ExportError::MalformedRecord {
            context: record.describe(),
            field: "usage.name.id".to_string(),
        })?;
    let accepted = accepted_fields(record)?;
    let (dataset_id, dataset_alias) = dataset_fields(record, datasets)?;

    Ok(UsageRow {
        classification: flatten(record.classification()),
        dataset_id,
        dataset_alias,
        parent_id: record.parent_id().to_string(),
        taxon_id: taxon_id.to_string(),
        name_id: name_id.to_string(),
        rank: record.rank().to_string(),
        accepted_id: accepted.id,
        accepted_name: accepted.name,
        accepted_author: accepted.author,
        scientific_name: record.scientific_name().to_string(),
        authorship: record.authorship().to_string(),
        authors: record.combination_authors().join(LIST_DELIMITER),
        year: record.combination_year().to_string(),
        status: record.status().to_string(),
        extinct: record
            .extinct()
            .map(|extinct| flag_text(extinct).to_string())
            .unwrap_or_default(),
        temporal_range_start: record.temporal_range_start().to_string(),
        temporal_range_end: record.temporal_range_end().to_string(),
        link: record.link().to_string(),
        reference_id: record.reference_ids().join(LIST_DELIMITER),
        identifiers: record.identifiers().join(LIST_DELIMITER),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn record(value: serde_json::Value) -> UsageRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepted_usage_has_no_accepted_fields() {
        let row = transform(
            &record(json!({
                "usage": {
                    "id": "U1", "status": "accepted",
                    "name": {"id": "N1", "scientificName": "Aus bus", "rank": "species"},
                    "accepted": {"id": "ignored"}
                }
            })),
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(row.accepted_id, "");
        assert_eq!(row.accepted_name, "");
        assert_eq!(row.accepted_author, "");
        assert_eq!(row.rank, "species");
    }

    #[test]
    fn synonym_without_accepted_id_is_malformed() {
        let err = transform(
            &record(json!({
                "usage": {"id": "U1", "status": "synonym", "name": {"id": "N1"}, "accepted": {}}
            })),
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert_matches!(err, ExportError::MalformedRecord { field, .. } if field == "usage.accepted.id");
    }

    #[test]
    fn missing_usage_id_is_malformed() {
        let err = transform(
            &record(json!({"usage": {"name": {"id": "N1", "scientificName": "Aus bus"}}})),
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert_matches!(err, ExportError::MalformedRecord { field, .. } if field == "usage.id");
    }

    #[test]
    fn missing_name_id_is_malformed() {
        let err = transform(&record(json!({"usage": {"id": "U1"}})), &BTreeMap::new()).unwrap_err();
        assert_matches!(err, ExportError::MalformedRecord { field, .. } if field == "usage.name.id");
    }

    #[test]
    fn combination_authorship_is_joined() {
        let row = transform(
            &record(json!({
                "usage": {
                    "id": "U1",
                    "extinct": false,
                    "name": {
                        "id": "N1",
                        "authorship": "(Linnaeus & Clerck, 1758)",
                        "combinationAuthorship": {"authors": ["Linnaeus", "Clerck"], "year": "1758"},
                        "identifier": ["tsn:1", "gbif:2"]
                    }
                }
            })),
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(row.authors, "Linnaeus|Clerck");
        assert_eq!(row.year, "1758");
        assert_eq!(row.identifiers, "tsn:1|gbif:2");
        assert_eq!(row.extinct, "False");
        assert_eq!(row.dataset_alias, "");
    }

    #[test]
    fn unresolved_dataset_is_reported() {
        let err = transform(
            &record(json!({"usage": {"id": "U1", "name": {"id": "N1"}}, "sectorDatasetKey": 9})),
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert_matches!(err, ExportError::UnknownDataset(key) if key == "9");
    }
}
