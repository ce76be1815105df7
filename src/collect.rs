use std::collections::{BTreeSet, HashSet};

use crate::domain::UsageRecord;

/// Identifiers kept in first-seen order, each at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedIds {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl OrderedIds {
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.order.push(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Gathers the dataset keys and reference ids referenced by usages so each
/// auxiliary entity is fetched once.
#[derive(Debug, Clone, Default)]
pub struct IdentifierCollector {
    datasets: BTreeSet<String>,
    references: OrderedIds,
}

impl IdentifierCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe_dataset(&mut self, record: &UsageRecord) {
        if let Some(key) = record.sector_dataset_key() {
            if !self.datasets.contains(key) {
                self.datasets.insert(key.to_string());
            }
        }
    }

    pub fn observe_references(&mut self, record: &UsageRecord) {
        for id in record.reference_ids() {
            if !id.is_empty() {
                self.references.insert(id);
            }
        }
    }

    pub fn observe(&mut self, record: &UsageRecord) {
        self.observe_dataset(record);
        self.observe_references(record);
    }

    /// Distinct dataset keys; ordering carries no meaning.
    pub fn dataset_keys(&self) -> &BTreeSet<String> {
        &self.datasets
    }

    /// Distinct reference ids in the order they first appeared.
    pub fn reference_ids(&self) -> &OrderedIds {
        &self.references
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(dataset: Option<u32>, refs: &[&str]) -> UsageRecord {
        let mut value = json!({
            "usage": {"id": "U", "name": {"id": "N"}, "referenceIds": refs}
        });
        if let Some(key) = dataset {
            value["sectorDatasetKey"] = json!(key);
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn references_keep_first_seen_order() {
        let stream = vec![
            record(None, &["r3", "r1"]),
            record(None, &["r1", "r2", "r3"]),
            record(None, &["r2", "r4", "r4"]),
        ];
        let mut collector = IdentifierCollector::new();
        for item in &stream {
            collector.observe(item);
        }
        let ids: Vec<String> = collector.reference_ids().iter().map(str::to_string).collect();
        assert_eq!(ids, vec!["r3", "r1", "r2", "r4"]);

        for item in &stream {
            collector.observe(item);
        }
        let again: Vec<String> = collector.reference_ids().iter().map(str::to_string).collect();
        assert_eq!(again, ids);
    }

    #[test]
    fn dataset_keys_are_distinct() {
        let mut collector = IdentifierCollector::new();
        for item in [record(Some(7), &[]), record(Some(7), &[]), record(None, &[]), record(Some(3), &[])] {
            collector.observe_dataset(&item);
        }
        let keys: Vec<&String> = collector.dataset_keys().iter().collect();
        assert_eq!(keys, vec!["3", "7"]);
    }
}
