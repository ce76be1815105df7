use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::app::{ProgressEvent, ProgressSink};
use crate::checklist::ChecklistClient;
use crate::collect::OrderedIds;
use crate::domain::{DatasetMeta, DatasetRecord, EntityKind, ReferenceMeta, ReferenceRecord};
use crate::error::ExportError;
use crate::fetch::{decode, fetch_or_replay};
use crate::store::ReplayStore;

const PROGRESS_EVERY: usize = 10;

fn report(sink: &dyn ProgressSink, what: &str, done: usize, total: usize) {
    if done % PROGRESS_EVERY == 0 {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; {done} of {total} {what}"),
            elapsed: None,
        });
    }
}

/// Fetches every dataset once, keyed by dataset key.
pub fn resolve_datasets<C: ChecklistClient>(
    client: &C,
    store: &dyn ReplayStore,
    keys: &BTreeSet<String>,
    sink: &dyn ProgressSink,
) -> Result<BTreeMap<String, DatasetMeta>, ExportError> {
    let mut datasets = BTreeMap::new();
    for (done, key) in keys.iter().enumerate() {
        report(sink, "datasets", done, keys.len());
        let body = fetch_or_replay(store, EntityKind::Datasets, key, || {
            client.fetch_dataset(key)
        })?;
        let record: DatasetRecord = decode(&format!("dataset {key}"), &body)?;
        datasets.insert(key.clone(), DatasetMeta::from_record(key, record));
    }
    info!(datasets = datasets.len(), "datasets resolved");
    Ok(datasets)
}

/// Fetches every reference once, preserving the order of `ids`.
pub fn resolve_references<C: ChecklistClient>(
    client: &C,
    store: &dyn ReplayStore,
    release_id: &str,
    ids: &OrderedIds,
    sink: &dyn ProgressSink,
) -> Result<Vec<ReferenceMeta>, ExportError> {
    let mut references = Vec::with_capacity(ids.len());
    for (done, id) in ids.iter().enumerate() {
        report(sink, "references", done, ids.len());
        let body = fetch_or_replay(store, EntityKind::References, id, || {
            client.fetch_reference(release_id, id)
        })?;
        let record: ReferenceRecord = decode(&format!("reference {id}"), &body)?;
        references.push(ReferenceMeta::from_record(id, record));
    }
    info!(references = references.len(), "references resolved");
    Ok(references)
}
