use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::app::{ProgressEvent, ProgressSink};
use crate::checklist::{ChecklistClient, SearchQuery};
use crate::domain::{EntityKind, UsageRecord};
use crate::error::ExportError;
use crate::store::ReplayStore;

/// Returns the recorded response for `(kind, key)` or performs `fetch` and
/// records its body. Failed fetches are never recorded.
pub fn fetch_or_replay<F>(
    store: &dyn ReplayStore,
    kind: EntityKind,
    key: &str,
    fetch: F,
) -> Result<Vec<u8>, ExportError>
where
    F: FnOnce() -> Result<Vec<u8>, ExportError>,
{
    if let Some(body) = store.lookup(kind, key)? {
        debug!(%kind, key, "replayed from cache");
        return Ok(body);
    }
    let body = fetch()?;
    store.store(kind, key, &body)?;
    Ok(body)
}

pub fn decode<T: DeserializeOwned>(context: &str, body: &[u8]) -> Result<T, ExportError> {
    serde_json::from_slice(body).map_err(|err| ExportError::MalformedResponse {
        context: context.to_string(),
        message: err.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct SearchPage<T> {
    result: Option<Vec<T>>,
    total: u64,
}

/// Lazily walks a name usage search, one page per `next`, until the running
/// offset reaches the latest total reported by the server. Stops for good
/// after the first error.
pub struct Paginator<'a, C: ChecklistClient> {
    client: &'a C,
    store: &'a dyn ReplayStore,
    query: &'a SearchQuery,
    sink: &'a dyn ProgressSink,
    offset: u64,
    total: Option<u64>,
    retrieved: usize,
    failed: bool,
}

impl<'a, C: ChecklistClient> Paginator<'a, C> {
    pub fn new(
        client: &'a C,
        store: &'a dyn ReplayStore,
        query: &'a SearchQuery,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            client,
            store,
            query,
            sink,
            offset: 0,
            total: None,
            retrieved: 0,
            failed: false,
        }
    }

    /// Latest total reported by the server; `None` before the first page.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn retrieved(&self) -> usize {
        self.retrieved
    }

    fn fetch_page(&mut self) -> Result<Vec<UsageRecord>, ExportError> {
        let offset = self.offset;
        let key = offset.to_string();
        let body = fetch_or_replay(self.store, EntityKind::NameUsages, &key, || {
            self.client.search_name_usages(self.query, offset)
        })?;
        let page: SearchPage<UsageRecord> =
            decode(&format!("name usage search at offset {offset}"), &body)?;

        let items = page.result.unwrap_or_default();
        self.total = Some(page.total);
        self.retrieved += items.len();
        self.offset += self.query.limit;

        self.sink.event(ProgressEvent {
            message: format!(
                "phase=Crawl; {} of {} name usages",
                self.offset.min(page.total),
                page.total
            ),
            elapsed: None,
        });
        Ok(items)
    }
}

impl<C: ChecklistClient> Iterator for Paginator<'_, C> {
    type Item = Result<Vec<UsageRecord>, ExportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(total) = self.total {
            if self.offset >= total {
                return None;
            }
        }
        let page = self.fetch_page();
        if page.is_err() {
            self.failed = true;
        }
        Some(page)
    }
}

/// Retrieves the full result set and checks it against the declared total.
pub fn crawl_name_usages<C: ChecklistClient>(
    client: &C,
    store: &dyn ReplayStore,
    query: &SearchQuery,
    sink: &dyn ProgressSink,
) -> Result<Vec<UsageRecord>, ExportError> {
    let mut paginator = Paginator::new(client, store, query, sink);
    let mut records = Vec::new();
    for page in paginator.by_ref() {
        records.extend(page?);
    }

    let total = paginator.total().unwrap_or(0);
    if records.len() as u64 != total {
        return Err(ExportError::CountMismatch {
            retrieved: records.len(),
            total,
        });
    }
    info!(usages = records.len(), "crawl complete");
    Ok(records)
}
