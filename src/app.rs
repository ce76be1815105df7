use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::checklist::{ChecklistClient, SearchQuery};
use crate::collect::IdentifierCollector;
use crate::config::RunConfig;
use crate::domain::{DatasetMeta, UsageRecord};
use crate::error::ExportError;
use crate::fetch::crawl_name_usages;
use crate::import::TableImporter;
use crate::resolve::{resolve_datasets, resolve_references};
use crate::store::ReplayStore;
use crate::table::{TableFile, TableRow, write_table};
use crate::transform::{UsageRow, transform};

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Stages of one export run. Each is entered only after the previous one
/// completed; there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Authenticated,
    UsagesCrawled,
    DatasetsResolved,
    UsageTableWritten,
    ReferencesResolved,
    ReferenceTableWritten,
    Done,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Authenticated => Some(Stage::UsagesCrawled),
            Stage::UsagesCrawled => Some(Stage::DatasetsResolved),
            Stage::DatasetsResolved => Some(Stage::UsageTableWritten),
            Stage::UsageTableWritten => Some(Stage::ReferencesResolved),
            Stage::ReferencesResolved => Some(Stage::ReferenceTableWritten),
            Stage::ReferenceTableWritten => Some(Stage::Done),
            Stage::Done => None,
        }
    }
}

struct StageTracker<'a> {
    current: Stage,
    started: Instant,
    sink: &'a dyn ProgressSink,
}

impl<'a> StageTracker<'a> {
    fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            current: Stage::Authenticated,
            started: Instant::now(),
            sink,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert_eq!(self.current.next(), Some(next));
        self.current = next;
        let elapsed = self.started.elapsed();
        info!(stage = ?next, elapsed_ms = elapsed.as_millis() as u64, "stage complete");
        self.sink.event(ProgressEvent {
            message: format!("phase=Stage; {next:?}"),
            elapsed: Some(elapsed),
        });
    }
}

/// Output locations of one run, all named after the run tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePaths {
    pub usages: Utf8PathBuf,
    pub datasets: Utf8PathBuf,
    pub references: Utf8PathBuf,
}

impl TablePaths {
    pub fn for_run(output_dir: &Utf8Path, run_tag: &str) -> Self {
        Self {
            usages: output_dir.join(format!("{run_tag}.tsv")),
            datasets: output_dir.join(format!("{run_tag}_datasets.tsv")),
            references: output_dir.join(format!("{run_tag}_references.tsv")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub run_tag: String,
    pub stage: Stage,
    pub usages: usize,
    pub datasets: usize,
    pub references: usize,
    pub tables: TablePaths,
    pub started_at: String,
    pub finished_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub database: Utf8PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResult {
    pub cache_dir: String,
    pub cleared: bool,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Runs the export stages in order against an authenticated client.
pub struct App<C: ChecklistClient, S: ReplayStore> {
    config: RunConfig,
    client: C,
    store: S,
}

impl<C: ChecklistClient, S: ReplayStore> App<C, S> {
    pub fn new(config: RunConfig, client: C, store: S) -> Self {
        Self {
            config,
            client,
            store,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn table_paths(&self) -> TablePaths {
        TablePaths::for_run(&self.config.output_dir, &self.config.run_tag())
    }

    pub fn database_path(&self) -> Utf8PathBuf {
        self.config
            .output_dir
            .join(format!("{}.sqlite", self.config.run_tag()))
    }

    fn search_query(&self) -> SearchQuery {
        SearchQuery {
            release_id: self.config.release_id.clone(),
            taxon_id: self.config.taxon_id.clone(),
            limit: self.config.page_size,
        }
    }

    pub fn export(&self, sink: &dyn ProgressSink) -> Result<ExportResult, ExportError> {
        let started_at = timestamp();
        let mut stages = StageTracker::new(sink);
        let tables = self.table_paths();

        sink.event(ProgressEvent {
            message: format!("phase=Crawl; release {} taxon {}", self.config.release_id, self.config.taxon_id),
            elapsed: None,
        });
        let records = crawl_name_usages(&self.client, &self.store, &self.search_query(), sink)?;
        stages.advance(Stage::UsagesCrawled);

        let mut collector = IdentifierCollector::new();
        for record in &records {
            collector.observe_dataset(record);
        }
        let datasets = resolve_datasets(&self.client, &self.store, collector.dataset_keys(), sink)?;
        stages.advance(Stage::DatasetsResolved);

        write_table(&tables.datasets, datasets.values())?;
        let usages = self.write_usages(&tables.usages, &records, &datasets, &mut collector)?;
        stages.advance(Stage::UsageTableWritten);

        let references = resolve_references(
            &self.client,
            &self.store,
            &self.config.release_id,
            collector.reference_ids(),
            sink,
        )?;
        stages.advance(Stage::ReferencesResolved);

        write_table(&tables.references, references.iter())?;
        stages.advance(Stage::ReferenceTableWritten);
        stages.advance(Stage::Done);

        Ok(ExportResult {
            run_tag: self.config.run_tag(),
            stage: Stage::Done,
            usages,
            datasets: datasets.len(),
            references: references.len(),
            tables,
            started_at,
            finished_at: timestamp(),
        })
    }

    /// Streams usages into their table, collecting reference ids in the same
    /// pass so the reference table follows usage order.
    fn write_usages(
        &self,
        path: &Utf8Path,
        records: &[UsageRecord],
        datasets: &BTreeMap<String, DatasetMeta>,
        collector: &mut IdentifierCollector,
    ) -> Result<usize, ExportError> {
        let mut table = TableFile::create(path, UsageRow::COLUMNS)?;
        for record in records {
            let row = transform(record, datasets)?;
            table.write(&row)?;
            collector.observe_references(record);
        }
        table.commit()
    }

    /// Hands the finished tables to the relational import.
    pub fn import(
        &self,
        importer: &dyn TableImporter,
        result: &ExportResult,
        sink: &dyn ProgressSink,
    ) -> Result<ImportResult, ExportError> {
        let database = self.database_path();
        sink.event(ProgressEvent {
            message: format!("phase=Import; {database}"),
            elapsed: None,
        });
        importer.import(&result.tables, &self.config.schema_path, &database)?;
        info!(%database, "tables imported");
        Ok(ImportResult { database })
    }
}
