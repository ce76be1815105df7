use std::fs::{self, File};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use tempfile::NamedTempFile;

use crate::domain::{DatasetMeta, ReferenceMeta};
use crate::error::ExportError;
use crate::transform::UsageRow;

pub const USAGE_COLUMNS: [&str; 42] = [
    "kingdom",
    "phylum",
    "subphylum",
    "class",
    "order",
    "suborder",
    "infraorder",
    "parvorder",
    "superfamily",
    "family",
    "subfamily",
    "tribe",
    "subtribe",
    "genus",
    "subgenus",
    "species",
    "subspecies",
    "infraspecies",
    "form",
    "variety",
    "aberration",
    "other",
    "dataset_id",
    "dataset_alias",
    "parent_id",
    "taxon_id",
    "name_id",
    "rank",
    "accepted_id",
    "accepted_name",
    "accepted_author",
    "scientific_name",
    "authorship",
    "authors",
    "year",
    "status",
    "extinct",
    "temporal_range_start",
    "temporal_range_end",
    "link",
    "reference_id",
    "identifiers",
];

pub const DATASET_COLUMNS: [&str; 23] = [
    "dataset_id",
    "alias",
    "title",
    "issued",
    "version",
    "description",
    "contact",
    "creator",
    "editor",
    "publisher",
    "contributor",
    "doi",
    "license",
    "geographic_scope",
    "temporal_scope",
    "taxonomic_scope",
    "confidence",
    "completeness",
    "logo",
    "created",
    "modified",
    "type",
    "origin",
];

pub const REFERENCE_COLUMNS: [&str; 10] = [
    "reference_id",
    "source_id",
    "type",
    "authors",
    "year",
    "title",
    "citation",
    "journal",
    "volume",
    "page",
];

/// A value that serializes to one line of a table with a fixed header.
pub trait TableRow {
    const COLUMNS: &'static [&'static str];

    /// Field values in `COLUMNS` order.
    fn fields(&self) -> Vec<&str>;
}

impl TableRow for UsageRow {
    const COLUMNS: &'static [&'static str] = &USAGE_COLUMNS;

    fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.classification.names().collect();
        fields.extend([
            self.dataset_id.as_str(),
            self.dataset_alias.as_str(),
            self.parent_id.as_str(),
            self.taxon_id.as_str(),
            self.name_id.as_str(),
            self.rank.as_str(),
            self.accepted_id.as_str(),
            self.accepted_name.as_str(),
            self.accepted_author.as_str(),
            self.scientific_name.as_str(),
            self.authorship.as_str(),
            self.authors.as_str(),
            self.year.as_str(),
            self.status.as_str(),
            self.extinct.as_str(),
            self.temporal_range_start.as_str(),
            self.temporal_range_end.as_str(),
            self.link.as_str(),
            self.reference_id.as_str(),
            self.identifiers.as_str(),
        ]);
        fields
    }
}

impl TableRow for DatasetMeta {
    const COLUMNS: &'static [&'static str] = &DATASET_COLUMNS;

    fn fields(&self) -> Vec<&str> {
        vec![
            self.dataset_id.as_str(),
            self.alias.as_str(),
            self.title.as_str(),
            self.issued.as_str(),
            self.version.as_str(),
            self.description.as_str(),
            self.contact.as_str(),
            self.creator.as_str(),
            self.editor.as_str(),
            self.publisher.as_str(),
            self.contributor.as_str(),
            self.doi.as_str(),
            self.license.as_str(),
            self.geographic_scope.as_str(),
            self.temporal_scope.as_str(),
            self.taxonomic_scope.as_str(),
            self.confidence.as_str(),
            self.completeness.as_str(),
            self.logo.as_str(),
            self.created.as_str(),
            self.modified.as_str(),
            self.kind.as_str(),
            self.origin.as_str(),
        ]
    }
}

impl TableRow for ReferenceMeta {
    const COLUMNS: &'static [&'static str] = &REFERENCE_COLUMNS;

    fn fields(&self) -> Vec<&str> {
        vec![
            self.reference_id.as_str(),
            self.source_id.as_str(),
            self.kind.as_str(),
            self.authors.as_str(),
            self.year.as_str(),
            self.title.as_str(),
            self.citation.as_str(),
            self.journal.as_str(),
            self.volume.as_str(),
            self.page.as_str(),
        ]
    }
}

/// Tab separated, quoted only when needed, embedded quotes doubled. This is
/// the dialect `sqlite3 .mode tabs` imports; backslashes are plain bytes in it.
pub fn writer_builder() -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder
        .delimiter(b'\t')
        .quote(b'"')
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .terminator(Terminator::Any(b'\n'));
    builder
}

pub fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .delimiter(b'\t')
        .quote(b'"')
        .double_quote(true)
        .escape(None)
        .has_headers(false);
    builder
}

pub struct TableWriter<W: Write> {
    name: String,
    inner: csv::Writer<W>,
    columns: usize,
    rows: usize,
}

impl<W: Write> TableWriter<W> {
    /// Writes the header line immediately.
    pub fn new(name: &str, writer: W, columns: &[&str]) -> Result<Self, ExportError> {
        let mut table = Self {
            name: name.to_string(),
            inner: writer_builder().from_writer(writer),
            columns: columns.len(),
            rows: 0,
        };
        table.write_fields(columns)?;
        Ok(table)
    }

    fn error(&self, message: impl ToString) -> ExportError {
        ExportError::Table {
            table: self.name.clone(),
            message: message.to_string(),
        }
    }

    fn write_fields(&mut self, fields: &[&str]) -> Result<(), ExportError> {
        if fields.len() != self.columns {
            return Err(self.error(format!(
                "row has {} fields, header has {}",
                fields.len(),
                self.columns
            )));
        }
        self.inner
            .write_record(fields)
            .map_err(|err| self.error(err))
    }

    pub fn write<R: TableRow>(&mut self, row: &R) -> Result<(), ExportError> {
        self.write_fields(&row.fields())?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes and hands back the underlying writer with the data row count.
    pub fn finish(self) -> Result<(W, usize), ExportError> {
        let rows = self.rows;
        let name = self.name;
        let writer = self.inner.into_inner().map_err(|err| ExportError::Table {
            table: name,
            message: err.to_string(),
        })?;
        Ok((writer, rows))
    }
}

/// A table being written next to its final path; nothing appears at the
/// final path unless `commit` succeeds.
pub struct TableFile {
    path: Utf8PathBuf,
    writer: TableWriter<NamedTempFile>,
}

impl TableFile {
    pub fn create(path: &Utf8Path, columns: &[&str]) -> Result<Self, ExportError> {
        let name = path.file_name().unwrap_or(path.as_str()).to_string();
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| ExportError::Filesystem(format!("create {parent}: {err}")))?;
        let temp = tempfile::Builder::new()
            .prefix(".clb-table")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| ExportError::Filesystem(err.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: TableWriter::new(&name, temp, columns)?,
        })
    }

    pub fn write<R: TableRow>(&mut self, row: &R) -> Result<(), ExportError> {
        self.writer.write(row)
    }

    /// Moves the finished table into place and returns its data row count.
    pub fn commit(self) -> Result<usize, ExportError> {
        let (temp, rows) = self.writer.finish()?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| ExportError::Filesystem(format!("persist {}: {}", self.path, err.error)))?;
        Ok(rows)
    }
}

/// Writes a complete table in one go.
pub fn write_table<'a, R, I>(path: &Utf8Path, rows: I) -> Result<usize, ExportError>
where
    R: TableRow + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut table = TableFile::create(path, R::COLUMNS)?;
    for row in rows {
        table.write(row)?;
    }
    table.commit()
}

/// Reads a table back, header line included.
pub fn read_table(path: &Utf8Path) -> Result<Vec<Vec<String>>, ExportError> {
    let table_error = |message: String| ExportError::Table {
        table: path.to_string(),
        message,
    };
    let file = File::open(path.as_std_path()).map_err(|err| table_error(err.to_string()))?;
    let mut reader = reader_builder().from_reader(file);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| table_error(err.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::RANK_SLOTS;

    #[test]
    fn headers_have_documented_widths() {
        assert_eq!(USAGE_COLUMNS.len(), 42);
        assert_eq!(DATASET_COLUMNS.len(), 23);
        assert_eq!(REFERENCE_COLUMNS.len(), 10);
        assert_eq!(&USAGE_COLUMNS[..RANK_SLOTS.len()], &RANK_SLOTS[..]);
    }

    #[test]
    fn row_widths_match_headers() {
        assert_eq!(UsageRow::default().fields().len(), USAGE_COLUMNS.len());
        assert_eq!(DatasetMeta::default().fields().len(), DATASET_COLUMNS.len());
        assert_eq!(ReferenceMeta::default().fields().len(), REFERENCE_COLUMNS.len());
    }

    #[test]
    fn quoting_is_minimal() {
        let mut table = TableWriter::new("t", Vec::new(), &["a", "b", "c"]).unwrap();
        table.write_fields(&["plain", "with\ttab", "say \"hi\""]).unwrap();
        let (bytes, _) = table.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "a\tb\tc\nplain\t\"with\ttab\"\t\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn backslash_is_written_verbatim() {
        let mut table = TableWriter::new("t", Vec::new(), &["a"]).unwrap();
        table.write_fields(&["C:\\dir"]).unwrap();
        let (bytes, _) = table.finish().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "a\nC:\\dir\n");
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let mut table = TableWriter::new("t", Vec::new(), &["a", "b"]).unwrap();
        assert!(table.write_fields(&["only one"]).is_err());
    }
}
