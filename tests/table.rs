use camino::Utf8PathBuf;

use clb_exporter::domain::{DatasetMeta, ReferenceMeta};
use clb_exporter::error::ExportError;
use clb_exporter::table::{DATASET_COLUMNS, REFERENCE_COLUMNS, TableWriter, read_table, write_table};

fn temp_path(name: &str) -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join(name)).unwrap();
    (temp, path)
}

#[test]
fn plain_rows_are_written_unquoted() {
    let reference = ReferenceMeta {
        reference_id: "R1".to_string(),
        authors: "Smith, J.".to_string(),
        year: "1900".to_string(),
        ..ReferenceMeta::default()
    };
    let mut writer = TableWriter::new("references", Vec::new(), &REFERENCE_COLUMNS).unwrap();
    writer.write(&reference).unwrap();
    let (bytes, rows) = writer.finish().unwrap();
    assert_eq!(rows, 1);

    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], REFERENCE_COLUMNS.join("\t"));
    assert_eq!(lines[1], "R1\t\t\tSmith, J.\t1900\t\t\t\t\t");
    assert!(text.ends_with('\n'));
    assert!(!text.contains('\r'));
}

#[test]
fn special_characters_survive_a_round_trip() {
    let (_temp, path) = temp_path("datasets.tsv");
    let awkward = DatasetMeta {
        dataset_id: "1010".to_string(),
        alias: "tab\there".to_string(),
        title: "say \"hi\"".to_string(),
        description: "line one\nline two".to_string(),
        license: r"C:\path\to".to_string(),
        origin: "trailing backslash \\".to_string(),
        ..DatasetMeta::default()
    };
    let plain = DatasetMeta {
        dataset_id: "1011".to_string(),
        title: "Plain".to_string(),
        ..DatasetMeta::default()
    };

    let written = write_table(&path, [&awkward, &plain]).unwrap();
    assert_eq!(written, 2);

    let rows = read_table(&path).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], DATASET_COLUMNS.to_vec());
    assert!(rows.iter().all(|row| row.len() == DATASET_COLUMNS.len()));

    let column = |name: &str| DATASET_COLUMNS.iter().position(|col| *col == name).unwrap();
    assert_eq!(rows[1][column("alias")], "tab\there");
    assert_eq!(rows[1][column("title")], "say \"hi\"");
    assert_eq!(rows[1][column("description")], "line one\nline two");
    assert_eq!(rows[1][column("license")], r"C:\path\to");
    assert_eq!(rows[1][column("origin")], "trailing backslash \\");
    assert_eq!(rows[2][column("title")], "Plain");
    assert_eq!(rows[2][column("alias")], "");
}

#[test]
fn empty_table_keeps_its_header() {
    let (_temp, path) = temp_path("references.tsv");
    let written = write_table::<ReferenceMeta, _>(&path, []).unwrap();
    assert_eq!(written, 0);

    let rows = read_table(&path).unwrap();
    assert_eq!(rows, vec![REFERENCE_COLUMNS.to_vec()]);
}

#[test]
fn rewriting_replaces_the_previous_table() {
    let (_temp, path) = temp_path("references.tsv");
    let first = ReferenceMeta {
        reference_id: "old".to_string(),
        ..ReferenceMeta::default()
    };
    let second = ReferenceMeta {
        reference_id: "new".to_string(),
        ..ReferenceMeta::default()
    };
    write_table(&path, [&first]).unwrap();
    write_table(&path, [&second]).unwrap();

    let rows = read_table(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0], "new");
}

#[test]
fn missing_table_is_a_table_error() {
    let (_temp, path) = temp_path("absent.tsv");
    let err = read_table(&path).unwrap_err();
    assert!(matches!(err, ExportError::Table { .. }));
}
