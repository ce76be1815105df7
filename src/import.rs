use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use camino::Utf8Path;

use crate::app::TablePaths;
use crate::error::ExportError;

/// Target tables of the import schema, paired with the file feeding them.
pub const TABLE_NAMES: [&str; 3] = ["nameusage", "reference", "dataset"];

/// Loads finished tables into a relational store.
pub trait TableImporter {
    fn import(
        &self,
        tables: &TablePaths,
        schema: &Utf8Path,
        database: &Utf8Path,
    ) -> Result<(), ExportError>;
}

/// Imports through the `sqlite3` command line shell.
#[derive(Debug, Clone)]
pub struct SqliteCliImporter {
    sqlite3: Option<PathBuf>,
}

impl Default for SqliteCliImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteCliImporter {
    pub fn new() -> Self {
        Self {
            sqlite3: find_in_path("sqlite3"),
        }
    }

    /// Location of the `sqlite3` shell, when one is on `PATH`.
    pub fn sqlite3(&self) -> Option<&Path> {
        self.sqlite3.as_deref()
    }

    /// Argument lists for each `sqlite3` invocation, in execution order.
    pub fn commands(tables: &TablePaths, schema: &Utf8Path, database: &Utf8Path) -> Vec<Vec<String>> {
        let mut commands = vec![vec![database.to_string(), format!(".read {schema}")]];
        let sources = [&tables.usages, &tables.references, &tables.datasets];
        for (table, source) in TABLE_NAMES.iter().zip(sources) {
            commands.push(vec![
                database.to_string(),
                ".mode tabs".to_string(),
                format!(".import --skip 1 {source} {table}"),
            ]);
        }
        commands
    }

    fn run_cmd(&self, program: &Path, args: &[String]) -> Result<(), ExportError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| ExportError::Import(err.to_string()))?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if output.status.success() && stderr.is_empty() {
            return Ok(());
        }
        let message = if stderr.is_empty() {
            format!("command failed: {} {}", program.display(), args.join(" "))
        } else {
            stderr
        };
        Err(ExportError::Import(message))
    }
}

impl TableImporter for SqliteCliImporter {
    fn import(
        &self,
        tables: &TablePaths,
        schema: &Utf8Path,
        database: &Utf8Path,
    ) -> Result<(), ExportError> {
        let sqlite3 = self
            .sqlite3
            .as_ref()
            .ok_or_else(|| ExportError::MissingTool("sqlite3".to_string()))?;
        if !schema.as_std_path().exists() {
            return Err(ExportError::Import(format!("schema file not found: {schema}")));
        }

        // Built next to the target and moved over it, so reruns start from an
        // empty database and a failed import leaves the previous one intact.
        let parent = match database.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| ExportError::Filesystem(format!("create {parent}: {err}")))?;
        let staging = tempfile::Builder::new()
            .prefix(".clb-db")
            .suffix(".sqlite")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| ExportError::Filesystem(err.to_string()))?
            .into_temp_path();
        let staging_path = Utf8Path::from_path(&staging)
            .ok_or_else(|| ExportError::Filesystem(format!("non UTF-8 path: {}", staging.display())))?;

        for args in Self::commands(tables, schema, staging_path) {
            tracing::debug!(args = ?args, "sqlite3");
            self.run_cmd(sqlite3, &args)?;
        }
        staging
            .persist(database.as_std_path())
            .map_err(|err| ExportError::Filesystem(format!("persist {database}: {}", err.error)))
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_apply_schema_then_import_each_table() {
        let tables = TablePaths::for_run(Utf8Path::new("out"), "col_3LR_X");
        let commands = SqliteCliImporter::commands(
            &tables,
            Utf8Path::new("schema.sql"),
            Utf8Path::new("out/col_3LR_X.sqlite"),
        );
        assert_eq!(commands.len(), 4);
        assert_eq!(commands[0], vec!["out/col_3LR_X.sqlite", ".read schema.sql"]);
        assert_eq!(commands[1][2], ".import --skip 1 out/col_3LR_X.tsv nameusage");
        assert_eq!(commands[2][2], ".import --skip 1 out/col_3LR_X_references.tsv reference");
        assert_eq!(commands[3][2], ".import --skip 1 out/col_3LR_X_datasets.tsv dataset");
        assert!(commands[1..].iter().all(|args| args[1] == ".mode tabs"));
    }
}
