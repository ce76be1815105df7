use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::domain::EntityKind;
use crate::error::ExportError;

/// Recorded upstream responses, consulted before every request.
pub trait ReplayStore {
    fn lookup(&self, kind: EntityKind, key: &str) -> Result<Option<Vec<u8>>, ExportError>;
    fn store(&self, kind: EntityKind, key: &str, body: &[u8]) -> Result<(), ExportError>;
}

/// File-backed replay store: one JSON file per response under
/// `<root>/<run tag>/<kind>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: Utf8PathBuf,
    replay: bool,
}

impl FsStore {
    pub fn new(cache_root: &Utf8Path, run_tag: &str) -> Self {
        Self {
            root: cache_root.join(run_tag),
            replay: true,
        }
    }

    /// Keeps recording responses but never replays them.
    pub fn without_replay(mut self) -> Self {
        self.replay = false;
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn entry_path(&self, kind: EntityKind, key: &str) -> Utf8PathBuf {
        self.root
            .join(kind.as_str())
            .join(format!("{}.json", file_stem(key)))
    }

    pub fn clear(&self) -> Result<bool, ExportError> {
        if !self.root.as_std_path().exists() {
            return Ok(false);
        }
        fs::remove_dir_all(self.root.as_std_path())
            .map_err(|err| ExportError::Cache(format!("remove {}: {err}", self.root)))?;
        Ok(true)
    }
}

impl ReplayStore for FsStore {
    fn lookup(&self, kind: EntityKind, key: &str) -> Result<Option<Vec<u8>>, ExportError> {
        if !self.replay {
            return Ok(None);
        }
        let path = self.entry_path(kind, key);
        match fs::read(path.as_std_path()) {
            Ok(body) => Ok(Some(body)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ExportError::Cache(format!("read {path}: {err}"))),
        }
    }

    fn store(&self, kind: EntityKind, key: &str, body: &[u8]) -> Result<(), ExportError> {
        let path = self.entry_path(kind, key);
        write_bytes_atomic(&path, body).map_err(|err| ExportError::Cache(format!("write {path}: {err}")))
    }
}

/// Writes through a temp file in the target directory so a crash never
/// leaves a half-written entry that would later be replayed.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(parent.as_std_path())?;
    let mut temp = Builder::new()
        .prefix(".clb-entry")
        .tempfile_in(parent.as_std_path())?;
    temp.write_all(content)?;
    temp.persist(path.as_std_path()).map_err(|err| err.error)?;
    Ok(())
}

/// Maps an upstream key onto a safe file name; anything outside
/// `[A-Za-z0-9._-]` is percent-encoded.
fn file_stem(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') || (byte == b'.' && !out.is_empty()) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = FsStore::new(Utf8Path::new("/tmp/cache"), "col_3LR_X");
        let path = store.entry_path(EntityKind::NameUsages, "2000");
        assert!(path.ends_with("col_3LR_X/nameusages/2000.json"));
        let path = store.entry_path(EntityKind::References, "a/b");
        assert!(path.ends_with("references/a%2Fb.json"));
    }

    #[test]
    fn leading_dot_is_encoded() {
        assert_eq!(file_stem(".."), "%2E.");
        assert_eq!(file_stem("1.2"), "1.2");
    }

    #[test]
    fn lookup_after_store() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = FsStore::new(&root, "run");

        assert_eq!(store.lookup(EntityKind::Datasets, "1010").unwrap(), None);
        store.store(EntityKind::Datasets, "1010", b"{}").unwrap();
        assert_eq!(
            store.lookup(EntityKind::Datasets, "1010").unwrap(),
            Some(b"{}".to_vec())
        );

        let write_only = store.clone().without_replay();
        assert_eq!(write_only.lookup(EntityKind::Datasets, "1010").unwrap(), None);

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
    }
}
