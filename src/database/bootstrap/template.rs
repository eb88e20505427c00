//! Template providers and materialization of a fresh store

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::database::core::{
    template_bytes, StoreError, StoreOpenError, StoreResult, TEMPLATE_VERSION,
};

/// Source of the prebuilt version-1 store.
///
/// Every call must return a stream positioned at the start of the template.
pub trait TemplateProvider {
    fn template_stream(&self) -> io::Result<Box<dyn Read + '_>>;
}

/// Template read from a file on disk
#[derive(Debug, Clone)]
pub struct FileTemplate {
    path: PathBuf,
}

impl FileTemplate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemplateProvider for FileTemplate {
    fn template_stream(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(std::fs::File::open(&self.path)?))
    }
}

/// Template held in memory
#[derive(Debug, Clone)]
pub struct BytesTemplate {
    bytes: Vec<u8>,
}

impl BytesTemplate {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The template this crate generates itself
    pub fn builtin() -> StoreResult<Self> {
        Ok(Self::new(template_bytes()?))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl TemplateProvider for BytesTemplate {
    fn template_stream(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self.bytes.as_slice()))
    }
}

/// Copy the template to `target`.
///
/// The bytes go to a temporary file next to `target`, which is synced,
/// checked to open as a store, and only then renamed into place. On any
/// failure the temporary file is removed and `target` is left untouched.
pub fn materialize(provider: &dyn TemplateProvider, target: &Path) -> Result<(), StoreOpenError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| {
        StoreOpenError::creation_aborted(target, "cannot create store directory", e)
    })?;

    info!("fetching template for {}", target.display());
    let mut stream = provider
        .template_stream()
        .map_err(|e| StoreOpenError::creation_aborted(target, "template unavailable", e))?;

    let mut tmp = NamedTempFile::new_in(&dir)
        .map_err(|e| StoreOpenError::creation_aborted(target, "cannot create temporary file", e))?;
    let copied = io::copy(&mut stream, tmp.as_file_mut())
        .map_err(|e| StoreOpenError::creation_aborted(target, "template copy failed", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreOpenError::creation_aborted(target, "template sync failed", e))?;
    debug!(bytes = copied, "template copied to {}", tmp.path().display());

    verify(tmp.path())
        .map_err(|e| StoreOpenError::creation_aborted(target, "template is not a valid store", e))?;

    tmp.persist(target).map_err(|e| {
        StoreOpenError::creation_aborted(target, "cannot move template into place", e.error)
    })?;
    info!("materialized template at {}", target.display());
    Ok(())
}

/// Check, read-only, that the copied file is a store holding at least one
/// table and carrying a schema version. The copy is never written to, so the
/// persisted store stays byte-identical to the template.
fn verify(path: &Path) -> StoreResult<()> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let tables: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
        [],
        |row| row.get(0),
    )?;
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;

    if tables == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "template holds no tables").into());
    }
    if version < i64::from(TEMPLATE_VERSION) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("template carries schema version {}", version),
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{SqliteStore, StoreHandle};
    use assert_matches::assert_matches;

    #[test]
    fn test_materialize_builtin_template() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("stores").join("catalog.db");
        let template = BytesTemplate::builtin().unwrap();

        materialize(&template, &target).unwrap();

        let store = SqliteStore::open(&target).unwrap();
        assert_eq!(store.version().unwrap(), TEMPLATE_VERSION);
    }

    #[test]
    fn test_materialized_file_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("catalog.db");
        let template = BytesTemplate::builtin().unwrap();

        materialize(&template, &target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), template.bytes);
    }

    #[test]
    fn test_unversioned_template_is_rejected_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("unversioned.db");
        {
            let conn = rusqlite::Connection::open(&source).unwrap();
            conn.execute_batch("CREATE TABLE T (_id INTEGER PRIMARY KEY);")
                .unwrap();
        }
        let original = std::fs::read(&source).unwrap();
        let stores = dir.path().join("stores");
        let target = stores.join("catalog.db");

        let result = materialize(&FileTemplate::new(&source), &target);
        assert_matches!(result, Err(StoreOpenError::CreationAborted { .. }));
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(&stores).unwrap().count(), 0);
        assert_eq!(std::fs::read(&source).unwrap(), original);
    }

    #[test]
    fn test_file_template_is_copied_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("shipped.db");
        crate::database::core::write_template(&source).unwrap();
        let target = dir.path().join("stores").join("catalog.db");

        materialize(&FileTemplate::new(&source), &target).unwrap();
        assert_eq!(
            std::fs::read(&target).unwrap(),
            std::fs::read(&source).unwrap()
        );
    }

    #[test]
    fn test_missing_template_file_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("catalog.db");

        let result = materialize(&FileTemplate::new(dir.path().join("nope.db")), &target);
        assert_matches!(result, Err(StoreOpenError::CreationAborted { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn test_garbage_and_empty_templates_abort_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("catalog.db");

        for bytes in [vec![0x5a; 4096], Vec::new()] {
            let result = materialize(&BytesTemplate::new(bytes), &target);
            assert_matches!(result, Err(StoreOpenError::CreationAborted { .. }));
        }
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
