//! Snapshot serialization and atomic persistence.
//!
//! A snapshot is rendered to JSON and written to its destination through a
//! temporary file in the same directory followed by a rename, so readers
//! see either the previous file or the complete new one. Failures are
//! reported once and never retried here.
//!
//! Rendering and parsing grow the stack on the heap as they descend, so
//! there is no depth at which a snapshot can be written but not read back.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::snapshot::ElementSnapshot;

/// The snapshot could not be stored.
#[derive(Error, Debug)]
#[error("Failed to {operation} '{}': {source}", .path.display())]
pub struct PersistenceFailure {
    /// The step that failed (`serialize`, `create_temp`, `write_json`, `sync`, `rename`).
    pub operation: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Renders a snapshot to JSON. A missing root renders as `null`.
///
/// Compact output is a single line; `pretty` indents with two spaces. Both
/// keep the field order of [`ElementSnapshot`].
pub fn render(root: Option<&ElementSnapshot>, pretty: bool) -> Result<String, serde_json::Error> {
    let mut out = Vec::with_capacity(4096);
    if pretty {
        let mut ser = serde_json::Serializer::pretty(&mut out);
        root.serialize(serde_stacker::Serializer::new(&mut ser))?;
    } else {
        let mut ser = serde_json::Serializer::new(&mut out);
        root.serialize(serde_stacker::Serializer::new(&mut ser))?;
    }
    String::from_utf8(out).map_err(serde::ser::Error::custom)
}

/// Parses JSON of any nesting depth.
///
/// serde_json stops at 128 levels by default; this lifts the limit and
/// grows the stack on demand instead.
pub fn parse_json<T: DeserializeOwned>(json: &str) -> Result<T, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(json);
    de.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Parses a written snapshot. `null` yields `None`.
pub fn parse(json: &str) -> Result<Option<ElementSnapshot>, serde_json::Error> {
    parse_json(json)
}

/// Writes rendered snapshots to a fixed destination path.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
    pretty: bool,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: false,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the destination with the rendered snapshot.
    ///
    /// Returns the number of bytes written. On failure the destination is
    /// left untouched and no temporary file remains.
    pub fn write(&self, root: Option<&ElementSnapshot>) -> Result<usize, PersistenceFailure> {
        let json = render(root, self.pretty).map_err(|e| self.serialize_failure(e))?;
        let temp_path = self.temp_path();

        if let Err(e) = self.write_temp(&temp_path, json.as_bytes()) {
            remove_temp(&temp_path);
            return Err(e);
        }

        if let Err(source) = fs::rename(&temp_path, &self.path) {
            remove_temp(&temp_path);
            return Err(PersistenceFailure {
                operation: "rename",
                path: self.path.clone(),
                source,
            });
        }

        #[cfg(unix)]
        self.sync_parent();

        debug!(path = %self.path.display(), bytes = json.len(), "snapshot written");
        Ok(json.len())
    }

    fn serialize_failure(&self, e: serde_json::Error) -> PersistenceFailure {
        PersistenceFailure {
            operation: "serialize",
            path: self.path.clone(),
            source: e.into(),
        }
    }

    fn write_temp(&self, temp_path: &Path, bytes: &[u8]) -> Result<(), PersistenceFailure> {
        let fail = |operation: &'static str| {
            let path = temp_path.to_path_buf();
            move |source| PersistenceFailure {
                operation,
                path,
                source,
            }
        };

        let file = File::create(temp_path).map_err(fail("create_temp"))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes).map_err(fail("write_json"))?;
        let file = writer
            .into_inner()
            .map_err(|e| fail("write_json")(e.into_error()))?;
        file.sync_all().map_err(fail("sync"))?;
        Ok(())
    }

    /// Flushes the rename itself. The new content is already in place, so a
    /// failure here is logged rather than returned.
    #[cfg(unix)]
    fn sync_parent(&self) {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if let Err(e) = File::open(dir).and_then(|dir| dir.sync_all()) {
            warn!(path = %dir.display(), error = %e, "failed to sync snapshot directory");
        }
    }

    /// Sibling of the destination, unique per write.
    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        let temp_name = format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple());
        self.path.with_file_name(temp_name)
    }
}

fn remove_temp(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path) {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %temp_path.display(), error = %e, "failed to remove temp file");
        }
    }
}
