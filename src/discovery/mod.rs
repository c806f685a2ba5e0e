//! Spec discovery
//!
//! Lists spec files from a directory and moves the generic spec to the
//! front so it launches before the rest of the suite.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::models::SpecFile;

/// Spec discovery errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Spec directory not found: {0}")]
    NotFound(PathBuf),

    #[error("Spec path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to read spec directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DiscoveryError {
    fn unreadable(path: &Path, source: io::Error) -> Self {
        DiscoveryError::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Discover spec files in `dir` whose name starts with `prefix`
///
/// Entries come back in lexical order, except that the spec named
/// `generic` (if present) is moved to the front. An empty result is not
/// an error.
pub fn discover(
    dir: impl AsRef<Path>,
    prefix: &str,
    generic: Option<&str>,
) -> Result<Vec<SpecFile>, DiscoveryError> {
    let dir = dir.as_ref();

    if !dir.exists() {
        return Err(DiscoveryError::NotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(DiscoveryError::NotADirectory(dir.to_path_buf()));
    }

    let root = fs::canonicalize(dir).map_err(|e| DiscoveryError::unreadable(dir, e))?;
    let entries = fs::read_dir(&root).map_err(|e| DiscoveryError::unreadable(&root, e))?;

    let mut specs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DiscoveryError::unreadable(&root, e))?;
        let path = entry.path();

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            debug!("Skipping non UTF-8 file name in {}", root.display());
            continue;
        };

        if !name.starts_with(prefix) || !path.is_file() {
            continue;
        }

        specs.push(SpecFile::new(name, path));
    }

    specs.sort_by(|a, b| a.name.cmp(&b.name));

    let specs = match generic {
        Some(generic) => reorder(specs, generic),
        None => specs,
    };

    debug!(
        "Discovered {} specs in {} with prefix '{}'",
        specs.len(),
        root.display(),
        prefix
    );

    Ok(specs)
}

/// Move the spec named `generic` to the front, keeping everything else in
/// its original relative order
pub fn reorder(entries: Vec<SpecFile>, generic: &str) -> Vec<SpecFile> {
    let (mut ordered, rest): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .map(|spec| {
            let is_generic = spec.name == generic;
            spec.generic(is_generic)
        })
        .partition(|spec| spec.is_generic);

    ordered.extend(rest);
    ordered
}
