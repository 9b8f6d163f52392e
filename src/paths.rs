//! Canonical path helpers.
//!
//! Directory paths in the registry are absolute, symlink-free and end with
//! exactly one `/`; symlink paths never carry a trailing separator. With that
//! normalization a plain string prefix test is a correct ancestor test
//! (`/a/b/` is not a prefix of `/a/bc/`).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub const SEPARATOR: char = '/';

/// Errors from resolving a path on disk.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("{path} does not exist")]
    NotFound { path: String },

    #[error("{path} is not a directory")]
    NotADirectory { path: String },

    #[error("{path} is not accessible: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Resolve `path` to the canonical, slash-terminated path of a directory.
///
/// Fails when the target vanished, is not a directory, or cannot be read.
/// Callers treat every failure as "skip this entry".
pub fn canonicalize(path: &str) -> Result<String, PathError> {
    let resolved = std::fs::canonicalize(path).map_err(|e| classify(path, e))?;
    let metadata = std::fs::metadata(&resolved).map_err(|e| classify(path, e))?;

    if !metadata.is_dir() {
        return Err(PathError::NotADirectory {
            path: path.to_string(),
        });
    }

    Ok(with_trailing_separator(resolved))
}

fn classify(path: &str, error: io::Error) -> PathError {
    match error.kind() {
        io::ErrorKind::NotFound => PathError::NotFound {
            path: path.to_string(),
        },
        io::ErrorKind::NotADirectory => PathError::NotADirectory {
            path: path.to_string(),
        },
        _ => PathError::Unavailable {
            path: path.to_string(),
            source: error,
        },
    }
}

fn with_trailing_separator(path: PathBuf) -> String {
    let mut path = path.to_string_lossy().into_owned();
    if !path.ends_with(SEPARATOR) {
        path.push(SEPARATOR);
    }
    path
}

/// Join a directory name onto `base`; the result always ends with one `/`.
///
/// `join_dir("/a/", "b")`, `join_dir("/a", "/b/")` and `join_dir("/a//", "b")`
/// all give `/a/b/`. An empty (or separator-only) name yields `base/`.
pub fn join_dir(base: &str, name: &str) -> String {
    let base = base.trim_end_matches(SEPARATOR);
    let name = name.trim_matches(SEPARATOR);

    let mut joined = String::with_capacity(base.len() + name.len() + 2);
    joined.push_str(base);
    joined.push(SEPARATOR);
    if !name.is_empty() {
        joined.push_str(name);
        joined.push(SEPARATOR);
    }
    joined
}

/// Join a leaf (file or symlink) name onto `base`; the result never ends with
/// a separator unless `name` is empty, in which case `base` comes back as is.
pub fn join_leaf(base: &str, name: &str) -> String {
    let name = name.trim_matches(SEPARATOR);
    if name.is_empty() {
        return base.to_string();
    }

    let base = base.trim_end_matches(SEPARATOR);
    let mut joined = String::with_capacity(base.len() + name.len() + 1);
    joined.push_str(base);
    joined.push(SEPARATOR);
    joined.push_str(name);
    joined
}

/// Whether `candidate_child` starts with `candidate_parent`.
///
/// Equal paths count as related.
pub fn is_prefix_of(candidate_parent: &str, candidate_child: &str) -> bool {
    candidate_child.starts_with(candidate_parent)
}
