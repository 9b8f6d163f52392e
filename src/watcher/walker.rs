//! Breadth-first directory walker that feeds the registry.
//!
//! The walker lists directories one level at a time and registers every real
//! subdirectory and every symlink that resolves to a directory. A symlink's
//! target is only walked the first time it is registered, so cyclic links
//! terminate.

use std::fs;
use std::sync::Arc;

use super::WatchError;
use super::registry::Registry;
use super::source::WatchSource;
use crate::config::RuntimeConfig;
use crate::paths;
use crate::queue::Queue;

/// Walks directory trees into a [`Registry`].
#[derive(Debug, Clone)]
pub struct TreeWalker {
    config: Arc<RuntimeConfig>,
}

impl TreeWalker {
    pub fn new(config: Arc<RuntimeConfig>) -> Self {
        Self { config }
    }

    /// Register `path` (reached through `symlink`, if given) and, when
    /// `recursive`, everything below it.
    ///
    /// Only a failure to register `path` itself is returned. Children that
    /// cannot be watched are reported and skipped, and a directory that can
    /// no longer be listed is skipped without ending the walk.
    pub fn watch_tree<S: WatchSource>(
        &self,
        registry: &mut Registry<S>,
        path: &str,
        symlink: Option<&str>,
        recursive: bool,
    ) -> Result<(), WatchError> {
        registry.add(path, symlink)?;

        if !recursive {
            return Ok(());
        }

        let mut frontier = Queue::new();
        frontier.enqueue(path.to_string());

        while let Some(dir) = frontier.dequeue() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("[walker] unable to list {dir}: {e}");
                    continue;
                }
            };

            for entry in entries.flatten() {
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                let name = entry.file_name().to_string_lossy().into_owned();

                if file_type.is_dir() {
                    if self.config.filter.is_excluded(&name) {
                        crate::debug_event!("walker", "excluded", "{dir}{name}");
                        continue;
                    }

                    let child = paths::join_dir(&dir, &name);
                    match registry.add(&child, None) {
                        Ok(_) => {
                            frontier.enqueue(child);
                        }
                        Err(e) => report_watch_failure(&e),
                    }
                } else if file_type.is_symlink() && self.config.follow_symlinks {
                    let link = paths::join_leaf(&dir, &name);
                    if registry.find_symlink(&link).is_some() {
                        continue;
                    }

                    let real_path = match paths::canonicalize(&link) {
                        Ok(real_path) => real_path,
                        Err(e) => {
                            crate::debug_event!("walker", "skipping symlink", "{e}");
                            continue;
                        }
                    };

                    let first_visit = !registry.contains_path(&real_path);
                    match registry.add(&real_path, Some(&link)) {
                        Ok(_) if first_visit => {
                            frontier.enqueue(real_path);
                        }
                        Ok(_) => {}
                        Err(e) => report_watch_failure(&e),
                    }
                }
            }
        }

        Ok(())
    }
}

/// Warn about a directory that could not be watched.
pub fn report_watch_failure(error: &WatchError) {
    tracing::warn!(
        "[walker] {error}. Either the watch limit was reached \
         (see /proc/sys/fs/inotify/max_user_watches) or the directory is gone"
    );
}
