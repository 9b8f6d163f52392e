//! The event loop.
//!
//! Reads batches from the watch source, keeps the registry in step with
//! directories and symlinks appearing and disappearing, and hands every
//! qualifying event to the [`CommandRunner`].

use std::fs;
use std::sync::Arc;

use super::WatchError;
use super::event::{EventKind, EventMask, Handler};
use super::registry::Registry;
use super::source::{RawEvent, WatchSource};
use super::walker::{TreeWalker, report_watch_failure};
use crate::command::{CommandRunner, EventContext};
use crate::config::RuntimeConfig;
use crate::paths;

/// What became of a single raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Filtered out, masked out, unnamed, or from an unknown watch.
    Discarded,
    /// Handled, and the command ran.
    Executed,
}

pub struct Dispatcher<S: WatchSource, R: CommandRunner> {
    registry: Registry<S>,
    walker: TreeWalker,
    config: Arc<RuntimeConfig>,
    runner: R,
    exec_count: u64,
}

impl<S: WatchSource, R: CommandRunner> Dispatcher<S, R> {
    pub fn new(registry: Registry<S>, config: Arc<RuntimeConfig>, runner: R) -> Self {
        Self {
            registry,
            walker: TreeWalker::new(Arc::clone(&config)),
            config,
            runner,
            exec_count: 0,
        }
    }

    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Number of times the runner has been invoked.
    pub fn exec_count(&self) -> u64 {
        self.exec_count
    }

    /// Register the root directory, and its tree when recursive.
    pub fn watch_root(&mut self) -> Result<(), WatchError> {
        let root = self.config.root_path.clone();
        self.walker
            .watch_tree(&mut self.registry, &root, None, self.config.recursive)
    }

    /// Process events until a fatal error.
    ///
    /// Only returns on failure: the event stream could not be read or the
    /// runner could not act on an event.
    pub fn run(&mut self) -> Result<(), WatchError> {
        loop {
            let events = self
                .registry
                .source_mut()
                .read_events()
                .map_err(|e| WatchError::StreamRead {
                    reason: e.to_string(),
                })?;

            for event in &events {
                self.process(event)?;
            }
        }
    }

    /// Drop every watch. Used when the loop ends.
    pub fn shutdown(&mut self) {
        crate::log_event!("dispatcher", "releasing watches", "{}", self.registry.len());
        self.registry.release_all();
    }

    /// Process a single raw event.
    pub fn process(&mut self, event: &RawEvent<S::Handle>) -> Result<Disposition, WatchError> {
        if event.mask.contains(EventMask::Q_OVERFLOW) {
            tracing::warn!("[dispatcher] event queue overflowed, some events were lost");
        }

        if self.config.filter.is_excluded(&event.name) {
            crate::debug_event!("dispatcher", "excluded", "{}", event.name);
            return Ok(Disposition::Discarded);
        }

        let Some(dir) = self
            .registry
            .find_by_handle(&event.handle)
            .and_then(|id| self.registry.resource(id))
            .map(|resource| resource.path().to_string())
        else {
            crate::debug_event!("dispatcher", "unknown watch", "{:?}", event.handle);
            return Ok(Disposition::Discarded);
        };

        let path = if event.is_dir() {
            paths::join_dir(&dir, &event.name)
        } else {
            paths::join_leaf(&dir, &event.name)
        };

        let Some(kind) = EventKind::classify(event.mask & self.config.mask) else {
            return Ok(Disposition::Discarded);
        };

        let Some(caught) = self.config.filter.catch(&event.name) else {
            crate::debug_event!("dispatcher", "not caught", "{}", event.name);
            return Ok(Disposition::Discarded);
        };

        crate::log_event!("dispatcher", kind, "{path}");

        let registered = match kind.handler() {
            Handler::Create => self.on_created(&path, event.is_dir(), false),
            Handler::Delete | Handler::MovedFrom => {
                self.on_removed(&path, event.is_dir());
                Ok(())
            }
            Handler::MovedTo if paths::is_prefix_of(&self.config.root_path, &path) => {
                self.on_created(&path, event.is_dir(), true)
            }
            Handler::MovedTo | Handler::Passive => Ok(()),
        };
        match registered {
            Ok(()) => {}
            Err(WatchError::ResourceUnavailable(e)) => {
                crate::debug_event!("dispatcher", "skipping", "{e}");
            }
            Err(e) => report_watch_failure(&e),
        }

        self.exec_count += 1;
        let ctx = EventContext {
            event: kind.name(),
            name: &event.name,
            dir: &dir,
            root: &self.config.root_path,
            count: self.exec_count,
            captured: caught.group.as_deref(),
        };
        self.runner.run(&ctx)?;

        Ok(Disposition::Executed)
    }

    /// A directory or symlink appeared at `path`.
    ///
    /// A created directory is registered on its own; a moved-in one is
    /// walked, since nothing announces the entries it already holds. A
    /// symlink that no longer resolves yields
    /// [`WatchError::ResourceUnavailable`].
    fn on_created(&mut self, path: &str, is_dir: bool, moved_in: bool) -> Result<(), WatchError> {
        if !self.config.recursive {
            return Ok(());
        }

        if is_dir {
            self.walker
                .watch_tree(&mut self.registry, path, None, moved_in)
        } else if self.config.follow_symlinks && is_symlink(path) {
            let real_path = paths::canonicalize(path)?;
            let first_visit = !self.registry.contains_path(&real_path);
            self.walker
                .watch_tree(&mut self.registry, &real_path, Some(path), first_visit)
        } else {
            Ok(())
        }
    }

    /// Something at `path` was deleted or moved away.
    fn on_removed(&mut self, path: &str, is_dir: bool) {
        if is_dir {
            let removed = self.registry.remove_subtree(path);
            crate::debug_event!("dispatcher", "directory gone", "{path} ({removed} unwatched)");
        } else if self.registry.find_symlink(path).is_some() {
            let removed = self.registry.remove_symlink_cascading(path);
            crate::debug_event!("dispatcher", "symlink gone", "{path} ({removed} unwatched)");
        }
    }
}

impl<S, R> std::fmt::Debug for Dispatcher<S, R>
where
    S: WatchSource + std::fmt::Debug,
    R: CommandRunner,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("exec_count", &self.exec_count)
            .finish_non_exhaustive()
    }
}

fn is_symlink(path: &str) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
}
