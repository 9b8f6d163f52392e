//! The boundary between the registry and the kernel.
//!
//! [`WatchSource`] is everything the core needs from a notification backend:
//! add a watch, drop a watch, and block for the next batch of events.
//! [`ScriptedSource`] is an in-memory backend that hands out fresh handles and
//! replays queued batches, so the registry, walker and dispatcher can be
//! driven without inotify.

use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::io;

use indexmap::IndexMap;

use super::event::EventMask;

/// One notification record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent<H> {
    /// Handle of the watched directory the event happened in.
    pub handle: H,
    /// Raw event bits as delivered.
    pub mask: EventMask,
    /// Name of the entry inside the watched directory; empty for events on
    /// the directory itself.
    pub name: String,
}

impl<H> RawEvent<H> {
    pub fn new(handle: H, mask: EventMask, name: impl Into<String>) -> Self {
        Self {
            handle,
            mask,
            name: name.into(),
        }
    }

    /// Whether the entry the event is about is a directory.
    pub fn is_dir(&self) -> bool {
        self.mask.contains(EventMask::ISDIR)
    }
}

/// A kernel change-notification backend.
pub trait WatchSource {
    /// Opaque watch identifier.
    type Handle: Clone + Eq + Debug;

    /// Start watching `path` for the events in `mask`.
    fn add_watch(&mut self, path: &str, mask: EventMask) -> io::Result<Self::Handle>;

    /// Stop watching. Fails if the backend already dropped the watch.
    fn remove_watch(&mut self, handle: &Self::Handle) -> io::Result<()>;

    /// Block until at least one event is available and return the batch.
    fn read_events(&mut self) -> io::Result<Vec<RawEvent<Self::Handle>>>;
}

/// In-memory [`WatchSource`] that replays queued event batches.
///
/// Handles are increasing integers and never reused. Once the queued batches
/// are exhausted `read_events` fails, which ends a dispatcher run.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    next_handle: u32,
    live: IndexMap<u32, String>,
    refused: HashSet<String>,
    batches: VecDeque<Vec<RawEvent<u32>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `add_watch` on `path` fail, as when the watch limit
    /// is reached.
    pub fn refuse(&mut self, path: impl Into<String>) {
        self.refused.insert(path.into());
    }

    /// Queue a batch for a later `read_events`.
    pub fn push_batch(&mut self, batch: Vec<RawEvent<u32>>) {
        self.batches.push_back(batch);
    }

    /// Paths with a live watch, in the order they were added.
    pub fn watched_paths(&self) -> impl Iterator<Item = &str> {
        self.live.values().map(String::as_str)
    }

    pub fn is_watching(&self, path: &str) -> bool {
        self.live.values().any(|p| p == path)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl WatchSource for ScriptedSource {
    type Handle = u32;

    fn add_watch(&mut self, path: &str, _mask: EventMask) -> io::Result<u32> {
        if self.refused.contains(path) {
            return Err(io::Error::other("no space left on device"));
        }
        self.next_handle += 1;
        self.live.insert(self.next_handle, path.to_string());
        Ok(self.next_handle)
    }

    fn remove_watch(&mut self, handle: &u32) -> io::Result<()> {
        self.live
            .shift_remove(handle)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "unknown watch handle"))
    }

    fn read_events(&mut self) -> io::Result<Vec<RawEvent<u32>>> {
        self.batches
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "event script exhausted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_not_reused() {
        let mut source = ScriptedSource::new();
        let first = source.add_watch("/a/", EventMask::DEFAULT).unwrap();
        source.remove_watch(&first).unwrap();
        let second = source.add_watch("/a/", EventMask::DEFAULT).unwrap();

        assert_ne!(first, second);
        assert_eq!(source.live_count(), 1);
        assert!(source.remove_watch(&first).is_err());
    }

    #[test]
    fn test_refused_path() {
        let mut source = ScriptedSource::new();
        source.refuse("/full/");
        assert!(source.add_watch("/full/", EventMask::DEFAULT).is_err());
        assert!(!source.is_watching("/full/"));
    }

    #[test]
    fn test_batches_then_exhaustion() {
        let mut source = ScriptedSource::new();
        source.push_batch(vec![RawEvent::new(1, EventMask::CREATE | EventMask::ISDIR, "d")]);

        let batch = source.read_events().unwrap();
        assert_eq!(batch.len(), 1);
        assert!(batch[0].is_dir());

        let err = source.read_events().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
