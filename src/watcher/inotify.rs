//! inotify-backed [`WatchSource`].

use std::io;

use inotify::{Inotify, WatchDescriptor, WatchMask};

use super::WatchError;
use super::event::EventMask;
use super::source::{RawEvent, WatchSource};

/// Room for roughly a thousand events with short names per read.
const EVENT_BUFFER_LEN: usize = 1024 * (16 + 16);

/// Watch source talking to the kernel through an inotify instance.
pub struct InotifySource {
    inotify: Inotify,
    buffer: Vec<u8>,
}

impl InotifySource {
    pub fn new() -> Result<Self, WatchError> {
        let inotify = Inotify::init().map_err(|e| WatchError::InitFailed {
            reason: e.to_string(),
        })?;

        Ok(Self {
            inotify,
            buffer: vec![0; EVENT_BUFFER_LEN],
        })
    }
}

impl std::fmt::Debug for InotifySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InotifySource").finish_non_exhaustive()
    }
}

impl WatchSource for InotifySource {
    type Handle = WatchDescriptor;

    fn add_watch(&mut self, path: &str, mask: EventMask) -> io::Result<WatchDescriptor> {
        self.inotify
            .watches()
            .add(path, WatchMask::from_bits_truncate(mask.bits()))
    }

    fn remove_watch(&mut self, handle: &WatchDescriptor) -> io::Result<()> {
        self.inotify.watches().remove(handle.clone())
    }

    fn read_events(&mut self) -> io::Result<Vec<RawEvent<WatchDescriptor>>> {
        let events = self.inotify.read_events_blocking(&mut self.buffer)?;

        Ok(events
            .map(|event| RawEvent {
                handle: event.wd.clone(),
                mask: EventMask::from_bits_retain(event.mask.bits()),
                name: event
                    .name
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
            .collect())
    }
}
