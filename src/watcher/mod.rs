//! Directory tree watching.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher
//!   - reads RawEvents from the WatchSource
//!   - filters, classifies and names each event
//!   - keeps the Registry in step with the tree
//!   - hands the event to a CommandRunner
//!         |
//!    +----+------------+
//!    |                 |
//! TreeWalker        Registry
//!   BFS over          watched directories, the symlinks
//!   new trees         reaching them, cascading cleanup
//!                      |
//!                 WatchSource (inotify, or scripted in tests)
//! ```
//!
//! A directory outside the root is only watched while some symlink inside the
//! watched area leads to it. Removing such a symlink unwatches everything that
//! became unreachable, following chains of links.

mod dispatcher;
mod error;
mod event;
mod filter;
#[cfg(target_os = "linux")]
mod inotify;
mod registry;
mod source;
mod walker;

pub use dispatcher::{Dispatcher, Disposition};
pub use error::WatchError;
pub use event::{EventKind, EventMask, Handler};
pub use filter::{Caught, EventFilter};
#[cfg(target_os = "linux")]
pub use inotify::InotifySource;
pub use registry::{EntryId, Registry, SymlinkRef, WatchedResource};
pub use source::{RawEvent, ScriptedSource, WatchSource};
pub use walker::TreeWalker;
