pub mod cli;
pub mod command;
pub mod config;
pub mod logging;
pub mod paths;
pub mod queue;
pub mod watcher;

pub use command::{CommandRunner, EventContext, FormatPrinter, ShellRunner};
pub use config::{OutputMode, RuntimeConfig, Settings};
pub use watcher::{Dispatcher, Registry, TreeWalker, WatchError, WatchSource};
