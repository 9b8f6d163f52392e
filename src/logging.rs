//! Diagnostic logging.
//!
//! Logs go to stderr with a compact timestamp, so `-F` output on stdout stays
//! clean for scripts, or to syslog with `-s`. Levels are set per module in the
//! configuration and can be overridden with `RUST_LOG`.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"  # quiet by default
//! syslog = false    # true sends everything to syslog as "treewatch"
//!
//! [logging.modules]
//! "treewatch::watcher::registry" = "debug"  # watch bookkeeping
//! ```
//!
//! # Environment Variable
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=debug treewatch -d . -F '%e %p%f'
//! RUST_LOG=treewatch::watcher=trace treewatch -r -d . -c 'make'
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Initialize logging with configuration.
///
/// Call once at startup. Later calls have no effect.
///
/// Log levels control visibility:
/// - `error` - errors only (quietest)
/// - `warn` - errors + warnings, such as directories that could not be watched
/// - `info` - every watch added or removed, every event and command
/// - `debug` - filtered events and tolerated failures
/// - `trace` - everything
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        // RUST_LOG env var takes precedence over config
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let syslog = if config.syslog { open_syslog() } else { None };
        let to_syslog = syslog.is_some();
        let writer = syslog.unwrap_or_else(|| BoxMakeWriter::new(std::io::stderr));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(!to_syslog)
            .with_target(false)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();

        if config.syslog && !to_syslog {
            tracing::warn!("[logging] syslog is unavailable, logging to stderr");
        }
    });
}

#[cfg(unix)]
fn open_syslog() -> Option<BoxMakeWriter> {
    let (options, facility) = Default::default();
    syslog_tracing::Syslog::new(c"treewatch", options, facility).map(BoxMakeWriter::new)
}

#[cfg(not(unix))]
fn open_syslog() -> Option<BoxMakeWriter> {
    None
}

/// Build an `EnvFilter` directive string from the configured levels.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.default.clone();
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    for (module, level) in modules {
        directives.push_str(&format!(",{module}={level}"));
    }
    directives
}

/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("registry", "watching", "{path}");
/// log_event!("dispatcher", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("walker", "excluded", "{dir}{name}");
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}
