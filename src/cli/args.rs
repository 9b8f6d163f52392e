//! CLI argument parsing using clap.

use clap::{
    Parser,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::config::{ConfigError, Settings};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

const AFTER_HELP: &str = "\
Placeholders for COMMAND and FORMAT:
  %r  root DIRECTORY being watched
  %p  watched directory the event happened in
  %f  name of the file or directory that triggered the event
  %e  event name (see below)
  %x  first group matched by --regex-catch
  %n  number of times the command has run

Events:
  access         file was read
  modify         file was modified
  attrib         metadata changed
  close_write    file opened for writing was closed
  close_nowrite  file not opened for writing was closed
  close          close_write or close_nowrite
  open           file was opened
  moved_from     entry moved out of a watched directory
  moved_to       entry moved into a watched directory
  move           moved_from or moved_to
  create         entry created in a watched directory
  delete         entry deleted from a watched directory
  delete_self    a watched directory was itself deleted
  move_self      a watched directory was itself moved
  unmount        filesystem of a watched directory was unmounted
  q_overflow     the kernel event queue overflowed
  ignored        a watch was removed
  isdir          the event concerns a directory
  oneshot        report one event only
  all_events     every event above
  default        modify, create, delete, move

Examples:
  $ treewatch -r -d src -e close_write -c 'make -C %r'
  $ treewatch -d /var/spool/in -e moved_to -X '^(.*)\\.csv$' -F '%p%f %x'";

/// Run a command whenever something changes in a directory tree
#[derive(Parser, Debug)]
#[command(
    name = "treewatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Run a command whenever something changes in a directory tree",
    long_about = "Watch a directory, and optionally everything below it, and run a \
                  command or print a formatted line for every qualifying event. \
                  Symbolic links to directories are followed unless -n is given.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// Command to execute on each event, run by the shell
    #[arg(short, long, value_name = "COMMAND", conflicts_with = "format")]
    pub command: Option<String>,

    /// Print a line in this format on each event instead of running a command
    #[arg(short = 'F', long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Directory to watch
    #[arg(short, long, value_name = "DIRECTORY")]
    pub directory: Option<String>,

    /// Comma-separated events to watch (default: modify,create,delete,move)
    #[arg(short, long, value_name = "EVENTS", value_delimiter = ',')]
    pub events: Vec<String>,

    /// Ignore events on names matching this regex
    #[arg(short = 'x', long, value_name = "REGEX")]
    pub exclude: Option<String>,

    /// Only act on names matching this regex; its first group is %x
    #[arg(short = 'X', long, value_name = "REGEX")]
    pub regex_catch: Option<String>,

    /// Do not follow symbolic links
    #[arg(short, long)]
    pub no_symlink: bool,

    /// Watch subdirectories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Log watches, events and executed commands
    #[arg(short, long)]
    pub verbose: bool,

    /// Send log messages to syslog instead of stderr
    #[arg(short, long)]
    pub syslog: bool,

    /// Path to custom settings.toml file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    pub dump_config: bool,
}

impl Cli {
    /// Load settings from `--config` or the nearest `.treewatch` directory,
    /// then apply the flags on top.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let mut settings = match &self.config {
            Some(path) => Settings::load_from(path)?,
            None => Settings::load()?,
        };
        self.apply_to(&mut settings);
        Ok(settings)
    }

    /// Override `settings` with every flag that was given.
    pub fn apply_to(&self, settings: &mut Settings) {
        // A command or format from the command line replaces either one from
        // a file
        if let Some(command) = &self.command {
            settings.exec.command = Some(command.clone());
            settings.exec.format = None;
        }
        if let Some(format) = &self.format {
            settings.exec.format = Some(format.clone());
            settings.exec.command = None;
        }

        if let Some(directory) = &self.directory {
            settings.watch.directory = Some(directory.clone());
        }
        if !self.events.is_empty() {
            settings.watch.events = self.events.clone();
        }
        if let Some(exclude) = &self.exclude {
            settings.watch.exclude = Some(exclude.clone());
        }
        if let Some(catch) = &self.regex_catch {
            settings.watch.catch = Some(catch.clone());
        }
        if self.no_symlink {
            settings.watch.follow_symlinks = false;
        }
        if self.recursive {
            settings.watch.recursive = true;
        }
        if self.syslog {
            settings.logging.syslog = true;
        }
        if self.verbose && !matches!(settings.logging.default.as_str(), "debug" | "trace") {
            settings.logging.default = "info".to_string();
        }
    }
}
