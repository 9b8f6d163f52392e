//! Command templates and the runners that act on them.
//!
//! A template is plain text with `%` placeholders:
//!
//! | placeholder | replaced by                                      |
//! |-------------|--------------------------------------------------|
//! | `%r`        | root directory being watched                     |
//! | `%p`        | watched directory the event happened in          |
//! | `%f`        | name of the entry that triggered the event       |
//! | `%e`        | event name, e.g. `create`                        |
//! | `%x`        | first capture of the catch pattern, or empty     |
//! | `%n`        | number of times a command has run, this included |
//!
//! Any other `%` sequence is left as written.

use std::io::{self, Write};
use std::process::Command;

use thiserror::Error;

/// Failures while acting on an event.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write event output: {0}")]
    Output(#[from] io::Error),
}

/// Everything a template can refer to for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext<'a> {
    pub event: &'a str,
    pub name: &'a str,
    pub dir: &'a str,
    pub root: &'a str,
    pub count: u64,
    pub captured: Option<&'a str>,
}

/// Substitute the placeholders of `template` in a single left-to-right pass.
///
/// Substituted text is never rescanned, so a file named `%r` stays `%r`.
pub fn render(template: &str, ctx: &EventContext<'_>) -> String {
    let mut out = String::with_capacity(template.len() + ctx.dir.len() + ctx.name.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let replacement = match chars.peek() {
            Some('r') => Some(ctx.root.to_string()),
            Some('p') => Some(ctx.dir.to_string()),
            Some('f') => Some(ctx.name.to_string()),
            Some('e') => Some(ctx.event.to_string()),
            Some('x') => Some(ctx.captured.unwrap_or_default().to_string()),
            Some('n') => Some(ctx.count.to_string()),
            _ => None,
        };

        match replacement {
            Some(text) => {
                chars.next();
                out.push_str(&text);
            }
            None => out.push('%'),
        }
    }

    out
}

/// Acts on one qualifying event.
pub trait CommandRunner {
    fn run(&mut self, ctx: &EventContext<'_>) -> Result<(), ExecError>;
}

/// Runs the rendered template through a shell and waits for it.
///
/// A trailing `&` in the template backgrounds the command inside the shell,
/// so the watcher does not wait on it.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    template: String,
    shell: String,
}

impl ShellRunner {
    pub fn new(template: impl Into<String>, shell: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            shell: shell.into(),
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&mut self, ctx: &EventContext<'_>) -> Result<(), ExecError> {
        let command = render(&self.template, ctx);
        crate::log_event!(
            "exec",
            ctx.event,
            "{}{} (#{}) -> {command}",
            ctx.dir,
            ctx.name,
            ctx.count
        );

        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(&command)
            .status()
            .map_err(|source| ExecError::Spawn {
                command: command.clone(),
                source,
            })?;

        match status.code() {
            Some(0) => {}
            Some(127) => tracing::warn!("[exec] command not found: {command}"),
            Some(code) => tracing::warn!("[exec] '{command}' exited with status {code}"),
            None => tracing::warn!("[exec] '{command}' was terminated by a signal"),
        }

        Ok(())
    }
}

/// Prints the rendered template as one line per event.
#[derive(Debug)]
pub struct FormatPrinter<W: Write> {
    template: String,
    out: W,
}

impl FormatPrinter<io::Stdout> {
    pub fn stdout(template: impl Into<String>) -> Self {
        Self::new(template, io::stdout())
    }
}

impl<W: Write> FormatPrinter<W> {
    pub fn new(template: impl Into<String>, out: W) -> Self {
        Self {
            template: template.into(),
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> CommandRunner for FormatPrinter<W> {
    fn run(&mut self, ctx: &EventContext<'_>) -> Result<(), ExecError> {
        crate::debug_event!("format", ctx.event, "{}{}", ctx.dir, ctx.name);
        writeln!(self.out, "{}", render(&self.template, ctx))?;
        self.out.flush()?;
        Ok(())
    }
}
