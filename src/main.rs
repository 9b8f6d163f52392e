use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use treewatch::cli::Cli;
use treewatch::command::{CommandRunner, FormatPrinter, ShellRunner};
use treewatch::config::{OutputMode, RuntimeConfig};
use treewatch::watcher::{Dispatcher, Registry, WatchSource};
use treewatch::{debug_event, log_event};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns the exit status: 0 after `--dump-config`, the signal number after
/// a termination signal.
async fn run(cli: Cli) -> Result<i32> {
    let settings = cli.settings()?;
    treewatch::logging::init_with_config(&settings.logging);

    if cli.dump_config {
        print!("{}", settings.to_toml()?);
        return Ok(0);
    }

    let config = Arc::new(RuntimeConfig::from_settings(&settings)?);
    debug_event!("main", "config", "{config:?}");

    let registry = Registry::new(open_source()?, config.root_path.clone(), config.mask);

    match &config.output {
        OutputMode::Command(command) => {
            let runner = ShellRunner::new(command.clone(), config.shell.clone());
            watch(registry, Arc::clone(&config), runner).await
        }
        OutputMode::Format(format) => {
            let runner = FormatPrinter::stdout(format.clone());
            watch(registry, Arc::clone(&config), runner).await
        }
    }
}

#[cfg(target_os = "linux")]
fn open_source() -> Result<treewatch::watcher::InotifySource> {
    Ok(treewatch::watcher::InotifySource::new()?)
}

#[cfg(not(target_os = "linux"))]
fn open_source() -> Result<treewatch::watcher::ScriptedSource> {
    anyhow::bail!("treewatch needs inotify, which is only available on Linux")
}

/// Watch the root, then process events on a blocking thread until the loop
/// fails or a termination signal arrives.
async fn watch<S, R>(registry: Registry<S>, config: Arc<RuntimeConfig>, runner: R) -> Result<i32>
where
    S: WatchSource + Send + 'static,
    S::Handle: Send,
    R: CommandRunner + Send + 'static,
{
    let root = config.root_path.clone();
    let mut dispatcher = Dispatcher::new(registry, config, runner);
    dispatcher
        .watch_root()
        .with_context(|| format!("Unable to watch {root}"))?;
    log_event!(
        "main",
        "listening",
        "{root} ({} directories)",
        dispatcher.registry().len()
    );

    let mut signals = TerminationSignals::listen()?;
    let mut worker = tokio::task::spawn_blocking(move || {
        let result = dispatcher.run();
        dispatcher.shutdown();
        result
    });

    tokio::select! {
        joined = &mut worker => {
            joined
                .context("Event loop panicked")?
                .context("Event loop stopped")?;
            Ok(0)
        }
        signal = signals.recv() => {
            log_event!("main", "cleaning", "received signal {signal}");
            Ok(signal)
        }
    }
}

/// The termination signals the watcher stops on.
#[cfg(unix)]
struct TerminationSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    fn listen() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("Failed to listen for SIGINT")?,
            terminate: signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?,
            hangup: signal(SignalKind::hangup()).context("Failed to listen for SIGHUP")?,
        })
    }

    /// Wait for SIGINT, SIGTERM or SIGHUP and return its number.
    async fn recv(&mut self) -> i32 {
        use tokio::signal::unix::SignalKind;

        let kind = tokio::select! {
            _ = self.interrupt.recv() => SignalKind::interrupt(),
            _ = self.terminate.recv() => SignalKind::terminate(),
            _ = self.hangup.recv() => SignalKind::hangup(),
        };
        kind.as_raw_value()
    }
}

/// Ctrl-C only; reported as SIGINT.
#[cfg(not(unix))]
struct TerminationSignals;

#[cfg(not(unix))]
impl TerminationSignals {
    const INTERRUPT: i32 = 2;

    fn listen() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> i32 {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("[main] unable to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        Self::INTERRUPT
    }
}
