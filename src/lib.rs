// colord - Library Entry Point

pub mod auth;
pub mod commands;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod db;
pub mod device;
pub mod enums;
pub mod error;
pub mod events;
pub mod inhibit;
pub mod ipc;
pub mod plugin;
pub mod profile;
pub mod quirk;
pub mod registry;
pub mod sensor;
pub mod system;
pub mod watch;

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use config::Config;
use daemon::{reactor, Daemon, DaemonEvent};
use ipc::{IpcServer, Subscribers};
use plugin::{PluginContext, PluginHost};
use profile::monitor::ProfileMonitor;

/// Startup switches that do not belong in the config file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub socket_path: Option<PathBuf>,
    /// Exit after this long, for test rigs
    pub timed_exit: Option<Duration>,
    /// Exit as soon as coldplug finishes
    pub immediate_exit: bool,
}

/// Build the daemon, coldplug, then serve until told to stop
pub fn run(config: Config, options: RunOptions) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel();
    let (signal_tx, signal_rx) = mpsc::channel();

    if let Err(e) = std::fs::create_dir_all(&config.profiles.machine_dir) {
        log::warn!(
            "Failed to create {}: {}",
            config.profiles.machine_dir.display(),
            e
        );
    }

    let mut daemon = Daemon::open(config.clone(), signal_tx)?;
    let monitor_tx = tx.clone();
    let _monitor = match ProfileMonitor::start(daemon.profile_dirs(), move |paths| {
        if monitor_tx.send(DaemonEvent::ProfileFiles(paths)).is_err() {
            log::debug!("Reactor gone, dropping profile change");
        }
    }) {
        Ok(monitor) => Some(monitor),
        Err(e) => {
            log::warn!("Profile directories will not be monitored: {}", e);
            None
        }
    };
    let mut plugins = PluginHost::with_builtin(&config, PluginContext::new(tx.clone()));
    plugins.initialize();
    daemon.coldplug(&mut plugins);

    if options.immediate_exit {
        log::info!("Exiting after coldplug");
        plugins.destroy();
        return Ok(());
    }

    let socket_path = options.socket_path.unwrap_or_else(|| config.socket_path());
    let server = IpcServer::bind(socket_path)?;
    let subscribers = Subscribers::new();
    ipc::spawn_signal_fanout(signal_rx, subscribers.clone())?;
    server.serve(tx.clone(), subscribers)?;

    reactor::spawn_signal_handler(tx.clone())?;
    if let Some(delay) = options.timed_exit {
        reactor::spawn_exit_timer(tx.clone(), delay)?;
    }
    drop(tx);

    log::info!("Daemon ready for requests");
    reactor::run(&mut daemon, &mut plugins, rx);
    Ok(())
}
