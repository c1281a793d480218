// Reactor loop
// The only thread that touches daemon state. Connection threads, plugins, the
// profile monitor and timers hand it events over a channel.

use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use super::{Daemon, DaemonEvent};
use crate::error::Result;
use crate::plugin::PluginHost;

/// Process events until Shutdown or until every sender is gone
pub fn run(daemon: &mut Daemon, plugins: &mut PluginHost, rx: Receiver<DaemonEvent>) {
    for event in rx.iter() {
        match event {
            DaemonEvent::Call {
                caller,
                request,
                fd,
                reply,
            } => {
                let response = daemon.handle_call(&caller, request, fd);
                if reply.send(response).is_err() {
                    log::debug!("{} went away before its reply", caller.sender);
                }
            }
            DaemonEvent::NameVanished(sender) => daemon.name_vanished(&sender),
            DaemonEvent::Plugin(event) => {
                daemon.handle_plugin_event(event);
                plugins.state_changed();
            }
            DaemonEvent::ProfileFiles(paths) => daemon.profile_files_changed(&paths),
            DaemonEvent::Shutdown => {
                log::info!("Shutting down");
                plugins.destroy();
                return;
            }
        }
    }

    log::warn!("Event channel closed");
    plugins.destroy();
}

/// Post Shutdown on SIGINT or SIGTERM
pub fn spawn_signal_handler(tx: Sender<DaemonEvent>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                log::info!("Received signal {}", signal);
                let _ = tx.send(DaemonEvent::Shutdown);
            }
        })?;
    Ok(())
}

/// Post Shutdown once `delay` has passed
pub fn spawn_exit_timer(tx: Sender<DaemonEvent>, delay: Duration) -> Result<()> {
    thread::Builder::new()
        .name("timed-exit".to_string())
        .spawn(move || {
            thread::sleep(delay);
            log::info!("Exiting after {:?}", delay);
            let _ = tx.send(DaemonEvent::Shutdown);
        })?;
    Ok(())
}
