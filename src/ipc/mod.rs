// Control socket
// Length-prefixed JSON over a Unix stream socket. A file descriptor may ride
// along with a frame as SCM_RIGHTS ancillary data on its length prefix.

mod messages;

#[cfg(test)]
mod tests;

pub use messages::{ClientMessage, ServerMessage};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{IoSlice, IoSliceMut, Read, Write};
use std::net::Shutdown;
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use nix::sys::socket::{
    getsockopt, recvmsg, sendmsg, sockopt, ControlMessage, ControlMessageOwned, MsgFlags, UnixAddr,
};

use crate::auth::Caller;
use crate::commands::{Request, Response};
use crate::constants::IPC_MAX_MESSAGE_SIZE;
use crate::daemon::DaemonEvent;
use crate::error::{ColordError, Result};
use crate::events::Signal;

type SharedStream = Arc<Mutex<UnixStream>>;

const SOCKET_MODE: u32 = 0o666;
const SUBSCRIBER_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

fn nix_err(err: nix::Error) -> ColordError {
    ColordError::Io(std::io::Error::from(err))
}

fn lock_stream(stream: &SharedStream) -> Result<std::sync::MutexGuard<'_, UnixStream>> {
    stream
        .lock()
        .map_err(|_| ColordError::Internal("connection lock poisoned".to_string()))
}

fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(msg)?;
    if json.len() > IPC_MAX_MESSAGE_SIZE {
        return Err(ColordError::InputInvalid(format!(
            "Message too large: {} bytes (max: {})",
            json.len(),
            IPC_MAX_MESSAGE_SIZE
        )));
    }
    Ok(json)
}

/// Write one frame
pub fn write_frame<T: Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
    let json = encode(msg)?;
    stream.write_all(&(json.len() as u32).to_le_bytes())?;
    stream.write_all(&json)?;
    stream.flush()?;
    Ok(())
}

/// Write one frame, passing `fd` with its length prefix
pub fn write_frame_with_fd<T: Serialize>(stream: &mut UnixStream, msg: &T, fd: RawFd) -> Result<()> {
    let json = encode(msg)?;
    let len = (json.len() as u32).to_le_bytes();
    let fds = [fd];
    let iov = [IoSlice::new(&len)];
    let cmsgs = [ControlMessage::ScmRights(&fds)];
    let sent = sendmsg::<UnixAddr>(stream.as_raw_fd(), &iov, &cmsgs, MsgFlags::empty(), None).map_err(nix_err)?;
    if sent < len.len() {
        stream.write_all(&len[sent..])?;
    }
    stream.write_all(&json)?;
    stream.flush()?;
    Ok(())
}

/// Read one frame and any descriptor sent with it. `None` on a clean EOF.
pub fn read_frame<T: DeserializeOwned>(stream: &mut UnixStream) -> Result<Option<(T, Option<File>)>> {
    let mut len_buf = [0u8; 4];
    let mut cmsg_buf = nix::cmsg_space!([RawFd; 1]);
    let mut fd = None;

    let received = {
        let mut iov = [IoSliceMut::new(&mut len_buf)];
        let msg = recvmsg::<UnixAddr>(stream.as_raw_fd(), &mut iov, Some(&mut cmsg_buf), MsgFlags::empty())
            .map_err(nix_err)?;
        for cmsg in msg.cmsgs().map_err(nix_err)? {
            if let ControlMessageOwned::ScmRights(fds) = cmsg {
                for raw in fds {
                    // SAFETY: the kernel installed this descriptor for us and nothing else owns it
                    let file = unsafe { File::from_raw_fd(raw) };
                    if fd.is_none() {
                        fd = Some(file);
                    }
                }
            }
        }
        msg.bytes
    };

    if received == 0 {
        return Ok(None);
    }
    if received < len_buf.len() {
        stream.read_exact(&mut len_buf[received..])?;
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > IPC_MAX_MESSAGE_SIZE {
        return Err(ColordError::InputInvalid(format!(
            "Message too large: {} bytes (max: {})",
            len, IPC_MAX_MESSAGE_SIZE
        )));
    }
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload)?;
    Ok(Some((serde_json::from_slice(&payload)?, fd)))
}

// -----------------------------------------------------------------------------
// Signal fan-out
// -----------------------------------------------------------------------------

/// Connections that asked for signals
#[derive(Clone)]
pub struct Subscribers {
    streams: Arc<Mutex<Vec<(String, SharedStream)>>>,
    write_timeout: Duration,
}

impl Default for Subscribers {
    fn default() -> Self {
        Self::with_write_timeout(SUBSCRIBER_WRITE_TIMEOUT)
    }
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscriber that cannot take a frame within `timeout` is dropped
    pub fn with_write_timeout(timeout: Duration) -> Self {
        Self {
            streams: Arc::new(Mutex::new(Vec::new())),
            write_timeout: timeout,
        }
    }

    fn add(&self, sender: &str, stream: SharedStream) {
        if let Err(e) = lock_stream(&stream).and_then(|s| Ok(s.set_write_timeout(Some(self.write_timeout))?)) {
            log::warn!("Cannot subscribe {}: {}", sender, e);
            return;
        }
        if let Ok(mut streams) = self.streams.lock() {
            if !streams.iter().any(|(s, _)| s == sender) {
                streams.push((sender.to_string(), stream));
            }
        }
    }

    fn remove(&self, sender: &str) {
        if let Ok(mut streams) = self.streams.lock() {
            streams.retain(|(s, _)| s != sender);
        }
    }

    pub fn len(&self) -> usize {
        self.streams.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send to every subscriber, dropping the ones that fail or time out.
    /// The list lock is not held while writing.
    pub fn broadcast(&self, signal: &Signal) {
        let snapshot = match self.streams.lock() {
            Ok(streams) => streams.clone(),
            Err(_) => return,
        };
        let msg = ServerMessage::Signal { signal: signal.clone() };
        let mut failed = Vec::new();
        for (sender, stream) in snapshot {
            let sent = lock_stream(&stream).and_then(|mut s| {
                let sent = write_frame(&mut s, &msg);
                if sent.is_err() {
                    // A partial frame leaves the stream unusable
                    let _ = s.shutdown(Shutdown::Both);
                }
                sent
            });
            if let Err(e) = sent {
                log::debug!("Dropping subscriber {}: {}", sender, e);
                failed.push(sender);
            }
        }
        if failed.is_empty() {
            return;
        }
        if let Ok(mut streams) = self.streams.lock() {
            streams.retain(|(sender, _)| !failed.contains(sender));
        }
    }
}

/// Forward daemon signals to subscribers until the daemon drops its sender
pub fn spawn_signal_fanout(rx: Receiver<Signal>, subscribers: Subscribers) -> Result<thread::JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("ipc-signals".to_string())
        .spawn(move || {
            for signal in rx {
                subscribers.broadcast(&signal);
            }
            log::debug!("Signal channel closed");
        })?;
    Ok(handle)
}

// -----------------------------------------------------------------------------
// Server
// -----------------------------------------------------------------------------

pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl IpcServer {
    /// Bind, replacing a stale socket file. Any local user may connect;
    /// calls are authorized per peer credentials.
    pub fn bind(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if socket_path.exists() {
            log::debug!("Removing stale socket {}", socket_path.display());
            std::fs::remove_file(&socket_path)?;
        }

        let listener = UnixListener::bind(&socket_path)?;
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))?;
        }
        log::info!("Listening on {}", socket_path.display());

        Ok(Self {
            listener,
            socket_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections on a background thread, one thread per client
    pub fn serve(&self, tx: Sender<DaemonEvent>, subscribers: Subscribers) -> Result<thread::JoinHandle<()>> {
        let listener = self.listener.try_clone()?;
        let handle = thread::Builder::new()
            .name("ipc-accept".to_string())
            .spawn(move || {
                let next_id = AtomicU64::new(1);
                for stream in listener.incoming() {
                    let stream = match stream {
                        Ok(stream) => stream,
                        Err(e) => {
                            log::warn!("Failed to accept IPC connection: {}", e);
                            continue;
                        }
                    };
                    let sender = format!(":1.{}", next_id.fetch_add(1, Ordering::Relaxed));
                    let tx = tx.clone();
                    let subscribers = subscribers.clone();
                    let spawned = thread::Builder::new()
                        .name(format!("ipc-{}", sender))
                        .spawn(move || serve_connection(stream, sender, tx, subscribers));
                    if let Err(e) = spawned {
                        log::warn!("Failed to spawn connection thread: {}", e);
                    }
                }
            })?;
        Ok(handle)
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

fn peer_caller(stream: &UnixStream, sender: &str) -> Result<Caller> {
    let creds = getsockopt(stream, sockopt::PeerCredentials).map_err(nix_err)?;
    Ok(Caller::new(sender, creds.uid(), creds.pid().max(0) as u32))
}

fn serve_connection(stream: UnixStream, sender: String, tx: Sender<DaemonEvent>, subscribers: Subscribers) {
    if let Err(e) = run_connection(stream, &sender, &tx, &subscribers) {
        log::debug!("Connection {} ended: {}", sender, e);
    }
    subscribers.remove(&sender);
    if tx.send(DaemonEvent::NameVanished(sender.clone())).is_err() {
        log::debug!("Daemon gone before {} vanished", sender);
    }
}

fn run_connection(
    mut reader: UnixStream,
    sender: &str,
    tx: &Sender<DaemonEvent>,
    subscribers: &Subscribers,
) -> Result<()> {
    let caller = peer_caller(&reader, sender)?;
    log::debug!("{} connected (uid {}, pid {})", sender, caller.uid, caller.pid);
    let writer: SharedStream = Arc::new(Mutex::new(reader.try_clone()?));

    while let Some((msg, fd)) = read_frame::<ClientMessage>(&mut reader)? {
        let response = if msg.request == Request::Subscribe {
            subscribers.add(sender, Arc::clone(&writer));
            Response::Ok {
                value: serde_json::Value::Null,
            }
        } else {
            let (reply_tx, reply_rx) = mpsc::channel();
            let event = DaemonEvent::Call {
                caller: caller.clone(),
                request: msg.request,
                fd,
                reply: reply_tx,
            };
            if tx.send(event).is_err() {
                return Err(ColordError::Internal("daemon is shutting down".to_string()));
            }
            reply_rx
                .recv()
                .map_err(|_| ColordError::Internal("daemon dropped the call".to_string()))?
        };

        let reply = ServerMessage::Reply {
            serial: msg.serial,
            response,
        };
        let mut guard = lock_stream(&writer)?;
        write_frame(&mut guard, &reply)?;
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

pub struct IpcClient {
    stream: UnixStream,
    next_serial: u64,
    pending_signals: VecDeque<Signal>,
}

impl IpcClient {
    pub fn connect(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path).map_err(|e| {
            ColordError::Internal(format!("Failed to connect to daemon at {}: {}", path.display(), e))
        })?;
        Ok(Self {
            stream,
            next_serial: 1,
            pending_signals: VecDeque::new(),
        })
    }

    /// Send a call and wait for its reply. Signals arriving first are queued.
    pub fn call(&mut self, request: Request, fd: Option<&File>) -> Result<Response> {
        let serial = self.next_serial;
        self.next_serial += 1;
        let msg = ClientMessage { serial, request };
        match fd {
            Some(file) => write_frame_with_fd(&mut self.stream, &msg, file.as_raw_fd())?,
            None => write_frame(&mut self.stream, &msg)?,
        }

        loop {
            match self.read_server_message()? {
                ServerMessage::Reply { serial: got, response } if got == serial => return Ok(response),
                ServerMessage::Reply { serial: got, .. } => {
                    log::debug!("Ignoring reply to stale serial {}", got)
                }
                ServerMessage::Signal { signal } => self.pending_signals.push_back(signal),
            }
        }
    }

    /// Block until the next signal
    pub fn next_signal(&mut self) -> Result<Signal> {
        if let Some(signal) = self.pending_signals.pop_front() {
            return Ok(signal);
        }
        loop {
            if let ServerMessage::Signal { signal } = self.read_server_message()? {
                return Ok(signal);
            }
        }
    }

    fn read_server_message(&mut self) -> Result<ServerMessage> {
        match read_frame::<ServerMessage>(&mut self.stream)? {
            Some((msg, _)) => Ok(msg),
            None => Err(ColordError::Internal("daemon closed the connection".to_string())),
        }
    }
}
