// --- Control socket tests: framing, fd passing, disconnects, signal fan-out ---

use super::*;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

/// Answers every call with a description of what arrived, forwards vanishes
fn spawn_fake_reactor(rx: Receiver<DaemonEvent>, vanished: Sender<String>) {
    thread::spawn(move || {
        for event in rx {
            match event {
                DaemonEvent::Call {
                    caller,
                    request,
                    fd,
                    reply,
                } => {
                    let content = fd.map(|mut f| {
                        let mut s = String::new();
                        f.read_to_string(&mut s).unwrap();
                        s
                    });
                    let value = json!({
                        "sender": caller.sender,
                        "uid": caller.uid,
                        "request": request,
                        "fd_content": content,
                    });
                    let _ = reply.send(Response::Ok { value });
                }
                DaemonEvent::NameVanished(sender) => {
                    let _ = vanished.send(sender);
                }
                _ => {}
            }
        }
    });
}

struct Harness {
    _dir: TempDir,
    server: IpcServer,
    subscribers: Subscribers,
    vanished: Receiver<String>,
}

fn setup() -> Harness {
    let dir = TempDir::new().unwrap();
    let server = IpcServer::bind(dir.path().join("run/colord.sock")).unwrap();
    let (tx, rx) = mpsc::channel();
    let (vanished_tx, vanished) = mpsc::channel();
    spawn_fake_reactor(rx, vanished_tx);
    let subscribers = Subscribers::new();
    server.serve(tx, subscribers.clone()).unwrap();
    Harness {
        _dir: dir,
        server,
        subscribers,
        vanished,
    }
}

fn ok_value(response: Response) -> serde_json::Value {
    match response {
        Response::Ok { value } => value,
        Response::Error { name, message } => panic!("call failed: {}: {}", name, message),
    }
}

// ---------------------------------------------------------------
// Framing
// ---------------------------------------------------------------

#[test]
fn test_frame_roundtrip_over_pair() {
    let (mut a, mut b) = UnixStream::pair().unwrap();
    let msg = ClientMessage {
        serial: 7,
        request: Request::FindDeviceById {
            device_id: "xrandr-LVDS1".into(),
        },
    };
    write_frame(&mut a, &msg).unwrap();
    let (got, fd) = read_frame::<ClientMessage>(&mut b).unwrap().unwrap();
    assert_eq!(got, msg);
    assert!(fd.is_none());
}

#[test]
fn test_eof_reads_as_none() {
    let (a, mut b) = UnixStream::pair().unwrap();
    drop(a);
    assert!(read_frame::<ClientMessage>(&mut b).unwrap().is_none());
}

#[test]
fn test_oversized_length_rejected() {
    let (mut a, mut b) = UnixStream::pair().unwrap();
    a.write_all(&u32::MAX.to_le_bytes()).unwrap();
    let err = read_frame::<ClientMessage>(&mut b).unwrap_err();
    assert_eq!(err.name(), "InputInvalid");
}

#[test]
fn test_request_wire_form() {
    let json = serde_json::to_value(Request::DeviceSetEnabled {
        object_path: "/org/freedesktop/ColorManager/devices/dev1".into(),
        enabled: false,
    })
    .unwrap();
    assert_eq!(json["method"], "DeviceSetEnabled");
    assert_eq!(json["params"]["enabled"], false);

    let unit: Request = serde_json::from_str(r#"{"method":"GetDevices"}"#).unwrap();
    assert_eq!(unit, Request::GetDevices);
}

// ---------------------------------------------------------------
// Server
// ---------------------------------------------------------------

#[test]
fn test_socket_accepts_any_local_user() {
    use std::os::unix::fs::PermissionsExt;
    let harness = setup();
    let mode = std::fs::metadata(harness.server.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o666);
}

#[test]
fn test_unprivileged_peer_can_connect() {
    use nix::sys::wait::{waitpid, WaitStatus};
    use nix::unistd::{fork, setuid, ForkResult, Uid};
    use std::os::unix::fs::PermissionsExt;

    if !nix::unistd::getuid().is_root() {
        return;
    }
    let harness = setup();
    for dir in [harness._dir.path().to_path_buf(), harness._dir.path().join("run")] {
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    let path = harness.server.path().to_path_buf();

    // SAFETY: the child only drops privileges, connects and exits
    match unsafe { fork() }.unwrap() {
        ForkResult::Child => {
            let code = match setuid(Uid::from_raw(65534)) {
                Ok(()) if UnixStream::connect(&path).is_ok() => 0,
                _ => 1,
            };
            unsafe { nix::libc::_exit(code) };
        }
        ForkResult::Parent { child } => {
            assert_eq!(waitpid(child, None).unwrap(), WaitStatus::Exited(child, 0));
        }
    }
}

#[test]
fn test_call_carries_peer_identity() {
    let harness = setup();
    let mut client = IpcClient::connect(harness.server.path()).unwrap();
    let value = ok_value(client.call(Request::GetDevices, None).unwrap());
    assert_eq!(value["uid"], nix::unistd::getuid().as_raw());
    assert!(value["sender"].as_str().unwrap().starts_with(":1."));
    assert_eq!(value["request"]["method"], "GetDevices");
}

#[test]
fn test_fd_is_passed_to_reactor() {
    let harness = setup();
    let path = harness._dir.path().join("profile.icc");
    std::fs::write(&path, "profile bytes").unwrap();
    let file = File::open(&path).unwrap();

    let mut client = IpcClient::connect(harness.server.path()).unwrap();
    let request = Request::CreateProfile {
        profile_id: "prof1".into(),
        scope: "temp".into(),
        properties: Default::default(),
    };
    let value = ok_value(client.call(request, Some(&file)).unwrap());
    assert_eq!(value["fd_content"], "profile bytes");
}

#[test]
fn test_disconnect_reports_vanished_sender() {
    let harness = setup();
    let mut client = IpcClient::connect(harness.server.path()).unwrap();
    let value = ok_value(client.call(Request::GetProfiles, None).unwrap());
    let sender = value["sender"].as_str().unwrap().to_string();
    drop(client);

    let vanished = harness.vanished.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(vanished, sender);
}

#[test]
fn test_subscribers_receive_signals() {
    let harness = setup();
    let mut client = IpcClient::connect(harness.server.path()).unwrap();
    assert!(client.call(Request::Subscribe, None).unwrap().is_ok());
    assert_eq!(harness.subscribers.len(), 1);

    harness.subscribers.broadcast(&Signal::DeviceAdded {
        object_path: "/org/freedesktop/ColorManager/devices/dev1".into(),
    });
    let signal = client.next_signal().unwrap();
    assert_eq!(signal.object_path(), Some("/org/freedesktop/ColorManager/devices/dev1"));
}

#[test]
fn test_stale_socket_is_replaced_and_removed_on_drop() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("colord.sock");
    std::fs::write(&path, "stale").unwrap();

    let server = IpcServer::bind(path.clone()).unwrap();
    assert!(UnixStream::connect(&path).is_ok());
    drop(server);
    assert!(!path.exists());
}

#[test]
fn test_stalled_subscriber_is_dropped() {
    let subscribers = Subscribers::with_write_timeout(Duration::from_millis(50));
    let (a, mut b) = UnixStream::pair().unwrap();
    subscribers.add(":1.5", Arc::new(Mutex::new(a)));

    // Nobody reads `b`, so its buffer fills and the write times out
    let signal = Signal::DeviceChanged {
        object_path: format!("/org/freedesktop/ColorManager/devices/{}", "x".repeat(512)),
    };
    for _ in 0..100_000 {
        if subscribers.is_empty() {
            break;
        }
        subscribers.broadcast(&signal);
    }
    assert!(subscribers.is_empty());

    // The stalled stream was shut down
    let mut rest = Vec::new();
    b.read_to_end(&mut rest).unwrap();
    assert!(!rest.is_empty());
}
