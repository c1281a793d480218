// Frames exchanged with clients over the control socket

use serde::{Deserialize, Serialize};

use crate::commands::{Request, Response};
use crate::events::Signal;

/// One call; the daemon echoes `serial` in the matching reply
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClientMessage {
    pub serial: u64,
    pub request: Request,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ServerMessage {
    Reply { serial: u64, response: Response },
    /// Sent unprompted to subscribed connections
    Signal { signal: Signal },
}
