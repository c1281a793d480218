// Caller identity and authorization
// Privileged callers (root and the daemon's own user) skip the policy check.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::AuthConfig;
use crate::error::{ColordError, Result};

/// Who issued a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Connection name, unique for the lifetime of the daemon
    pub sender: String,
    pub uid: u32,
    pub pid: u32,
}

impl Caller {
    pub fn new(sender: &str, uid: u32, pid: u32) -> Self {
        Self {
            sender: sender.to_string(),
            uid,
            pid,
        }
    }
}

/// Policy backend: may this caller perform this action?
pub trait Authorizer: Send {
    fn is_authorized(&self, action: &str, caller: &Caller) -> bool;
}

/// Grants the actions listed in the config to every caller
#[derive(Debug, Clone, Default)]
pub struct PolicyAuthorizer {
    allowed_actions: BTreeSet<String>,
}

impl PolicyAuthorizer {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            allowed_actions: config.allowed_actions.iter().cloned().collect(),
        }
    }
}

impl Authorizer for PolicyAuthorizer {
    fn is_authorized(&self, action: &str, _caller: &Caller) -> bool {
        self.allowed_actions.contains(action)
    }
}

pub fn daemon_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}

/// Fail with FailedToAuthenticate unless the caller may perform `action`
pub fn check(authorizer: &dyn Authorizer, action: &str, caller: &Caller) -> Result<()> {
    if caller.uid == 0 || caller.uid == daemon_uid() {
        return Ok(());
    }
    if authorizer.is_authorized(action, caller) {
        return Ok(());
    }
    log::warn!("{} (uid {}) denied {}", caller.sender, caller.uid, action);
    Err(ColordError::FailedToAuthenticate(format!(
        "failed to obtain {} auth",
        action
    )))
}
