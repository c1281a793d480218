// Profiling inhibitors for one device
// While any sender holds an inhibit the device reports no profiles, so a
// calibration tool measures the panel without correction applied.

use crate::error::{ColordError, Result};

#[derive(Debug, Clone, Default)]
pub struct Inhibit {
    senders: Vec<String>,
}

impl Inhibit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sender: &str) -> Result<()> {
        if self.senders.iter().any(|s| s == sender) {
            return Err(ColordError::AlreadyExists(format!(
                "already set inhibitor for {}",
                sender
            )));
        }
        self.senders.push(sender.to_string());
        Ok(())
    }

    pub fn remove(&mut self, sender: &str) -> Result<()> {
        let before = self.senders.len();
        self.senders.retain(|s| s != sender);
        if self.senders.len() == before {
            return Err(ColordError::NotFound(format!("not set inhibitor for {}", sender)));
        }
        Ok(())
    }

    /// True when nobody is profiling
    pub fn is_valid(&self) -> bool {
        self.senders.is_empty()
    }

    pub fn bus_names(&self) -> &[String] {
        &self.senders
    }
}
