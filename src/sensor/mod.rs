// Color measurement sensors
// A sensor is sampled only by the client holding its lock; the lock dies with
// that client's connection.

mod dummy;

pub use dummy::DummyDriver;

use serde::Serialize;

use crate::constants::SENSORS_PATH;
use crate::enums::{SensorCap, SensorKind, SensorState};
use crate::error::{ColordError, Result};
use crate::system::sanitize_object_path;

/// One reading. Channels a capability does not produce hold SAMPLE_NO_VALUE.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub luminance: f64,
}

/// Hardware access for one sensor
pub trait SensorDriver: Send {
    fn get_sample(&mut self, cap: SensorCap) -> Result<Sample>;

    fn lock(&mut self) -> Result<()> {
        Ok(())
    }

    fn unlock(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct Sensor {
    id: String,
    object_path: String,
    kind: SensorKind,
    state: SensorState,
    caps: Vec<SensorCap>,
    serial: Option<String>,
    model: Option<String>,
    vendor: Option<String>,
    embedded: bool,
    locked_by: Option<String>,
    driver: Option<Box<dyn SensorDriver>>,
}

impl std::fmt::Debug for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sensor")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("locked_by", &self.locked_by)
            .field("native", &self.driver.is_some())
            .finish()
    }
}

impl Sensor {
    pub fn new(id: &str, kind: SensorKind) -> Self {
        Self {
            id: id.to_string(),
            object_path: format!("{}/{}", SENSORS_PATH, sanitize_object_path(id)),
            kind,
            state: SensorState::Idle,
            caps: Vec::new(),
            serial: None,
            model: None,
            vendor: None,
            embedded: false,
            locked_by: None,
            driver: None,
        }
    }

    /// The built-in test sensor
    pub fn dummy() -> Self {
        let mut sensor = Self::new("dummy", SensorKind::Dummy);
        sensor.serial = Some("0123456789a".to_string());
        sensor.model = Some("Dummy Sensor #1".to_string());
        sensor.vendor = Some("Acme Corp".to_string());
        sensor.caps = vec![
            SensorCap::Lcd,
            SensorCap::Crt,
            SensorCap::Projector,
            SensorCap::Spot,
            SensorCap::Printer,
            SensorCap::Ambient,
        ];
        sensor.driver = Some(Box::new(DummyDriver));
        sensor
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    pub fn caps(&self) -> &[SensorCap] {
        &self.caps
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn is_native(&self) -> bool {
        self.driver.is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.locked_by.is_some()
    }

    pub fn locked_by(&self) -> Option<&str> {
        self.locked_by.as_deref()
    }

    pub fn lock(&mut self, sender: &str) -> Result<()> {
        if let Some(owner) = &self.locked_by {
            return Err(ColordError::AlreadyLocked(format!(
                "sensor {} is already locked by {}",
                self.id, owner
            )));
        }
        if let Some(driver) = self.driver.as_mut() {
            driver.lock()?;
        }
        log::info!("Sensor {} locked by {}", self.id, sender);
        self.locked_by = Some(sender.to_string());
        Ok(())
    }

    pub fn unlock(&mut self, sender: &str) -> Result<()> {
        match self.locked_by.as_deref() {
            Some(owner) if owner == sender => {}
            _ => {
                return Err(ColordError::NotLocked(format!(
                    "sensor {} is not locked by {}",
                    self.id, sender
                )))
            }
        }
        if let Some(driver) = self.driver.as_mut() {
            driver.unlock()?;
        }
        log::info!("Sensor {} unlocked", self.id);
        self.locked_by = None;
        Ok(())
    }

    /// Take a reading for `cap`, which arrives as the client's string
    pub fn get_sample(&mut self, sender: &str, cap: &str) -> Result<Sample> {
        if self.locked_by.as_deref() != Some(sender) {
            return Err(ColordError::NotLocked(format!("sensor {} is not locked", self.id)));
        }
        let state = self.state;
        let Some(driver) = self.driver.as_mut() else {
            return Err(ColordError::NotSupported("no native driver for sensor".to_string()));
        };
        if state != SensorState::Idle {
            return Err(ColordError::Internal(format!("sensor not idle: {}", state)));
        }
        let parsed = SensorCap::from_str_lossy(cap);
        if parsed == SensorCap::Unknown {
            return Err(ColordError::InputInvalid(format!("cap '{}' unknown", cap)));
        }

        self.state = SensorState::Measuring;
        let sample = driver.get_sample(parsed);
        self.state = SensorState::Idle;
        sample
    }
}
