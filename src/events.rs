// Notifications broadcast to every subscribed client
// Emitted by the reactor only after the mutation they describe is applied.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "PascalCase")]
pub enum Signal {
    /// Something in the daemon changed
    Changed,
    DeviceAdded { object_path: String },
    DeviceRemoved { object_path: String },
    DeviceChanged { object_path: String },
    ProfileAdded { object_path: String },
    ProfileRemoved { object_path: String },
    ProfileChanged { object_path: String },
    SensorAdded { object_path: String },
    SensorRemoved { object_path: String },
    /// Named properties of an object have new values
    PropertiesChanged {
        object_path: String,
        properties: Vec<String>,
    },
}

impl Signal {
    pub fn properties_changed(object_path: &str, properties: &[&str]) -> Self {
        Signal::PropertiesChanged {
            object_path: object_path.to_string(),
            properties: properties.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn object_path(&self) -> Option<&str> {
        match self {
            Signal::Changed => None,
            Signal::DeviceAdded { object_path }
            | Signal::DeviceRemoved { object_path }
            | Signal::DeviceChanged { object_path }
            | Signal::ProfileAdded { object_path }
            | Signal::ProfileRemoved { object_path }
            | Signal::ProfileChanged { object_path }
            | Signal::SensorAdded { object_path }
            | Signal::SensorRemoved { object_path }
            | Signal::PropertiesChanged { object_path, .. } => Some(object_path),
        }
    }
}
