// Device discovery plugins
// Backends are compiled in and registered at startup. They report hardware
// through a PluginContext, which queues the report onto the reactor.

pub mod camera;

use std::collections::BTreeMap;
use std::sync::mpsc::Sender;

use crate::config::Config;
use crate::daemon::DaemonEvent;
use crate::error::Result;

/// Properties of a discovered device, applied like client properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTemplate {
    pub id: String,
    pub properties: BTreeMap<String, String>,
}

impl DeviceTemplate {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    DeviceDiscovered(DeviceTemplate),
    DeviceLost { id: String },
}

/// Handle given to plugins; the only way back into the daemon
#[derive(Debug, Clone)]
pub struct PluginContext {
    tx: Sender<DaemonEvent>,
}

impl PluginContext {
    pub fn new(tx: Sender<DaemonEvent>) -> Self {
        Self { tx }
    }

    fn post(&self, event: PluginEvent) {
        if self.tx.send(DaemonEvent::Plugin(event)).is_err() {
            log::warn!("Plugin event dropped, daemon is shutting down");
        }
    }

    pub fn device_discovered(&self, device: DeviceTemplate) {
        log::debug!("Plugin: emit add: {}", device.id);
        self.post(PluginEvent::DeviceDiscovered(device));
    }

    pub fn device_lost(&self, id: &str) {
        log::debug!("Plugin: emit remove: {}", id);
        self.post(PluginEvent::DeviceLost { id: id.to_string() });
    }
}

pub trait Plugin: Send {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Opt out based on configuration
    fn enabled(&self, _config: &Config) -> bool {
        true
    }

    fn initialize(&mut self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// The daemon is ready for devices
    fn coldplug(&mut self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    fn state_changed(&mut self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    fn destroy(&mut self) {}
}

pub struct PluginHost {
    plugins: Vec<Box<dyn Plugin>>,
    ctx: PluginContext,
}

impl PluginHost {
    pub fn new(ctx: PluginContext) -> Self {
        Self {
            plugins: Vec::new(),
            ctx,
        }
    }

    /// Host with every compiled-in backend the config allows
    pub fn with_builtin(config: &Config, ctx: PluginContext) -> Self {
        let mut host = Self::new(ctx);
        host.register(Box::new(camera::CameraPlugin::from_config(config)), config);
        host
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>, config: &Config) {
        if config.plugin_disabled(plugin.name()) || !plugin.enabled(config) {
            log::info!("Plugin {} disabled", plugin.name());
            return;
        }
        log::info!("Loaded plugin {}: {}", plugin.name(), plugin.description());
        self.plugins.push(plugin);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn initialize(&mut self) {
        for plugin in &mut self.plugins {
            if let Err(e) = plugin.initialize(&self.ctx) {
                log::warn!("Plugin {} failed to initialize: {}", plugin.name(), e);
            }
        }
    }

    pub fn coldplug(&mut self) {
        for plugin in &mut self.plugins {
            if let Err(e) = plugin.coldplug(&self.ctx) {
                log::warn!("Plugin {} failed to coldplug: {}", plugin.name(), e);
            }
        }
    }

    pub fn state_changed(&mut self) {
        for plugin in &mut self.plugins {
            if let Err(e) = plugin.state_changed(&self.ctx) {
                log::warn!("Plugin {} failed to handle state change: {}", plugin.name(), e);
            }
        }
    }

    pub fn destroy(&mut self) {
        for plugin in &mut self.plugins {
            plugin.destroy();
        }
        self.plugins.clear();
    }
}
