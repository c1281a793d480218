// Sensor object calls

use super::views::SensorView;
use crate::auth::{self, Caller};
use crate::constants::*;
use crate::daemon::Daemon;
use crate::error::{ColordError, Result};
use crate::events::Signal;
use crate::sensor::{Sample, Sensor};
use crate::watch::WatchTarget;

fn sensor_not_found(object_path: &str) -> ColordError {
    ColordError::NotFound(format!("sensor object path '{}' does not exist", object_path))
}

fn find_sensor_mut<'a>(sensors: &'a mut [Sensor], object_path: &str) -> Result<&'a mut Sensor> {
    sensors
        .iter_mut()
        .find(|s| s.object_path() == object_path)
        .ok_or_else(|| sensor_not_found(object_path))
}

pub fn get_sensor(daemon: &Daemon, object_path: &str) -> Result<SensorView> {
    daemon
        .sensors
        .iter()
        .find(|s| s.object_path() == object_path)
        .map(SensorView::from)
        .ok_or_else(|| sensor_not_found(object_path))
}

pub fn lock(daemon: &mut Daemon, caller: &Caller, object_path: &str) -> Result<()> {
    auth::check(daemon.authorizer.as_ref(), ACTION_SENSOR_LOCK, caller)?;
    find_sensor_mut(&mut daemon.sensors, object_path)?.lock(&caller.sender)?;
    daemon.watch_sensor_lock(&caller.sender, object_path);
    daemon.emit(Signal::properties_changed(object_path, &[SENSOR_PROPERTY_LOCKED]));
    Ok(())
}

pub fn unlock(daemon: &mut Daemon, caller: &Caller, object_path: &str) -> Result<()> {
    auth::check(daemon.authorizer.as_ref(), ACTION_SENSOR_LOCK, caller)?;
    find_sensor_mut(&mut daemon.sensors, object_path)?.unlock(&caller.sender)?;
    daemon.watcher.cancel_target(
        &caller.sender,
        &WatchTarget::SensorLock {
            object_path: object_path.to_string(),
        },
    );
    daemon.emit(Signal::properties_changed(object_path, &[SENSOR_PROPERTY_LOCKED]));
    Ok(())
}

pub fn get_sample(daemon: &mut Daemon, caller: &Caller, object_path: &str, cap: &str) -> Result<Sample> {
    find_sensor_mut(&mut daemon.sensors, object_path)?.get_sample(&caller.sender, cap)
}
