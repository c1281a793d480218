// Profile object calls

use super::views::ProfileView;
use crate::auth::{self, Caller};
use crate::constants::*;
use crate::daemon::Daemon;
use crate::device::check_property_len;
use crate::error::{ColordError, Result};

fn profile_not_found(object_path: &str) -> ColordError {
    ColordError::NotFound(format!("profile object path '{}' does not exist", object_path))
}

pub fn get_profile(daemon: &Daemon, caller: &Caller, object_path: &str) -> Result<ProfileView> {
    let profile = daemon
        .profiles
        .get_by_object_path(object_path)
        .ok_or_else(|| profile_not_found(object_path))?;
    ProfileView::for_viewer(profile, caller.uid, &daemon.profile_db)
}

/// Title is stored per caller; everything else changes the shared profile
pub fn set_property(daemon: &mut Daemon, caller: &Caller, object_path: &str, key: &str, value: &str) -> Result<()> {
    auth::check(daemon.authorizer.as_ref(), ACTION_MODIFY_PROFILE, caller)?;
    let profile = daemon
        .profiles
        .get_by_object_path_mut(object_path)
        .ok_or_else(|| profile_not_found(object_path))?;

    let changed = if key == PROFILE_PROPERTY_TITLE {
        check_property_len(key, value)?;
        daemon
            .profile_db
            .set_property(profile.id(), PROFILE_PROPERTY_TITLE, caller.uid, value)?;
        vec![PROFILE_PROPERTY_TITLE]
    } else {
        let may_open = daemon.config.profiles.fd_fallback;
        profile.set_property(key, value, daemon.decoder.as_ref(), may_open)?
    };

    daemon.emit_profile_changed(object_path, &changed);
    Ok(())
}

/// Returns the installed copy's path; the next rescan registers it
pub fn install_system_wide(daemon: &mut Daemon, caller: &Caller, object_path: &str) -> Result<String> {
    auth::check(daemon.authorizer.as_ref(), ACTION_INSTALL_SYSTEM_WIDE, caller)?;
    let profile = daemon
        .profiles
        .get_by_object_path(object_path)
        .ok_or_else(|| profile_not_found(object_path))?;
    let dest = profile.install_system_wide(&daemon.config.profiles.machine_dir)?;
    Ok(dest.display().to_string())
}
