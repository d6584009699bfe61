//! Scoped service-account identity.
//!
//! Privileged file mutations (property rewrites, backup directories owned
//! by the service account) run with the effective uid/gid switched to the
//! service account. The switch is an RAII guard: the caller's identity is
//! restored on every exit path, including early returns and errors.

use crate::error::{Error, Result};
use nix::unistd::{getegid, geteuid, setegid, seteuid, Gid, Group, Uid, User};
use std::ffi::OsString;
use std::path::PathBuf;

/// A resolved unix service account.
#[derive(Debug, Clone)]
pub struct ServiceAccount {
    name: String,
    uid: Uid,
    gid: Gid,
    home: PathBuf,
}

impl ServiceAccount {
    /// Look up the account in the system user/group databases. A missing
    /// account means the installation is incomplete.
    pub fn lookup(name: &str) -> Result<Self> {
        let user = User::from_name(name)
            .map_err(|e| Error::Process(format!("cannot query user database: {}", e)))?
            .ok_or_else(|| {
                Error::Config(format!(
                    "cannot find user account '{}', your installation seems incomplete",
                    name
                ))
            })?;

        let group = Group::from_name(name)
            .map_err(|e| Error::Process(format!("cannot query group database: {}", e)))?
            .ok_or_else(|| {
                Error::Config(format!(
                    "cannot find group '{}', your installation seems incomplete",
                    name
                ))
            })?;

        Ok(Self {
            name: name.to_string(),
            uid: user.uid,
            gid: group.gid,
            home: user.dir,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Home directory of the account (pid files live here).
    pub fn home(&self) -> &PathBuf {
        &self.home
    }

    /// Assume this account's identity for the lifetime of the guard.
    pub fn assume(&self) -> Result<IdentityGuard> {
        IdentityGuard::acquire(self)
    }
}

/// Restores the original effective identity (and `$HOME`) when dropped.
pub struct IdentityGuard {
    saved_uid: Uid,
    saved_gid: Gid,
    saved_home: Option<OsString>,
}

impl IdentityGuard {
    fn acquire(account: &ServiceAccount) -> Result<Self> {
        let saved_uid = geteuid();
        let saved_gid = getegid();
        let saved_home = std::env::var_os("HOME");

        // Group first: once the effective uid is unprivileged, setegid
        // would be refused.
        setegid(account.gid).map_err(|e| {
            Error::Process(format!(
                "cannot switch effective gid to '{}': {}",
                account.name, e
            ))
        })?;
        if let Err(e) = seteuid(account.uid) {
            // Undo the half-switch before reporting.
            let _ = setegid(saved_gid);
            return Err(Error::Process(format!(
                "cannot switch effective uid to '{}': {}",
                account.name, e
            )));
        }
        std::env::set_var("HOME", &account.home);

        Ok(Self {
            saved_uid,
            saved_gid,
            saved_home,
        })
    }
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        // Uid first to regain the privilege needed for setegid.
        if let Err(e) = seteuid(self.saved_uid) {
            tracing::error!("failed to restore effective uid: {}", e);
        }
        if let Err(e) = setegid(self.saved_gid) {
            tracing::error!("failed to restore effective gid: {}", e);
        }
        match &self.saved_home {
            Some(home) => std::env::set_var("HOME", home),
            None => std::env::remove_var("HOME"),
        }
    }
}
