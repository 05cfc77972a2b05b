//! Administrative state of the owning device service.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::autoevent::LockState;
use crate::{Error, Result};

/// Administrative state of a device service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdminState {
    Locked,
    #[default]
    Unlocked,
}

impl fmt::Display for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminState::Locked => write!(f, "LOCKED"),
            AdminState::Unlocked => write!(f, "UNLOCKED"),
        }
    }
}

impl FromStr for AdminState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOCKED" => Ok(AdminState::Locked),
            "UNLOCKED" => Ok(AdminState::Unlocked),
            other => Err(Error::config(format!("unknown admin state: {}", other))),
        }
    }
}

/// Shared, runtime-togglable admin state of the running service.
#[derive(Debug)]
pub struct ServiceState {
    name: String,
    locked: AtomicBool,
}

impl ServiceState {
    pub fn new(name: impl Into<String>, admin_state: AdminState) -> Self {
        Self {
            name: name.into(),
            locked: AtomicBool::new(admin_state == AdminState::Locked),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn admin_state(&self) -> AdminState {
        if self.locked.load(Ordering::SeqCst) {
            AdminState::Locked
        } else {
            AdminState::Unlocked
        }
    }

    pub fn set_admin_state(&self, state: AdminState) {
        let previous = self
            .locked
            .swap(state == AdminState::Locked, Ordering::SeqCst);
        if previous != (state == AdminState::Locked) {
            info!(service = %self.name, admin_state = %state, "Admin state changed");
        }
    }
}

impl LockState for ServiceState {
    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }
}
