//! Locally persisted session state.
//!
//! Holds what the client wants back on the next start: the signed-in user,
//! the classroom list, the chosen theme and per-classroom roster snapshots.
//! The token itself stays in the keyring (see `credentials`). Loading and
//! saving are best effort: a missing or broken file yields the defaults.
use crate::scms::{ClassroomSummary, UserProfile};
use crate::student::Student;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_FOLDER_NAME: &str = "scms_connector";
const STATE_FILE_NAME: &str = "state.json";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// Roster of a classroom as fetched at `taken_at`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RosterSnapshot {
    pub taken_at: DateTime<Utc>,
    pub students: Vec<Student>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LocalState {
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub classrooms: Vec<ClassroomSummary>,
    #[serde(default)]
    pub theme: Theme,
    /// Keyed by class code.
    #[serde(default)]
    pub enrolled_snapshots: HashMap<String, RosterSnapshot>,
}

impl LocalState {
    /// `<cache dir>/scms_connector/state.json`, when the platform has a cache dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join(APP_FOLDER_NAME).join(STATE_FILE_NAME))
    }

    pub fn load() -> LocalState {
        match LocalState::default_path() {
            Some(path) => LocalState::load_from(&path),
            None => {
                warn!("no cache directory available, starting with empty local state");
                LocalState::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> LocalState {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("no local state at {}: {}", path.display(), e);
                return LocalState::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                warn!("ignoring unreadable local state {}: {}", path.display(), e);
                LocalState::default()
            }
        }
    }

    /// Saves to the default location. Failures are logged and reported as `false`.
    pub fn save(&self) -> bool {
        let path = match LocalState::default_path() {
            Some(path) => path,
            None => return false,
        };
        match self.save_to(&path) {
            Ok(()) => true,
            Err(e) => {
                warn!("could not save local state to {}: {}", path.display(), e);
                false
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let partial = path.with_extension("json.part");
        fs::write(&partial, json)?;
        fs::rename(&partial, path)?;
        Ok(())
    }

    pub fn remember_roster(&mut self, class_code: &str, students: Vec<Student>, taken_at: DateTime<Utc>) {
        self.enrolled_snapshots
            .insert(class_code.to_string(), RosterSnapshot { taken_at, students });
    }

    pub fn roster(&self, class_code: &str) -> Option<&RosterSnapshot> {
        self.enrolled_snapshots.get(class_code)
    }

    /// Clears everything tied to the signed-in user. The theme survives logout.
    pub fn forget_session(&mut self) {
        *self = LocalState {
            theme: self.theme,
            ..LocalState::default()
        };
    }
}
