// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Onboarding Status
//!
//! Whether this installation has completed onboarding, and when its trial
//! started. The status is loaded once at startup, handed to the flows that
//! need it, and written back when a signup path completes.
//!
//! ## Storage Layout
//!
//! ```text
//! {WELLI_DATA_DIR}/
//!   onboarding.json   # {"onboarded":"true","trial_start":"2026-01-01T00:00:00Z"}
//! ```
//!
//! Flags are stored as the strings `"true"` / `"false"` so the file matches
//! the browser storage keys it replaces.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_FILE_NAME: &str = "onboarding.json";

/// Persisted onboarding flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingStatus {
    #[serde(with = "string_flag")]
    pub onboarded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_start: Option<DateTime<Utc>>,
}

/// Which screen the application opens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialScreen {
    Onboarding,
    Dashboard,
}

impl OnboardingStatus {
    /// Status written when a signup path completes at `now`.
    ///
    /// An existing trial start is kept so re-onboarding does not restart the trial.
    pub fn completed(previous: &OnboardingStatus, now: DateTime<Utc>) -> Self {
        Self {
            onboarded: true,
            trial_start: previous.trial_start.or(Some(now)),
        }
    }

    pub fn initial_screen(&self) -> InitialScreen {
        if self.onboarded {
            InitialScreen::Dashboard
        } else {
            InitialScreen::Onboarding
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatusStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Status store lock poisoned")]
    Poisoned,
}

/// Where the onboarding status lives.
pub trait StatusStore: Send + Sync {
    fn load(&self) -> Result<OnboardingStatus, StatusStoreError>;

    fn save(&self, status: &OnboardingStatus) -> Result<(), StatusStoreError>;
}

/// JSON file under the data directory.
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    path: PathBuf,
}

impl FileStatusStore {
    /// Store `onboarding.json` inside `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(STATUS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusStore for FileStatusStore {
    /// A missing file is a fresh installation.
    fn load(&self) -> Result<OnboardingStatus, StatusStoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(OnboardingStatus::default())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Atomic write via rename.
    fn save(&self, status: &OnboardingStatus) -> Result<(), StatusStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, status)?;
            writer.flush()?;
        }

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// Process-local store, for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    status: RwLock<OnboardingStatus>,
}

impl MemoryStatusStore {
    pub fn new(status: OnboardingStatus) -> Self {
        Self {
            status: RwLock::new(status),
        }
    }
}

impl StatusStore for MemoryStatusStore {
    fn load(&self) -> Result<OnboardingStatus, StatusStoreError> {
        self.status
            .read()
            .map(|status| status.clone())
            .map_err(|_| StatusStoreError::Poisoned)
    }

    fn save(&self, status: &OnboardingStatus) -> Result<(), StatusStoreError> {
        let mut guard = self.status.write().map_err(|_| StatusStoreError::Poisoned)?;
        *guard = status.clone();
        Ok(())
    }
}

mod string_flag {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match String::deserialize(deserializer)?.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(D::Error::custom(format!("invalid flag {other:?}"))),
        }
    }
}
