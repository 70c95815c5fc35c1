//! User profile text resources.
//!
//! Profiles are plain text files named `<profile>.txt` in the profiles
//! directory. The active profile is fixed at startup; its content can be read
//! and overwritten at runtime.

use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{ServiceError, ServiceResult};

/// Text used when the active profile has no file
pub const MISSING_PROFILE_TEXT: &str = "No profile information available.";

/// Text used when the active profile file exists but cannot be read
pub const UNREADABLE_PROFILE_TEXT: &str = "Error loading profile.";

pub struct ProfileStore {
    dir: PathBuf,
    current: String,
    write_lock: Mutex<()>,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>, current: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            current: current.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Name of the active profile
    pub fn current_name(&self) -> &str {
        &self.current
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.txt", self.current))
    }

    /// Content of the active profile, never failing
    pub fn load(&self) -> String {
        let path = self.current_path();
        match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "User profile not found, using empty profile");
                MISSING_PROFILE_TEXT.to_string()
            }
            Err(e) => {
                error!(profile = %self.current, error = %e, "Failed to load user profile");
                UNREADABLE_PROFILE_TEXT.to_string()
            }
        }
    }

    /// Overwrite the active profile's content
    pub fn save(&self, content: &str) -> ServiceResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        std::fs::create_dir_all(&self.dir).map_err(ServiceError::Io)?;
        std::fs::write(self.current_path(), content).map_err(ServiceError::Io)?;

        info!(profile = %self.current, bytes = content.len(), "User profile updated");
        Ok(())
    }

    /// Names of all available profiles, sorted
    pub fn list(&self) -> ServiceResult<Vec<String>> {
        std::fs::create_dir_all(&self.dir).map_err(ServiceError::Io)?;

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(ServiceError::Io)? {
            let path = entry.map_err(ServiceError::Io)?.path();
            if path.extension().is_some_and(|ext| ext == "txt") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
