use crate::error::app_error::AppError;
use crate::models::profile::Role;
use std::io;
use std::path::PathBuf;
use tracing::warn;

/// Storage for the role a visitor picks right before an OAuth redirect.
///
/// The selection happens on the login page, but the account only comes into
/// existence after the provider round-trip, so the choice has to survive
/// until the next initialization, where role reconciliation consumes it.
pub trait PendingRoleStore: Send + Sync {
    /// Currently pending selection. Unreadable markers count as absent.
    fn load(&self) -> Result<Option<Role>, AppError>;

    fn save(&self, role: Role) -> Result<(), AppError>;

    fn clear(&self) -> Result<(), AppError>;
}

/// Marker-file store, the durable default for a single-host deployment.
// NOTE: concurrent writers race on the marker file and last write wins. The
// consumer is check-then-set on the profile row, so a lost selection is the
// worst case, never an overwritten role.
pub struct FilePendingRoleStore {
    path: PathBuf,
}

impl FilePendingRoleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PendingRoleStore for FilePendingRoleStore {
    fn load(&self) -> Result<Option<Role>, AppError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let value = contents.trim();
                match Role::parse(value) {
                    Some(role) => Ok(Some(role)),
                    None => {
                        warn!(marker = %self.path.display(), value, "role marker unreadable, treating as absent");
                        Ok(None)
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::pending_role_store("Failed to read role marker", e)),
        }
    }

    fn save(&self, role: Role) -> Result<(), AppError> {
        std::fs::write(&self.path, role.as_str()).map_err(|e| AppError::pending_role_store("Failed to write role marker", e))
    }

    fn clear(&self) -> Result<(), AppError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::pending_role_store("Failed to clear role marker", e)),
        }
    }
}
