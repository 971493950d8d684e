pub mod rest;

use crate::error::app_error::AppError;
use crate::models::profile::{Role, UserProfile};
use crate::models::status::RoleLookup;
use async_trait::async_trait;
use uuid::Uuid;

/// Read/write access to the user profile table.
///
/// Absence is never an error: a missing row comes back as Ok(None) or
/// `exists: false`, so callers can tell "no such account" apart from a
/// failing store.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Profile for an account id, None when no row exists.
    async fn profile_by_id(&self, id: &Uuid) -> Result<Option<UserProfile>, AppError>;

    /// Account id behind an email address, None when unregistered.
    async fn profile_id_by_email(&self, email: &str) -> Result<Option<Uuid>, AppError>;

    /// Role keyed by email, reporting row presence separately from the
    /// nullable role column.
    async fn role_by_email(&self, email: &str) -> Result<RoleLookup, AppError>;

    /// Role for an account id. A missing row and a null column both map
    /// to None.
    async fn role_by_id(&self, id: &Uuid) -> Result<Option<Role>, AppError>;

    /// Writes the role column for an account.
    async fn set_role(&self, id: &Uuid, role: Role) -> Result<(), AppError>;
}
