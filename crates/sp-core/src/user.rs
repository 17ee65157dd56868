//! User, credential, and active-task models.

use crate::secret::Secret;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered bot user, keyed by the chat platform's numeric id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Chat platform user id.
    pub owner_id: i64,
    /// Preferred language code for catalog lookups.
    pub lang: String,
    /// Whether the user may use the admin surface.
    pub is_admin: bool,
    /// Banned users are denied before any remote call.
    pub is_banned: bool,
    /// Soft-delete flag; deleted users are denied like banned ones.
    pub is_deleted: bool,
    /// First time this user talked to the bot.
    pub first_seen: DateTime<Utc>,
}

/// A sandbox API key bound to a user.
///
/// At most one credential per owner is active at a time; the credential
/// repository enforces this when a key is added or activated.
#[derive(Debug, Clone)]
pub struct Credential {
    /// The API key itself, zeroized on drop.
    pub key: Secret,
    pub owner_id: i64,
    /// Display label chosen by the user.
    pub name: String,
    pub is_active: bool,
}

/// A submitted, not-yet-resolved analysis job.
///
/// `is_active` transitions to `false` exactly once, when the status
/// monitor observes a terminal remote state. Rows are never deleted here;
/// they back the history display elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTask {
    /// Opaque task id assigned by the remote sandbox.
    pub task_id: String,
    pub owner_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
