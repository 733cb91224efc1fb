//! Marketplace user model.

use serde::{Deserialize, Serialize};

use super::{ListingId, Role, UserId};

/// A marketplace user, either a buyer or a seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Display name, unique across users.
    pub username: String,
    /// Contact email, unique across users (case-insensitive).
    pub email: String,
    /// Hashed password credential. Opaque to this crate.
    pub password_hash: String,
    /// Role the user acts in.
    pub role: Role,
    /// Listings owned by this user (sellers only).
    #[serde(default)]
    pub listings: Vec<ListingId>,
}

impl User {
    /// Returns the email in the form used for uniqueness checks.
    #[inline]
    #[must_use]
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}
