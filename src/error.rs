//! Error types for the homebook marketplace.

use crate::models::ListingId;

/// All errors that can occur when using the marketplace.
#[derive(Debug, thiserror::Error)]
pub enum HomebookError {
    /// No caller identity was presented, or it does not resolve to a user.
    #[error("authentication required")]
    Unauthenticated,

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up (`"listing"`, `"user"`).
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The listing already has a confirmed reservation.
    #[error("listing {0} is already booked")]
    AlreadyBooked(ListingId),

    /// The caller lacks rights over the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed input, such as a negative price or a duplicate username.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Storage backend failed.
    #[error("storage error: {0}")]
    Storage(Box<dyn core::error::Error + Send + Sync>),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HomebookError {
    /// Shorthand for a [`HomebookError::NotFound`] on a listing.
    #[inline]
    #[must_use]
    pub fn listing_not_found(id: &ListingId) -> Self {
        Self::NotFound {
            entity: "listing",
            id: id.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, HomebookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_from_serde_json() {
        let serde_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err = HomebookError::from(serde_err);
        assert!(matches!(err, HomebookError::Serialization(_)));
        assert!(err.to_string().contains("serialization error"));
    }

    #[test]
    fn error_storage_display() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = HomebookError::Storage(Box::new(inner));
        let msg = err.to_string();
        assert!(msg.contains("storage error"));
        assert!(msg.contains("file missing"));
    }

    #[test]
    fn already_booked_names_listing() {
        let err = HomebookError::AlreadyBooked(ListingId::new("l-1".to_owned()));
        assert_eq!(err.to_string(), "listing l-1 is already booked");
    }

    #[test]
    fn listing_not_found_display() {
        let err = HomebookError::listing_not_found(&ListingId::new("l-9".to_owned()));
        assert_eq!(err.to_string(), "listing not found: l-9");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HomebookError>();
    }
}
