//! Property listing model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, ListingId, UserId};
use crate::error::{HomebookError, Result};

/// A property offered by a seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Unique identifier.
    pub id: ListingId,
    /// Short headline.
    pub title: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Asking price.
    pub price: f64,
    /// Free-text location, matched by equality when filtering.
    pub location: String,
    /// Property category.
    pub category: Category,
    /// Image reference (URL or path).
    #[serde(default)]
    pub image: Option<String>,
    /// Seller who owns the listing.
    pub owner: UserId,
    /// Creation timestamp (Unix seconds).
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
}

/// Caller-supplied fields of a listing to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    /// Short headline.
    pub title: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Asking price.
    pub price: f64,
    /// Free-text location.
    pub location: String,
    /// Property category.
    pub category: Category,
    /// Image reference.
    #[serde(default)]
    pub image: Option<String>,
}

impl NewListing {
    /// Checks the fields for obviously malformed input.
    ///
    /// # Errors
    ///
    /// Returns [`HomebookError::Validation`] if the title or location is
    /// blank, or the price is negative or not finite.
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(HomebookError::Validation("title must not be empty".into()));
        }
        if self.location.trim().is_empty() {
            return Err(HomebookError::Validation(
                "location must not be empty".into(),
            ));
        }
        if !self.price.is_finite() || self.price < 0.0_f64 {
            return Err(HomebookError::Validation(format!(
                "price must be a non-negative number, got {}",
                self.price
            )));
        }
        Ok(())
    }

    /// Turns the request into a stored listing owned by `owner`.
    #[inline]
    #[must_use]
    pub fn into_listing(self, id: ListingId, owner: UserId, created: DateTime<Utc>) -> Listing {
        Listing {
            id,
            title: self.title,
            description: self.description,
            price: self.price,
            location: self.location,
            category: self.category,
            image: self.image.filter(|image| !image.trim().is_empty()),
            owner,
            created,
        }
    }
}
