//! Availability filtering.
//!
//! A listing is available when no active (confirmed) reservation
//! references it. Both the public browse view and a seller's own view
//! pass their candidates through [`exclude_reserved`].

use std::collections::HashSet;
use std::hash::BuildHasher;

use crate::models::{Listing, ListingId};

/// Returns the candidates whose ID is not in `reserved`, preserving order.
///
/// # Examples
///
/// ```
/// use std::collections::HashSet;
/// use homebook::availability::exclude_reserved;
///
/// let available = exclude_reserved(Vec::new(), &HashSet::new());
/// assert!(available.is_empty());
/// ```
#[inline]
#[must_use]
pub fn exclude_reserved<S: BuildHasher>(
    candidates: Vec<Listing>,
    reserved: &HashSet<ListingId, S>,
) -> Vec<Listing> {
    if reserved.is_empty() {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|listing| !reserved.contains(&listing.id))
        .collect()
}
