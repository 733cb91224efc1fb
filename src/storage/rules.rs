//! Backend-independent consistency rules.
//!
//! Both backends load their collections, hand them to these functions
//! while holding their write lock, and persist the result. Keeping the
//! decisions here means the in-memory and file backends cannot drift
//! apart on what "already reserved" or "owned by" means.

use std::collections::HashSet;

use crate::error::{HomebookError, Result};
use crate::marketplace::ListingFilter;
use crate::models::{Listing, ListingId, Reservation, User, UserId};

use super::ReserveOutcome;

/// Returns the listings matching `filter`, sorted oldest first.
pub(super) fn matching_listings(listings: &[Listing], filter: &ListingFilter) -> Vec<Listing> {
    let mut matched: Vec<Listing> = listings
        .iter()
        .filter(|listing| filter.matches(listing))
        .cloned()
        .collect();
    sort_listings(&mut matched);
    matched
}

/// Sorts listings by creation time, then by ID.
pub(super) fn sort_listings(listings: &mut [Listing]) {
    listings.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
}

/// Sorts reservations by creation time, then by ID.
pub(super) fn sort_reservations(reservations: &mut [Reservation]) {
    reservations.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
}

/// Returns the active reservation for `listing`, if any.
pub(super) fn active_for<'res>(
    reservations: &'res [Reservation],
    listing: &ListingId,
) -> Option<&'res Reservation> {
    reservations
        .iter()
        .find(|reservation| reservation.is_active() && reservation.listing == *listing)
}

/// Collects the IDs of listings that have an active reservation.
pub(super) fn active_listing_ids(reservations: &[Reservation]) -> HashSet<ListingId> {
    reservations
        .iter()
        .filter(|reservation| reservation.is_active())
        .map(|reservation| reservation.listing.clone())
        .collect()
}

/// Appends `reservation` unless its listing is missing or already taken.
///
/// The caller must hold the backend's write lock across the load, this
/// call, and the persist step.
pub(super) fn reserve(
    listings: &[Listing],
    reservations: &mut Vec<Reservation>,
    reservation: Reservation,
) -> ReserveOutcome {
    if !listings.iter().any(|listing| listing.id == reservation.listing) {
        return ReserveOutcome::ListingMissing;
    }
    if reservation.is_active()
        && let Some(existing) = active_for(reservations, &reservation.listing)
    {
        return ReserveOutcome::AlreadyReserved(existing.id.clone());
    }
    reservations.push(reservation.clone());
    ReserveOutcome::Reserved(reservation)
}

/// Adds `listing` to `listings` and to its owner's listing list.
pub(super) fn insert_listing(
    listings: &mut Vec<Listing>,
    users: &mut [User],
    listing: Listing,
) -> Result<()> {
    if listings.iter().any(|existing| existing.id == listing.id) {
        return Err(HomebookError::Validation(format!(
            "listing {} already exists",
            listing.id
        )));
    }
    if let Some(owner) = users.iter_mut().find(|user| user.id == listing.owner) {
        owner.listings.push(listing.id.clone());
    }
    listings.push(listing);
    Ok(())
}

/// Removes listing `id` on behalf of `caller` after checking ownership
/// and that nobody has booked it.
pub(super) fn delete_listing(
    listings: &mut Vec<Listing>,
    users: &mut [User],
    reservations: &[Reservation],
    id: &ListingId,
    caller: &UserId,
) -> Result<()> {
    let Some(position) = listings.iter().position(|listing| listing.id == *id) else {
        return Err(HomebookError::listing_not_found(id));
    };
    let owner = listings
        .get(position)
        .map(|listing| listing.owner.clone())
        .ok_or_else(|| HomebookError::listing_not_found(id))?;
    if owner != *caller {
        return Err(HomebookError::Forbidden(format!(
            "user {caller} does not own listing {id}"
        )));
    }
    if active_for(reservations, id).is_some() {
        return Err(HomebookError::Forbidden(format!(
            "listing {id} has a confirmed reservation and cannot be deleted"
        )));
    }
    let _removed = listings.remove(position);
    if let Some(user) = users.iter_mut().find(|user| user.id == owner) {
        user.listings.retain(|listing| listing != id);
    }
    Ok(())
}

/// Verifies that `incoming` users collide neither with `existing` nor
/// with each other on ID, username or email.
pub(super) fn check_new_users(existing: &[User], incoming: &[User]) -> Result<()> {
    let mut ids: HashSet<&UserId> = existing.iter().map(|user| &user.id).collect();
    let mut usernames: HashSet<&str> = existing.iter().map(|user| user.username.as_str()).collect();
    let mut emails: HashSet<String> = existing.iter().map(User::normalized_email).collect();
    for user in incoming {
        if !ids.insert(&user.id) {
            return Err(HomebookError::Validation(format!(
                "user {} already exists",
                user.id
            )));
        }
        if !usernames.insert(user.username.as_str()) {
            return Err(HomebookError::Validation(format!(
                "username {} is already taken",
                user.username
            )));
        }
        if !emails.insert(user.normalized_email()) {
            return Err(HomebookError::Validation(format!(
                "email {} is already registered",
                user.email
            )));
        }
    }
    Ok(())
}
