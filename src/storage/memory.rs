//! In-memory storage backend.
//!
//! Provides [`InMemoryStorage`], a thread-safe in-memory implementation of
//! the storage traits. Ideal for unit and integration tests where file I/O
//! is undesirable, and for embedding the marketplace in a single process.

use std::collections::HashSet;
use std::sync::Mutex;

#[cfg(feature = "async")]
use core::future::{self, Future};

use crate::error::{HomebookError, Result};
use crate::marketplace::ListingFilter;
use crate::models::{Listing, ListingId, Reservation, User, UserId};

use super::{ReserveOutcome, rules};

/// Thread-safe in-memory storage.
///
/// This type implements both [`super::Storage`] (async) and
/// [`super::BlockingStorage`] (blocking) traits, providing a zero-setup
/// storage backend.
///
/// # Atomicity
///
/// All collections sit behind one mutex, and every trait method runs as
/// a single critical section. The conditional insert behind
/// `reserve` therefore cannot interleave with another booking.
///
/// # Example
///
/// ```rust
/// use homebook::storage::InMemoryStorage;
///
/// let storage = InMemoryStorage::new();
/// // Use with the Marketplace or MarketplaceBlocking builders:
/// // MarketplaceBlocking::builder().storage(storage).build()
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    /// All state behind a single mutex for thread-safe interior mutability.
    inner: Mutex<Inner>,
}

/// Inner mutable state.
#[derive(Debug, Default)]
struct Inner {
    /// Stored listings.
    listings: Vec<Listing>,
    /// Stored users.
    users: Vec<User>,
    /// Stored reservations.
    reservations: Vec<Reservation>,
}

impl InMemoryStorage {
    /// Creates a new empty in-memory storage.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the inner lock and applies a closure.
    fn with_lock<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R> {
        let mut inner = self.inner.lock().map_err(|err| lock_error(&err))?;
        Ok(f(&mut inner))
    }

    /// Acquires the inner lock and applies a fallible closure.
    fn try_with_lock<R>(&self, f: impl FnOnce(&mut Inner) -> Result<R>) -> Result<R> {
        self.with_lock(f)?
    }

    /// Returns all listings, oldest first.
    fn read_listings(&self) -> Result<Vec<Listing>> {
        self.with_lock(|inner| {
            let mut listings = inner.listings.clone();
            rules::sort_listings(&mut listings);
            listings
        })
    }

    /// Returns a single listing by ID.
    fn read_listing(&self, id: &ListingId) -> Result<Option<Listing>> {
        self.with_lock(|inner| inner.listings.iter().find(|l| l.id == *id).cloned())
    }

    /// Returns listings matching `filter`.
    fn read_matching(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        self.with_lock(|inner| rules::matching_listings(&inner.listings, filter))
    }

    /// Stores a listing and links it to its owner.
    fn write_listing(&self, listing: Listing) -> Result<()> {
        self.try_with_lock(|inner| {
            rules::insert_listing(&mut inner.listings, &mut inner.users, listing)
        })
    }

    /// Deletes a listing after ownership and reservation checks.
    fn remove_listing(&self, id: &ListingId, caller: &UserId) -> Result<()> {
        self.try_with_lock(|inner| {
            rules::delete_listing(
                &mut inner.listings,
                &mut inner.users,
                &inner.reservations,
                id,
                caller,
            )
        })
    }

    /// Returns all users.
    fn read_users(&self) -> Result<Vec<User>> {
        self.with_lock(|inner| inner.users.clone())
    }

    /// Returns a single user by ID.
    fn read_user(&self, id: &UserId) -> Result<Option<User>> {
        self.with_lock(|inner| inner.users.iter().find(|u| u.id == *id).cloned())
    }

    /// Inserts users after uniqueness checks.
    fn write_users(&self, items: Vec<User>) -> Result<()> {
        self.try_with_lock(|inner| {
            rules::check_new_users(&inner.users, &items)?;
            inner.users.extend(items);
            Ok(())
        })
    }

    /// Conditional insert of a reservation.
    fn write_reservation(&self, reservation: Reservation) -> Result<ReserveOutcome> {
        self.with_lock(|inner| {
            rules::reserve(&inner.listings, &mut inner.reservations, reservation)
        })
    }

    /// Returns the active reservation for a listing.
    fn read_active(&self, listing: &ListingId) -> Result<Option<Reservation>> {
        self.with_lock(|inner| rules::active_for(&inner.reservations, listing).cloned())
    }

    /// Returns reservations made by `requester`.
    fn read_by_requester(&self, requester: &UserId) -> Result<Vec<Reservation>> {
        self.with_lock(|inner| {
            let mut found: Vec<Reservation> = inner
                .reservations
                .iter()
                .filter(|r| r.requester == *requester)
                .cloned()
                .collect();
            rules::sort_reservations(&mut found);
            found
        })
    }

    /// Returns IDs of listings with an active reservation.
    fn read_active_ids(&self) -> Result<HashSet<ListingId>> {
        self.with_lock(|inner| rules::active_listing_ids(&inner.reservations))
    }

    /// Returns all reservations, oldest first.
    fn read_reservations(&self) -> Result<Vec<Reservation>> {
        self.with_lock(|inner| {
            let mut reservations = inner.reservations.clone();
            rules::sort_reservations(&mut reservations);
            reservations
        })
    }

    /// Drops every stored record.
    fn reset(&self) -> Result<()> {
        self.with_lock(|inner| *inner = Inner::default())
    }
}

/// Wraps a mutex poison error.
fn lock_error<T>(err: &std::sync::PoisonError<T>) -> HomebookError {
    HomebookError::Storage(err.to_string().into())
}

// ── BlockingStorage implementation ──────────────────────────────────────

#[cfg(feature = "blocking")]
impl super::BlockingStorage for InMemoryStorage {
    #[inline]
    fn listings(&self) -> Result<Vec<Listing>> {
        self.read_listings()
    }

    #[inline]
    fn listing(&self, id: &ListingId) -> Result<Option<Listing>> {
        self.read_listing(id)
    }

    #[inline]
    fn find_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        self.read_matching(filter)
    }

    #[inline]
    fn insert_listing(&self, listing: Listing) -> Result<()> {
        self.write_listing(listing)
    }

    #[inline]
    fn delete_listing(&self, id: &ListingId, caller: &UserId) -> Result<()> {
        self.remove_listing(id, caller)
    }

    #[inline]
    fn users(&self) -> Result<Vec<User>> {
        self.read_users()
    }

    #[inline]
    fn user(&self, id: &UserId) -> Result<Option<User>> {
        self.read_user(id)
    }

    #[inline]
    fn insert_users(&self, items: Vec<User>) -> Result<()> {
        self.write_users(items)
    }

    #[inline]
    fn reserve(&self, reservation: Reservation) -> Result<ReserveOutcome> {
        self.write_reservation(reservation)
    }

    #[inline]
    fn active_reservation(&self, listing: &ListingId) -> Result<Option<Reservation>> {
        self.read_active(listing)
    }

    #[inline]
    fn reservations_by_requester(&self, requester: &UserId) -> Result<Vec<Reservation>> {
        self.read_by_requester(requester)
    }

    #[inline]
    fn active_listing_ids(&self) -> Result<HashSet<ListingId>> {
        self.read_active_ids()
    }

    #[inline]
    fn reservations(&self) -> Result<Vec<Reservation>> {
        self.read_reservations()
    }

    #[inline]
    fn clear(&self) -> Result<()> {
        self.reset()
    }
}

// ── Storage (async) implementation ──────────────────────────────────────

#[cfg(feature = "async")]
impl super::Storage for InMemoryStorage {
    #[inline]
    fn listings(&self) -> impl Future<Output = Result<Vec<Listing>>> + Send {
        future::ready(self.read_listings())
    }

    #[inline]
    fn listing(&self, id: &ListingId) -> impl Future<Output = Result<Option<Listing>>> + Send {
        future::ready(self.read_listing(id))
    }

    #[inline]
    fn find_listings(
        &self,
        filter: &ListingFilter,
    ) -> impl Future<Output = Result<Vec<Listing>>> + Send {
        future::ready(self.read_matching(filter))
    }

    #[inline]
    fn insert_listing(&self, listing: Listing) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.write_listing(listing))
    }

    #[inline]
    fn delete_listing(
        &self,
        id: &ListingId,
        caller: &UserId,
    ) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.remove_listing(id, caller))
    }

    #[inline]
    fn users(&self) -> impl Future<Output = Result<Vec<User>>> + Send {
        future::ready(self.read_users())
    }

    #[inline]
    fn user(&self, id: &UserId) -> impl Future<Output = Result<Option<User>>> + Send {
        future::ready(self.read_user(id))
    }

    #[inline]
    fn insert_users(&self, items: Vec<User>) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.write_users(items))
    }

    #[inline]
    fn reserve(
        &self,
        reservation: Reservation,
    ) -> impl Future<Output = Result<ReserveOutcome>> + Send {
        future::ready(self.write_reservation(reservation))
    }

    #[inline]
    fn active_reservation(
        &self,
        listing: &ListingId,
    ) -> impl Future<Output = Result<Option<Reservation>>> + Send {
        future::ready(self.read_active(listing))
    }

    #[inline]
    fn reservations_by_requester(
        &self,
        requester: &UserId,
    ) -> impl Future<Output = Result<Vec<Reservation>>> + Send {
        future::ready(self.read_by_requester(requester))
    }

    #[inline]
    fn active_listing_ids(&self) -> impl Future<Output = Result<HashSet<ListingId>>> + Send {
        future::ready(self.read_active_ids())
    }

    #[inline]
    fn reservations(&self) -> impl Future<Output = Result<Vec<Reservation>>> + Send {
        future::ready(self.read_reservations())
    }

    #[inline]
    fn clear(&self) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.reset())
    }
}
