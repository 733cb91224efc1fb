//! High-level marketplace service on top of a storage backend.
//!
//! Combines a [`Storage`](crate::storage::Storage) /
//! [`BlockingStorage`](crate::storage::BlockingStorage) backend with the booking
//! rules: who may create or delete listings, what the public browse view
//! shows, and how a booking claims a listing exactly once.
//!
//! The caller's identity is always an explicit argument. Nothing here
//! keeps session state between calls.

use crate::error::{HomebookError, Result};
use crate::models::{Category, Listing, ListingId, User, UserId};

/// Default cap on the number of listings returned by a browse query.
pub const DEFAULT_BROWSE_LIMIT: usize = 100;

/// Composable filter for querying listings.
///
/// Use builder-style methods to chain criteria. A listing must satisfy
/// every set criterion to pass.
///
/// # Examples
///
/// ```
/// use homebook::marketplace::ListingFilter;
/// use homebook::models::Category;
///
/// let filter = ListingFilter::new()
///     .location("Lisbon")
///     .category(Category::Apartment)
///     .price_range(100_000.0, 250_000.0);
/// ```
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListingFilter {
    /// Location (exact match).
    pub location: Option<String>,
    /// Property category.
    pub category: Option<Category>,
    /// Minimum price (inclusive).
    pub min_price: Option<f64>,
    /// Maximum price (inclusive).
    pub max_price: Option<f64>,
    /// Owning seller.
    pub owner: Option<UserId>,
}

impl ListingFilter {
    /// Creates an empty filter that matches all listings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to listings at exactly the given location.
    #[inline]
    #[must_use]
    pub fn location<T: Into<String>>(mut self, location: T) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Restricts to listings of the given category.
    #[inline]
    #[must_use]
    pub const fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Restricts to listings priced at least `min`.
    #[inline]
    #[must_use]
    pub const fn min_price(mut self, min: f64) -> Self {
        self.min_price = Some(min);
        self
    }

    /// Restricts to listings priced at most `max`.
    #[inline]
    #[must_use]
    pub const fn max_price(mut self, max: f64) -> Self {
        self.max_price = Some(max);
        self
    }

    /// Restricts to listings priced within `[min, max]`.
    #[inline]
    #[must_use]
    pub const fn price_range(self, min: f64, max: f64) -> Self {
        self.min_price(min).max_price(max)
    }

    /// Restricts to listings owned by the given seller.
    #[inline]
    #[must_use]
    pub fn owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Checks that the price bounds are numbers and form a non-empty range.
    ///
    /// # Errors
    ///
    /// Returns [`HomebookError::Validation`] if a bound is NaN or `min`
    /// exceeds `max`.
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.min_price.is_some_and(f64::is_nan) || self.max_price.is_some_and(f64::is_nan) {
            return Err(HomebookError::Validation(
                "price bounds must be numbers".into(),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price)
            && min > max
        {
            return Err(HomebookError::Validation(format!(
                "min price {min} exceeds max price {max}"
            )));
        }
        Ok(())
    }

    /// Returns `true` if the listing satisfies all set criteria.
    #[inline]
    pub(crate) fn matches(&self, listing: &Listing) -> bool {
        self.location
            .as_ref()
            .is_none_or(|location| listing.location == *location)
            && self.category.is_none_or(|category| listing.category == category)
            && self.min_price.is_none_or(|min| listing.price >= min)
            && self.max_price.is_none_or(|max| listing.price <= max)
            && self.owner.as_ref().is_none_or(|owner| listing.owner == *owner)
    }
}

/// A request to book a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    /// Listing to book.
    pub listing: ListingId,
    /// Identity of the caller, if one was presented.
    pub caller: Option<UserId>,
}

impl BookingRequest {
    /// Creates a booking request for `listing` on behalf of `caller`.
    #[inline]
    #[must_use]
    pub const fn new(listing: ListingId, caller: Option<UserId>) -> Self {
        Self { listing, caller }
    }
}

/// Checks that the fields of an imported user are present.
fn validate_user(user: &User) -> Result<()> {
    if user.id.as_inner().trim().is_empty() {
        return Err(HomebookError::Validation(
            "user id must not be empty".into(),
        ));
    }
    if user.username.trim().is_empty() {
        return Err(HomebookError::Validation(format!(
            "user {} has an empty username",
            user.id
        )));
    }
    if !user.email.contains('@') {
        return Err(HomebookError::Validation(format!(
            "user {} has an invalid email: {}",
            user.id, user.email
        )));
    }
    Ok(())
}

/// Generates a marketplace service (async or blocking).
macro_rules! define_marketplace {
    (
        service_name: $service:ident,
        builder_name: $builder:ident,
        storage_trait: $storage_trait:ident,
        service_doc: $service_doc:expr,
        builder_doc: $builder_doc:expr,
        $(async_kw: $async_kw:tt,)?
        $(await_kw: $await_ext:tt,)?
    ) => {
        #[doc = $builder_doc]
        #[derive(Debug)]
        pub struct $builder<S: $storage_trait> {
            /// Storage backend.
            storage: Option<S>,
            /// Maximum number of listings a browse query returns.
            browse_limit: usize,
        }

        impl<S: $storage_trait> $builder<S> {
            /// Sets the storage backend.
            #[inline]
            #[must_use]
            pub fn storage(mut self, storage: S) -> Self {
                self.storage = Some(storage);
                self
            }

            /// Caps the number of listings a browse query returns.
            #[inline]
            #[must_use]
            pub const fn browse_limit(mut self, limit: usize) -> Self {
                self.browse_limit = limit;
                self
            }

            /// Builds the marketplace.
            ///
            /// # Errors
            ///
            /// Returns [`HomebookError::Storage`] if no storage was provided.
            /// Returns [`HomebookError::Validation`] if the browse limit is zero.
            #[inline]
            pub fn build(self) -> Result<$service<S>> {
                let storage = self.storage.ok_or_else(|| {
                    HomebookError::Storage("storage backend is required".into())
                })?;
                if self.browse_limit == 0 {
                    return Err(HomebookError::Validation(
                        "browse limit must be positive".into(),
                    ));
                }
                Ok($service {
                    storage,
                    browse_limit: self.browse_limit,
                })
            }
        }

        #[doc = $service_doc]
        #[derive(Debug)]
        pub struct $service<S: $storage_trait> {
            /// Storage backend.
            storage: S,
            /// Maximum number of listings a browse query returns.
            browse_limit: usize,
        }

        impl<S: $storage_trait> $service<S> {
            /// Creates a new builder for configuring the marketplace.
            #[inline]
            #[must_use]
            pub const fn builder() -> $builder<S> {
                $builder {
                    storage: None,
                    browse_limit: DEFAULT_BROWSE_LIMIT,
                }
            }

            // ── Listings ─────────────────────────────────────────────

            /// Publishes a new listing owned by `caller`.
            ///
            /// # Errors
            ///
            /// Returns [`HomebookError::Unauthenticated`] without a known
            /// caller, [`HomebookError::Forbidden`] unless the caller is a
            /// seller, [`HomebookError::Validation`] on malformed fields, or
            /// a storage error.
            #[tracing::instrument(skip_all)]
            pub $($async_kw)? fn create_listing(
                &self,
                caller: Option<&UserId>,
                new_listing: NewListing,
            ) -> Result<Listing> {
                let seller = self.authenticate(caller) $( .$await_ext )? ?;
                if seller.role != Role::Seller {
                    return Err(HomebookError::Forbidden(format!(
                        "user {} is not a seller",
                        seller.id
                    )));
                }
                new_listing.validate()?;
                let listing = new_listing.into_listing(ListingId::generate(), seller.id, Utc::now());
                self.storage.insert_listing(listing.clone()) $( .$await_ext )? ?;
                tracing::debug!(listing = %listing.id, owner = %listing.owner, "listing created");
                Ok(listing)
            }

            /// Returns the listing with the given ID.
            ///
            /// # Errors
            ///
            /// Returns [`HomebookError::NotFound`] if the listing does not
            /// exist, or a storage error.
            #[inline]
            pub $($async_kw)? fn listing(&self, id: &ListingId) -> Result<Listing> {
                self.storage
                    .listing(id)
                    $( .$await_ext )?
                    ?
                    .ok_or_else(|| HomebookError::listing_not_found(id))
            }

            /// Returns the available listings matching `filter`, oldest
            /// first, capped at the configured browse limit.
            ///
            /// Listings with a confirmed reservation never appear here.
            ///
            /// # Errors
            ///
            /// Returns [`HomebookError::Validation`] for a NaN or reversed
            /// price range, or an error if the storage backend fails to read.
            #[tracing::instrument(skip_all)]
            pub $($async_kw)? fn browse(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
                filter.validate()?;
                let candidates = self.storage.find_listings(filter) $( .$await_ext )? ?;
                let reserved = self.storage.active_listing_ids() $( .$await_ext )? ?;
                let mut available = exclude_reserved(candidates, &reserved);
                available.truncate(self.browse_limit);
                tracing::debug!(count = available.len(), "browse");
                Ok(available)
            }

            /// Returns the still-available listings owned by `owner`.
            ///
            /// # Errors
            ///
            /// Returns an error if the storage backend fails to read.
            pub $($async_kw)? fn seller_listings(&self, owner: &UserId) -> Result<Vec<Listing>> {
                let filter = ListingFilter::new().owner(owner.clone());
                let candidates = self.storage.find_listings(&filter) $( .$await_ext )? ?;
                let reserved = self.storage.active_listing_ids() $( .$await_ext )? ?;
                Ok(exclude_reserved(candidates, &reserved))
            }

            /// Deletes a listing owned by `caller`.
            ///
            /// # Errors
            ///
            /// Returns [`HomebookError::Unauthenticated`] without a known
            /// caller, [`HomebookError::NotFound`] if the listing does not
            /// exist, [`HomebookError::Forbidden`] if the caller does not own
            /// it or it has a confirmed reservation, or a storage error.
            #[tracing::instrument(skip_all, fields(listing = %id))]
            pub $($async_kw)? fn delete_listing(
                &self,
                id: &ListingId,
                caller: Option<&UserId>,
            ) -> Result<()> {
                let user = self.authenticate(caller) $( .$await_ext )? ?;
                self.storage.delete_listing(id, &user.id) $( .$await_ext )? ?;
                tracing::debug!(caller = %user.id, "listing deleted");
                Ok(())
            }

            // ── Bookings ─────────────────────────────────────────────

            /// Books a listing for the caller.
            ///
            /// The availability check and the write are a single conditional
            /// insert in storage, so of any number of concurrent requests for
            /// one listing exactly one succeeds.
            ///
            /// # Errors
            ///
            /// Returns [`HomebookError::Unauthenticated`] without a known
            /// caller, [`HomebookError::NotFound`] if the listing does not
            /// exist (or disappears before the insert),
            /// [`HomebookError::AlreadyBooked`] if it already has a confirmed
            /// reservation, or a storage error.
            #[tracing::instrument(skip_all, fields(listing = %request.listing))]
            pub $($async_kw)? fn book_listing(
                &self,
                request: &BookingRequest,
            ) -> Result<BookedReservation> {
                let requester = self.authenticate(request.caller.as_ref()) $( .$await_ext )? ?;
                let listing = self.listing(&request.listing) $( .$await_ext )? ?;
                let reservation =
                    Reservation::confirmed(listing.id.clone(), requester.id.clone(), Utc::now());
                match self.storage.reserve(reservation) $( .$await_ext )? ? {
                    ReserveOutcome::Reserved(stored) => {
                        tracing::debug!(
                            reservation = %stored.id,
                            requester = %requester.id,
                            "listing booked"
                        );
                        Ok(BookedReservation {
                            reservation: stored,
                            listing,
                            requester,
                        })
                    }
                    ReserveOutcome::AlreadyReserved(existing) => {
                        tracing::debug!(existing = %existing, "listing already booked");
                        Err(HomebookError::AlreadyBooked(listing.id))
                    }
                    ReserveOutcome::ListingMissing => {
                        Err(HomebookError::listing_not_found(&request.listing))
                    }
                }
            }

            /// Returns the caller's confirmed reservations joined with their
            /// listings.
            ///
            /// # Errors
            ///
            /// Returns [`HomebookError::Unauthenticated`] without a known
            /// caller, or a storage error.
            #[tracing::instrument(skip_all)]
            pub $($async_kw)? fn booked_listings(
                &self,
                caller: Option<&UserId>,
            ) -> Result<Vec<BookedReservation>> {
                let user = self.authenticate(caller) $( .$await_ext )? ?;
                let reservations = self.storage
                    .reservations_by_requester(&user.id)
                    $( .$await_ext )? ?;
                let mut booked = Vec::new();
                for reservation in reservations.into_iter().filter(Reservation::is_active) {
                    if let Some(joined) = self.join(reservation) $( .$await_ext )? ? {
                        booked.push(joined);
                    }
                }
                Ok(booked)
            }

            /// Returns confirmed reservations on listings owned by the
            /// caller.
            ///
            /// # Errors
            ///
            /// Returns [`HomebookError::Unauthenticated`] without a known
            /// caller, or a storage error.
            #[tracing::instrument(skip_all)]
            pub $($async_kw)? fn sold_listings(
                &self,
                caller: Option<&UserId>,
            ) -> Result<Vec<BookedReservation>> {
                let seller = self.authenticate(caller) $( .$await_ext )? ?;
                let owned: HashSet<ListingId> = self.storage
                    .find_listings(&ListingFilter::new().owner(seller.id.clone()))
                    $( .$await_ext )? ?
                    .into_iter()
                    .map(|listing| listing.id)
                    .collect();
                let reservations = self.storage.reservations() $( .$await_ext )? ?;
                let mut sold = Vec::new();
                for reservation in reservations
                    .into_iter()
                    .filter(|reservation| reservation.is_active() && owned.contains(&reservation.listing))
                {
                    if let Some(joined) = self.join(reservation) $( .$await_ext )? ? {
                        sold.push(joined);
                    }
                }
                Ok(sold)
            }

            // ── Users ────────────────────────────────────────────────

            /// Returns the user with the given ID.
            ///
            /// # Errors
            ///
            /// Returns [`HomebookError::NotFound`] if the user does not
            /// exist, or a storage error.
            #[inline]
            pub $($async_kw)? fn user(&self, id: &UserId) -> Result<User> {
                self.storage
                    .user(id)
                    $( .$await_ext )?
                    ?
                    .ok_or_else(|| HomebookError::NotFound {
                        entity: "user",
                        id: id.to_string(),
                    })
            }

            /// Returns all users.
            ///
            /// # Errors
            ///
            /// Returns an error if the storage backend fails to read.
            #[inline]
            pub $($async_kw)? fn users(&self) -> Result<Vec<User>> {
                self.storage.users() $( .$await_ext )?
            }

            /// Imports users, all or nothing. Returns the number imported.
            ///
            /// # Errors
            ///
            /// Returns [`HomebookError::Validation`] if a user is malformed
            /// or collides with an existing one, or a storage error.
            #[tracing::instrument(skip_all)]
            pub $($async_kw)? fn import_users(&self, users: Vec<User>) -> Result<usize> {
                for user in &users {
                    validate_user(user)?;
                }
                let count = users.len();
                self.storage.insert_users(users) $( .$await_ext )? ?;
                tracing::debug!(count, "users imported");
                Ok(count)
            }

            /// Returns a reference to the storage backend.
            #[inline]
            #[must_use]
            pub const fn storage(&self) -> &S {
                &self.storage
            }

            // ── Private helpers ──────────────────────────────────────

            /// Resolves the caller to a stored user.
            $($async_kw)? fn authenticate(&self, caller: Option<&UserId>) -> Result<User> {
                let id = caller.ok_or(HomebookError::Unauthenticated)?;
                self.storage
                    .user(id)
                    $( .$await_ext )?
                    ?
                    .ok_or(HomebookError::Unauthenticated)
            }

            /// Joins a reservation with its listing and requester, or
            /// returns `None` if either can no longer be read.
            $($async_kw)? fn join(&self, reservation: Reservation) -> Result<Option<BookedReservation>> {
                let Some(listing) = self.storage.listing(&reservation.listing) $( .$await_ext )? ? else {
                    tracing::warn!(
                        reservation = %reservation.id,
                        listing = %reservation.listing,
                        "reservation references a missing listing"
                    );
                    return Ok(None);
                };
                let Some(requester) = self.storage.user(&reservation.requester) $( .$await_ext )? ? else {
                    tracing::warn!(
                        reservation = %reservation.id,
                        requester = %reservation.requester,
                        "reservation references a missing user"
                    );
                    return Ok(None);
                };
                Ok(Some(BookedReservation {
                    reservation,
                    listing,
                    requester,
                }))
            }
        }
    };
}

// ── Async variant ───────────────────────────────────────────────────────

#[cfg(feature = "async")]
mod async_marketplace {
    //! Async marketplace service.

    use std::collections::HashSet;

    use chrono::Utc;

    use crate::availability::exclude_reserved;
    use crate::error::{HomebookError, Result};
    use crate::models::{
        BookedReservation, Listing, ListingId, NewListing, Reservation, Role, User, UserId,
    };
    use crate::storage::{ReserveOutcome, Storage};

    use super::{BookingRequest, DEFAULT_BROWSE_LIMIT, ListingFilter, validate_user};

    define_marketplace! {
        service_name: Marketplace,
        builder_name: MarketplaceBuilder,
        storage_trait: Storage,
        service_doc: "Async property marketplace backed by a [`Storage`] backend.\n\nUse [`Marketplace::builder()`] to construct an instance.",
        builder_doc: "Builder for constructing a [`Marketplace`].",
        async_kw: async,
        await_kw: await,
    }
}

// ── Blocking variant ────────────────────────────────────────────────────

#[cfg(feature = "blocking")]
mod blocking_marketplace {
    //! Blocking marketplace service.

    use std::collections::HashSet;

    use chrono::Utc;

    use crate::availability::exclude_reserved;
    use crate::error::{HomebookError, Result};
    use crate::models::{
        BookedReservation, Listing, ListingId, NewListing, Reservation, Role, User, UserId,
    };
    use crate::storage::{BlockingStorage, ReserveOutcome};

    use super::{BookingRequest, DEFAULT_BROWSE_LIMIT, ListingFilter, validate_user};

    define_marketplace! {
        service_name: MarketplaceBlocking,
        builder_name: MarketplaceBlockingBuilder,
        storage_trait: BlockingStorage,
        service_doc: "Blocking property marketplace backed by a [`BlockingStorage`] backend.\n\nUse [`MarketplaceBlocking::builder()`] to construct an instance.",
        builder_doc: "Builder for constructing a [`MarketplaceBlocking`].",
    }
}

#[cfg(feature = "async")]
pub use async_marketplace::{Marketplace, MarketplaceBuilder};
#[cfg(feature = "blocking")]
pub use blocking_marketplace::{MarketplaceBlocking, MarketplaceBlockingBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewListing, ReservationStatus, Role};
    use crate::storage::InMemoryStorage;
    use chrono::DateTime;

    /// Creates a listing for filter tests.
    fn test_listing(location: &str, category: Category, price: f64) -> Listing {
        Listing {
            id: ListingId::generate(),
            title: "Test".to_owned(),
            description: String::new(),
            price,
            location: location.to_owned(),
            category,
            image: None,
            owner: UserId::new("s-1".to_owned()),
            created: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    /// Creates a user with the given role.
    fn test_user(id: &str, role: Role) -> User {
        User {
            id: UserId::new(id.to_owned()),
            username: format!("user-{id}"),
            email: format!("{id}@example.com"),
            password_hash: "hash".to_owned(),
            role,
            listings: Vec::new(),
        }
    }

    /// Seller `s-1`, buyers `b-1`/`b-2`.
    fn test_users() -> Vec<User> {
        vec![
            test_user("s-1", Role::Seller),
            test_user("s-2", Role::Seller),
            test_user("b-1", Role::Buyer),
            test_user("b-2", Role::Buyer),
        ]
    }

    /// A listing request priced at 100000 in location "X".
    fn new_listing(title: &str) -> NewListing {
        NewListing {
            title: title.to_owned(),
            description: "Three bedrooms".to_owned(),
            price: 100_000.0,
            location: "X".to_owned(),
            category: Category::House,
            image: None,
        }
    }

    fn uid(id: &str) -> UserId {
        UserId::new(id.to_owned())
    }

    #[test]
    fn filter_default_matches_all() {
        let listing = test_listing("X", Category::House, 1.0);
        assert!(ListingFilter::new().matches(&listing));
    }

    #[test]
    fn filter_location_is_exact() {
        let filter = ListingFilter::new().location("Porto");
        assert!(filter.matches(&test_listing("Porto", Category::House, 1.0)));
        assert!(!filter.matches(&test_listing("porto", Category::House, 1.0)));
        assert!(!filter.matches(&test_listing("Porto Norte", Category::House, 1.0)));
    }

    #[test]
    fn filter_price_range_is_closed() {
        let filter = ListingFilter::new().price_range(100.0, 200.0);
        assert!(filter.matches(&test_listing("X", Category::House, 100.0)));
        assert!(filter.matches(&test_listing("X", Category::House, 200.0)));
        assert!(!filter.matches(&test_listing("X", Category::House, 99.0)));
        assert!(!filter.matches(&test_listing("X", Category::House, 201.0)));
    }

    #[test]
    fn filter_combines_criteria() {
        let filter = ListingFilter::new()
            .category(Category::Condo)
            .min_price(50.0)
            .owner(uid("s-1"));
        assert!(filter.matches(&test_listing("X", Category::Condo, 60.0)));
        assert!(!filter.matches(&test_listing("X", Category::Villa, 60.0)));
        assert!(!filter.matches(&test_listing("X", Category::Condo, 40.0)));
        let mut foreign = test_listing("X", Category::Condo, 60.0);
        foreign.owner = uid("s-2");
        assert!(!filter.matches(&foreign));
    }

    #[test]
    fn filter_validate_rejects_bad_price_bounds() {
        assert!(ListingFilter::new().price_range(100.0, 100.0).validate().is_ok());
        assert!(ListingFilter::new().min_price(5.0).validate().is_ok());
        assert!(matches!(
            ListingFilter::new().price_range(200.0, 100.0).validate(),
            Err(HomebookError::Validation(_))
        ));
        assert!(matches!(
            ListingFilter::new().min_price(f64::NAN).validate(),
            Err(HomebookError::Validation(_))
        ));
        assert!(matches!(
            ListingFilter::new().max_price(f64::NAN).validate(),
            Err(HomebookError::Validation(_))
        ));
    }

    #[test]
    fn validate_user_rejects_bad_email() {
        let mut user = test_user("u-1", Role::Buyer);
        user.email = "nope".to_owned();
        assert!(matches!(
            validate_user(&user),
            Err(HomebookError::Validation(_))
        ));
    }

    #[cfg(feature = "blocking")]
    mod blocking {
        use super::*;
        use crate::storage::BlockingStorage;

        fn marketplace() -> MarketplaceBlocking<InMemoryStorage> {
            let market = MarketplaceBlocking::builder()
                .storage(InMemoryStorage::new())
                .build()
                .unwrap();
            let _count = market.import_users(test_users()).unwrap();
            market
        }

        #[test]
        fn builder_requires_storage() {
            let result = MarketplaceBlocking::<InMemoryStorage>::builder().build();
            assert!(matches!(result, Err(HomebookError::Storage(_))));
        }

        #[test]
        fn builder_rejects_zero_browse_limit() {
            let result = MarketplaceBlocking::builder()
                .storage(InMemoryStorage::new())
                .browse_limit(0)
                .build();
            assert!(matches!(result, Err(HomebookError::Validation(_))));
        }

        #[test]
        fn second_booking_is_already_booked() {
            let market = marketplace();
            let listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L1"))
                .unwrap();

            let booked = market
                .book_listing(&BookingRequest::new(listing.id.clone(), Some(uid("b-1"))))
                .unwrap();
            assert_eq!(booked.reservation.status, ReservationStatus::Confirmed);
            assert_eq!(booked.listing.id, listing.id);
            assert_eq!(booked.requester.id, uid("b-1"));

            let err = market
                .book_listing(&BookingRequest::new(listing.id.clone(), Some(uid("b-2"))))
                .unwrap_err();
            assert!(matches!(err, HomebookError::AlreadyBooked(id) if id == listing.id));
        }

        #[test]
        fn booking_missing_listing_is_not_found() {
            let market = marketplace();
            let err = market
                .book_listing(&BookingRequest::new(
                    ListingId::new("missing".to_owned()),
                    Some(uid("b-1")),
                ))
                .unwrap_err();
            assert!(matches!(err, HomebookError::NotFound { entity: "listing", .. }));
        }

        #[test]
        fn anonymous_booking_creates_nothing() {
            let market = marketplace();
            let listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L1"))
                .unwrap();
            let err = market
                .book_listing(&BookingRequest::new(listing.id, None))
                .unwrap_err();
            assert!(matches!(err, HomebookError::Unauthenticated));
            assert!(market.storage().reservations().unwrap().is_empty());
        }

        #[test]
        fn unknown_caller_is_unauthenticated() {
            let market = marketplace();
            let listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L1"))
                .unwrap();
            let err = market
                .book_listing(&BookingRequest::new(listing.id, Some(uid("ghost"))))
                .unwrap_err();
            assert!(matches!(err, HomebookError::Unauthenticated));
        }

        #[test]
        fn concurrent_bookings_have_one_winner() {
            use std::sync::Arc;
            use std::thread;

            let market = Arc::new(marketplace());
            let buyers: Vec<User> = (0..32)
                .map(|idx: i32| test_user(&format!("c-{idx}"), Role::Buyer))
                .collect();
            let _count = market.import_users(buyers.clone()).unwrap();
            let listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L2"))
                .unwrap();

            let handles: Vec<_> = buyers
                .into_iter()
                .map(|buyer| {
                    let market = Arc::clone(&market);
                    let request = BookingRequest::new(listing.id.clone(), Some(buyer.id));
                    thread::spawn(move || market.book_listing(&request))
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let winners = results.iter().filter(|r| r.is_ok()).count();
            let rejected = results
                .iter()
                .filter(|r| matches!(r, Err(HomebookError::AlreadyBooked(_))))
                .count();
            assert_eq!(winners, 1);
            assert_eq!(rejected, 31);

            let ledger = market.storage().reservations().unwrap();
            assert_eq!(ledger.len(), 1);
            assert_eq!(ledger[0].listing, listing.id);
        }

        #[test]
        fn browse_hides_booked_listings() {
            let market = marketplace();
            let first = market
                .create_listing(Some(&uid("s-1")), new_listing("first"))
                .unwrap();
            let second = market
                .create_listing(Some(&uid("s-1")), new_listing("second"))
                .unwrap();
            let _booked = market
                .book_listing(&BookingRequest::new(first.id.clone(), Some(uid("b-1"))))
                .unwrap();

            let visible = market.browse(&ListingFilter::new()).unwrap();
            let ids: Vec<ListingId> = visible.into_iter().map(|l| l.id).collect();
            assert_eq!(ids, [second.id]);
            assert!(market.listing(&first.id).is_ok());
        }

        #[test]
        fn browse_honours_limit() {
            let market = MarketplaceBlocking::builder()
                .storage(InMemoryStorage::new())
                .browse_limit(2)
                .build()
                .unwrap();
            let _count = market.import_users(test_users()).unwrap();
            for title in ["a", "b", "c"] {
                let _listing = market
                    .create_listing(Some(&uid("s-1")), new_listing(title))
                    .unwrap();
            }
            assert_eq!(market.browse(&ListingFilter::new()).unwrap().len(), 2);
        }

        #[test]
        fn browse_rejects_reversed_price_range() {
            let market = marketplace();
            let _listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L1"))
                .unwrap();
            let err = market
                .browse(&ListingFilter::new().price_range(200_000.0, 50_000.0))
                .unwrap_err();
            assert!(matches!(err, HomebookError::Validation(_)));
        }

        #[test]
        fn browse_applies_filter() {
            let market = marketplace();
            let mut villa = new_listing("villa");
            villa.category = Category::Villa;
            villa.location = "Y".to_owned();
            let villa = market.create_listing(Some(&uid("s-1")), villa).unwrap();
            let _house = market
                .create_listing(Some(&uid("s-1")), new_listing("house"))
                .unwrap();

            let found = market
                .browse(&ListingFilter::new().location("Y").category(Category::Villa))
                .unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].id, villa.id);
        }

        #[test]
        fn buyer_cannot_create_listing() {
            let market = marketplace();
            let err = market
                .create_listing(Some(&uid("b-1")), new_listing("nope"))
                .unwrap_err();
            assert!(matches!(err, HomebookError::Forbidden(_)));
        }

        #[test]
        fn anonymous_cannot_create_listing() {
            let market = marketplace();
            let err = market.create_listing(None, new_listing("nope")).unwrap_err();
            assert!(matches!(err, HomebookError::Unauthenticated));
        }

        #[test]
        fn negative_price_is_rejected() {
            let market = marketplace();
            let mut bad = new_listing("bad");
            bad.price = -5.0;
            let err = market.create_listing(Some(&uid("s-1")), bad).unwrap_err();
            assert!(matches!(err, HomebookError::Validation(_)));
            assert!(market.storage().listings().unwrap().is_empty());
        }

        #[test]
        fn created_listing_is_linked_to_seller() {
            let market = marketplace();
            let listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L1"))
                .unwrap();
            let seller = market.user(&uid("s-1")).unwrap();
            assert_eq!(seller.listings, [listing.id]);
        }

        #[test]
        fn non_owner_delete_is_forbidden_and_keeps_listing() {
            let market = marketplace();
            let listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L1"))
                .unwrap();
            let err = market
                .delete_listing(&listing.id, Some(&uid("s-2")))
                .unwrap_err();
            assert!(matches!(err, HomebookError::Forbidden(_)));
            assert_eq!(market.listing(&listing.id).unwrap(), listing);
        }

        #[test]
        fn owner_delete_removes_listing() {
            let market = marketplace();
            let listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L1"))
                .unwrap();
            market.delete_listing(&listing.id, Some(&uid("s-1"))).unwrap();
            let err = market.listing(&listing.id).unwrap_err();
            assert!(matches!(err, HomebookError::NotFound { .. }));
        }

        #[test]
        fn booked_listing_cannot_be_deleted() {
            let market = marketplace();
            let listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L1"))
                .unwrap();
            let _booked = market
                .book_listing(&BookingRequest::new(listing.id.clone(), Some(uid("b-1"))))
                .unwrap();
            let err = market
                .delete_listing(&listing.id, Some(&uid("s-1")))
                .unwrap_err();
            assert!(matches!(err, HomebookError::Forbidden(_)));
        }

        #[test]
        fn booked_and_sold_views() {
            let market = marketplace();
            let mine = market
                .create_listing(Some(&uid("s-1")), new_listing("mine"))
                .unwrap();
            let theirs = market
                .create_listing(Some(&uid("s-2")), new_listing("theirs"))
                .unwrap();
            let _first = market
                .book_listing(&BookingRequest::new(mine.id.clone(), Some(uid("b-1"))))
                .unwrap();
            let _second = market
                .book_listing(&BookingRequest::new(theirs.id.clone(), Some(uid("b-1"))))
                .unwrap();

            let booked = market.booked_listings(Some(&uid("b-1"))).unwrap();
            assert_eq!(booked.len(), 2);
            assert!(market.booked_listings(Some(&uid("b-2"))).unwrap().is_empty());

            let sold = market.sold_listings(Some(&uid("s-1"))).unwrap();
            assert_eq!(sold.len(), 1);
            assert_eq!(sold[0].listing.id, mine.id);
            assert_eq!(sold[0].requester.id, uid("b-1"));

            assert!(market.seller_listings(&uid("s-1")).unwrap().is_empty());
            assert!(matches!(
                market.booked_listings(None),
                Err(HomebookError::Unauthenticated)
            ));
        }

        #[test]
        fn import_users_rejects_duplicates() {
            let market = marketplace();
            let err = market
                .import_users(vec![test_user("s-1", Role::Seller)])
                .unwrap_err();
            assert!(matches!(err, HomebookError::Validation(_)));
            assert_eq!(market.users().unwrap().len(), 4);
        }

        #[test]
        fn missing_user_is_not_found() {
            let market = marketplace();
            let err = market.user(&uid("ghost")).unwrap_err();
            assert!(matches!(err, HomebookError::NotFound { entity: "user", .. }));
        }
    }

    #[cfg(feature = "async")]
    mod async_tests {
        use super::*;
        use crate::storage::Storage;

        async fn marketplace() -> Marketplace<InMemoryStorage> {
            let market = Marketplace::builder()
                .storage(InMemoryStorage::new())
                .build()
                .unwrap();
            let _count = market.import_users(test_users()).await.unwrap();
            market
        }

        #[tokio::test]
        async fn book_then_reject() {
            let market = marketplace().await;
            let listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L1"))
                .await
                .unwrap();
            let _booked = market
                .book_listing(&BookingRequest::new(listing.id.clone(), Some(uid("b-1"))))
                .await
                .unwrap();
            let err = market
                .book_listing(&BookingRequest::new(listing.id, Some(uid("b-2"))))
                .await
                .unwrap_err();
            assert!(matches!(err, HomebookError::AlreadyBooked(_)));
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn concurrent_tasks_have_one_winner() {
            use std::sync::Arc;

            let market = Arc::new(marketplace().await);
            let buyers: Vec<User> = (0..16)
                .map(|idx: i32| test_user(&format!("t-{idx}"), Role::Buyer))
                .collect();
            let _count = market.import_users(buyers.clone()).await.unwrap();
            let listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L2"))
                .await
                .unwrap();

            let handles: Vec<_> = buyers
                .into_iter()
                .map(|buyer| {
                    let market = Arc::clone(&market);
                    let request = BookingRequest::new(listing.id.clone(), Some(buyer.id));
                    tokio::spawn(async move { market.book_listing(&request).await })
                })
                .collect();

            let mut winners = 0_usize;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => winners += 1,
                    Err(HomebookError::AlreadyBooked(_)) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            assert_eq!(winners, 1);
            assert_eq!(market.storage().reservations().await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn active_reservation_is_stable_between_reads() {
            let market = marketplace().await;
            let listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L1"))
                .await
                .unwrap();
            let _booked = market
                .book_listing(&BookingRequest::new(listing.id.clone(), Some(uid("b-1"))))
                .await
                .unwrap();
            let first = market.storage().active_reservation(&listing.id).await.unwrap();
            let second = market.storage().active_reservation(&listing.id).await.unwrap();
            assert!(first.is_some());
            assert_eq!(first, second);
        }

        #[tokio::test]
        async fn browse_excludes_booked() {
            let market = marketplace().await;
            let listing = market
                .create_listing(Some(&uid("s-1")), new_listing("L1"))
                .await
                .unwrap();
            assert_eq!(market.browse(&ListingFilter::new()).await.unwrap().len(), 1);
            let _booked = market
                .book_listing(&BookingRequest::new(listing.id, Some(uid("b-1"))))
                .await
                .unwrap();
            assert!(market.browse(&ListingFilter::new()).await.unwrap().is_empty());
        }
    }
}
