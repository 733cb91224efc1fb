//! Pluggable storage backends for listings, users and reservations.
//!
//! This module defines the [`Storage`] (async) and [`BlockingStorage`]
//! (blocking) traits via a shared macro, mirroring the marketplace
//! generation pattern in [`crate::marketplace`].
//!
//! Every method is a single indivisible operation against the backend.
//! In particular [`BlockingStorage::reserve`] / [`Storage::reserve`] is the
//! conditional insert that keeps at most one confirmed reservation per
//! listing: the "is this listing free" check and the write happen under
//! the same lock.

#[cfg(feature = "storage-file")]
mod file;
mod memory;
mod rules;

#[cfg(feature = "storage-file")]
pub use file::FileStorage;
pub use memory::InMemoryStorage;

use crate::models::{Reservation, ReservationId};

/// Result of the ledger's conditional insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// The reservation was stored.
    Reserved(Reservation),
    /// An active reservation already exists for the listing; nothing
    /// was written.
    AlreadyReserved(ReservationId),
    /// The listing no longer exists; nothing was written.
    ListingMissing,
}

/// Generates a storage trait (async or blocking) with all entity methods.
///
/// Uses `@methods` to define the method list once, and `@method` to render
/// each method in async (`impl Future + Send`) or blocking (`fn`) style.
macro_rules! define_storage {
    // ── Entry points ────────────────────────────────────────────────
    (
        trait_name: $trait_name:ident,
        trait_doc: $trait_doc:expr,
        mode: async_mode,
    ) => {
        #[doc = $trait_doc]
        pub trait $trait_name: core::fmt::Debug + Send + Sync {
            define_storage!(@methods async_mode);
        }
    };
    (
        trait_name: $trait_name:ident,
        trait_doc: $trait_doc:expr,
        mode: blocking,
    ) => {
        #[doc = $trait_doc]
        pub trait $trait_name: core::fmt::Debug + Send + Sync {
            define_storage!(@methods blocking);
        }
    };

    // ── Single method list (shared between both variants) ───────────
    (@methods $mode:ident) => {
        // Listing store
        define_storage!(@method $mode, listings,
            "Returns all stored listings, oldest first.\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            -> Result<Vec<Listing>>);
        define_storage!(@method $mode, listing,
            "Returns the listing with the given ID, or `Ok(None)` if absent.\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            id: &ListingId, -> Result<Option<Listing>>);
        define_storage!(@method $mode, find_listings,
            "Returns the listings matching every criterion of `filter`, oldest first.\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            filter: &ListingFilter, -> Result<Vec<Listing>>);
        define_storage!(@method $mode, insert_listing,
            "Stores a new listing and records it in its owner's listing list.\n\n# Errors\n\nReturns [`HomebookError::Validation`] if a listing with the same ID exists, or a storage error if the write fails.",
            listing: Listing, -> Result<()>);
        define_storage!(@method $mode, delete_listing,
            "Deletes a listing on behalf of `caller`.\n\nExistence, ownership and the absence of an active reservation are checked in the same critical section as the removal.\n\n# Errors\n\nReturns [`HomebookError::NotFound`] if the listing is absent, [`HomebookError::Forbidden`] if `caller` is not the owner or the listing is reserved, or a storage error if the write fails.",
            id: &ListingId, caller: &UserId, -> Result<()>);

        // Users
        define_storage!(@method $mode, users,
            "Returns all stored users.\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            -> Result<Vec<User>>);
        define_storage!(@method $mode, user,
            "Returns the user with the given ID, or `Ok(None)` if absent.\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            id: &UserId, -> Result<Option<User>>);
        define_storage!(@method $mode, insert_users,
            "Inserts users, all or nothing.\n\n# Errors\n\nReturns [`HomebookError::Validation`] if any ID, username or email collides with a stored user or another incoming one, or a storage error if the write fails.",
            items: Vec<User>, -> Result<()>);

        // Reservation ledger
        define_storage!(@method $mode, reserve,
            "Atomically stores `reservation` only if its listing exists and has no active reservation.\n\n# Errors\n\nReturns an error only if the storage backend fails; a lost race is reported through [`ReserveOutcome`].",
            reservation: Reservation, -> Result<ReserveOutcome>);
        define_storage!(@method $mode, active_reservation,
            "Returns the active reservation for a listing, if any.\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            listing: &ListingId, -> Result<Option<Reservation>>);
        define_storage!(@method $mode, reservations_by_requester,
            "Returns all reservations made by `requester`, oldest first.\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            requester: &UserId, -> Result<Vec<Reservation>>);
        define_storage!(@method $mode, active_listing_ids,
            "Returns the IDs of all listings with an active reservation.\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            -> Result<HashSet<ListingId>>);
        define_storage!(@method $mode, reservations,
            "Returns all stored reservations, oldest first.\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            -> Result<Vec<Reservation>>);

        // Clear
        define_storage!(@method $mode, clear,
            "Removes all stored data.\n\n# Errors\n\nReturns an error if the storage backend fails to write.",
            -> Result<()>);
    };

    // ── Blocking method renderer ────────────────────────────────────
    (@method blocking, $name:ident, $doc:expr,
     $($param:ident: $param_ty:ty,)* -> $ret:ty) => {
        #[doc = $doc]
        fn $name(&self $(, $param: $param_ty)*) -> $ret;
    };

    // ── Async method renderer (returns impl Future + Send) ──────────
    (@method async_mode, $name:ident, $doc:expr,
     $($param:ident: $param_ty:ty,)* -> $ret:ty) => {
        #[doc = $doc]
        fn $name(&self $(, $param: $param_ty)*)
            -> impl core::future::Future<Output = $ret> + Send;
    };
}

#[cfg(feature = "async")]
mod async_storage {
    //! Async storage trait definition.

    use std::collections::HashSet;

    #[allow(unused_imports, reason = "referenced from generated rustdoc links")]
    use crate::error::HomebookError;
    use crate::error::Result;
    use crate::marketplace::ListingFilter;
    use crate::models::{Listing, ListingId, Reservation, User, UserId};

    use super::ReserveOutcome;

    define_storage! {
        trait_name: Storage,
        trait_doc: "Async storage backend for marketplace data.\n\nAll methods take `&self`; implementations use interior mutability\n(e.g. `Mutex`) for thread-safe mutation.",
        mode: async_mode,
    }
}

#[cfg(feature = "blocking")]
mod blocking_storage {
    //! Blocking storage trait definition.

    use std::collections::HashSet;

    #[allow(unused_imports, reason = "referenced from generated rustdoc links")]
    use crate::error::HomebookError;
    use crate::error::Result;
    use crate::marketplace::ListingFilter;
    use crate::models::{Listing, ListingId, Reservation, User, UserId};

    use super::ReserveOutcome;

    define_storage! {
        trait_name: BlockingStorage,
        trait_doc: "Blocking storage backend for marketplace data.\n\nAll methods take `&self`; implementations use interior mutability\n(e.g. `Mutex`) for thread-safe mutation.",
        mode: blocking,
    }
}

#[cfg(feature = "async")]
pub use async_storage::Storage;
#[cfg(feature = "blocking")]
pub use blocking_storage::BlockingStorage;
