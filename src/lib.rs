//! Core of a property listing marketplace.
//!
//! Sellers publish listings, buyers browse the ones still available and
//! book them. A listing can be booked at most once, no matter how many
//! buyers race for it: the claim is a single conditional insert inside
//! the storage backend.
//!
//! The entry points are [`marketplace::MarketplaceBlocking`] and
//! [`marketplace::Marketplace`], built over any
//! [`storage::BlockingStorage`] / [`storage::Storage`] backend such as
//! [`storage::InMemoryStorage`] or the JSON-file `FileStorage`.

pub mod availability;
pub mod error;
pub mod marketplace;
pub mod models;
pub mod storage;
