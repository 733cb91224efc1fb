//! Data models for marketplace entities.
//!
//! This module contains strongly-typed representations of listings,
//! reservations and users, newtype ID wrappers, and enumeration types
//! for constrained values.

mod enums;
mod ids;
mod listing;
mod reservation;
mod user;

pub use chrono::NaiveDate;
pub use enums::{Category, ReservationStatus, Role};
pub use ids::{ListingId, ReservationId, UserId};
pub use listing::{Listing, NewListing};
pub use reservation::{BookedReservation, Reservation};
pub use user::User;
