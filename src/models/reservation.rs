//! Reservation (booking) model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Listing, ListingId, ReservationId, ReservationStatus, User, UserId};

/// A record binding a buyer to a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique identifier.
    pub id: ReservationId,
    /// Reserved listing.
    pub listing: ListingId,
    /// User who made the booking.
    pub requester: UserId,
    /// Calendar date of the booking.
    pub booking_date: NaiveDate,
    /// Lifecycle state.
    pub status: ReservationStatus,
    /// Creation timestamp (Unix seconds).
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
}

impl Reservation {
    /// Creates a confirmed reservation for `listing` by `requester`.
    #[inline]
    #[must_use]
    pub fn confirmed(listing: ListingId, requester: UserId, created: DateTime<Utc>) -> Self {
        Self {
            id: ReservationId::generate(),
            listing,
            requester,
            booking_date: created.date_naive(),
            status: ReservationStatus::Confirmed,
            created,
        }
    }

    /// Returns `true` if the reservation blocks further bookings.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }
}

/// A reservation joined with its listing and requester.
#[derive(Debug, Clone, PartialEq)]
pub struct BookedReservation {
    /// The reservation record.
    pub reservation: Reservation,
    /// The reserved listing.
    pub listing: Listing,
    /// The user who booked it.
    pub requester: User,
}
