//! Enumeration types for constrained values.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of property a listing offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Detached house.
    House,
    /// Apartment in a multi-unit building.
    Apartment,
    /// Villa.
    Villa,
    /// Condominium unit.
    Condo,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Self; 4] = [Self::House, Self::Apartment, Self::Villa, Self::Condo];

    /// Returns the canonical name of the category.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::House => "House",
            Self::Apartment => "Apartment",
            Self::Villa => "Villa",
            Self::Condo => "Condo",
        }
    }
}

impl fmt::Display for Category {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Parses a category name, ignoring ASCII case.
    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// Lifecycle state of a reservation.
///
/// Only [`ReservationStatus::Confirmed`] is ever written; the other
/// states exist for stored data and future transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReservationStatus {
    /// Requested but not yet confirmed.
    Pending,
    /// Confirmed; blocks further bookings of the same listing.
    Confirmed,
    /// Cancelled.
    Cancelled,
}

/// Role a user acts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Browses and books listings.
    Buyer,
    /// Creates and owns listings.
    Seller,
}

impl Role {
    /// Returns the canonical name of the role.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buyer => "Buyer",
            Self::Seller => "Seller",
        }
    }
}

impl fmt::Display for Role {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serde_uses_canonical_names() {
        let json = serde_json::to_string(&Category::Apartment).unwrap();
        assert_eq!(json, r#""Apartment""#);
        let deserialized: Category = serde_json::from_str(r#""Condo""#).unwrap();
        assert_eq!(deserialized, Category::Condo);
    }

    #[test]
    fn category_from_str_ignores_case() {
        assert_eq!("villa".parse::<Category>(), Ok(Category::Villa));
        assert_eq!(" HOUSE ".parse::<Category>(), Ok(Category::House));
        assert!("castle".parse::<Category>().is_err());
    }

    #[test]
    fn category_display_matches_as_str() {
        for category in Category::ALL {
            assert_eq!(category.to_string(), category.as_str());
        }
    }

    #[test]
    fn reservation_status_serde() {
        let variants = [
            (ReservationStatus::Pending, r#""pending""#),
            (ReservationStatus::Confirmed, r#""confirmed""#),
            (ReservationStatus::Cancelled, r#""cancelled""#),
        ];
        for (variant, expected_json) in variants {
            let json = serde_json::to_string(&variant).unwrap();
            assert_eq!(json, expected_json);
            let deserialized: ReservationStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(deserialized, variant);
        }
    }

    #[test]
    fn role_serde() {
        let role: Role = serde_json::from_str(r#""Seller""#).unwrap();
        assert_eq!(role, Role::Seller);
        assert!(serde_json::from_str::<Role>(r#""Admin""#).is_err());
    }

    #[test]
    fn role_display_matches_serde_name() {
        for role in [Role::Buyer, Role::Seller] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{role}\""));
        }
    }
}
