//! Core domain types for gigboard
//!
//! These types are the explicit record shapes stored as documents in the
//! remote gateway. The gateway itself is schema-less; every record is
//! serialized to a JSON object with snake_case fields and keyed by an opaque
//! string identifier assigned by the gateway on creation (accounts are the
//! exception and are keyed by the auth subject identifier).
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Account** | A registered person; either a customer or a provider |
//! | **ServiceListing** | A service a provider offers for booking |
//! | **Booking** | A scheduled engagement of a listing by a customer |
//! | **Conversation** | The single message thread between two accounts |
//! | **Message** | One message inside a conversation |
//! | **Review** | A customer's rating of a completed booking |
//!
//! Patch types (`ListingPatch`, `BookingPatch`, `ProfilePatch`) define the
//! exact optional-field set a partial update may write; fields absent from a
//! patch are never sent to the gateway, so a shallow merge can only touch the
//! keys the caller supplied. Derived listing aggregates (`rating`,
//! `review_count`) have no patch fields at all and therefore cannot be set by
//! an edit.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Account
// ============================================

/// Role of an account within the marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Provider,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Provider => "provider",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "provider" => Ok(Role::Provider),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// A registered account.
///
/// The identifier always equals the auth provider's subject identifier;
/// the record is written under that key rather than a gateway-assigned one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Auth subject identifier (primary key)
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Partial update for an account profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

// ============================================
// Service Listing
// ============================================

/// A service offered by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceListing {
    /// Gateway-assigned identifier
    pub id: String,
    /// Owning provider's account identifier
    pub provider_id: String,
    pub title: String,
    pub description: String,
    /// Category tag used for equality-filtered browsing
    pub category: String,
    /// Non-negative price
    pub price: f64,
    /// Retrievable blob URL; empty when no image was uploaded
    pub image_url: String,
    pub location: String,
    /// Aggregate rating (0-5), maintained externally
    pub rating: f64,
    /// Review count, maintained externally
    pub review_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListing {
    pub provider_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub location: String,
}

impl NewListing {
    pub fn validate(&self) -> Result<()> {
        if self.price < 0.0 {
            return Err(Error::Validation("price must be non-negative".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Partial update for a listing.
///
/// Has no `rating`/`review_count` fields: aggregates are maintained
/// externally and a listing edit cannot touch them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ListingPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(price) = self.price {
            if price < 0.0 {
                return Err(Error::Validation("price must be non-negative".to_string()));
            }
        }
        Ok(())
    }
}

// ============================================
// Booking
// ============================================

/// Booking lifecycle status.
///
/// Transitions are one-directional:
/// `pending -> confirmed -> completed`, with `cancelled` reachable from
/// `pending` or `confirmed`. `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is allowed out of this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Whether the transition table allows `self -> next`
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(format!("unknown booking status: {}", s)),
        }
    }
}

/// Payment status of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// Scheduled date and time window of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(Error::Validation(
                "time window start must be before end".to_string(),
            ));
        }
        Ok(())
    }
}

/// A scheduled engagement of a service listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Gateway-assigned identifier
    pub id: String,
    pub service_id: String,
    pub customer_id: String,
    pub provider_id: String,
    pub window: TimeWindow,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: f64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub service_id: String,
    pub customer_id: String,
    pub provider_id: String,
    pub window: TimeWindow,
    /// Caller-supplied initial status, normally `pending`
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: f64,
    pub note: Option<String>,
}

impl NewBooking {
    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        if self.total_amount < 0.0 {
            return Err(Error::Validation(
                "total amount must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update for a booking.
///
/// A supplied `status` is checked against the transition table before
/// dispatch; patches never bypass the booking state machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<TimeWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ============================================
// Conversation & Message
// ============================================

/// The single message thread between two accounts.
///
/// At most one conversation may exist per unordered participant pair. The
/// canonical `participant_key` makes the pair addressable as one string so a
/// storage-level uniqueness constraint can attach to it; the client itself
/// enforces uniqueness only by lookup-before-create, which is not atomic
/// against the gateway (concurrent creates from both participants can race).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Gateway-assigned identifier
    pub id: String,
    /// Unordered participant pair
    pub participants: [String; 2],
    /// Canonical `min|max` join of the participant pair
    pub participant_key: String,
    /// Preview text of the most recent message; empty until the first send
    pub last_message: String,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Messages sent since the receiver last marked the conversation read
    pub unread_count: i64,
}

/// Canonical key for an unordered participant pair
pub fn participant_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}|{}", a, b)
    } else {
        format!("{}|{}", b, a)
    }
}

/// One message inside a conversation.
///
/// Created on send, mutated only to flip `read`, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Gateway-assigned identifier
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub read: bool,
}

// ============================================
// Review
// ============================================

/// A customer's rating of a booked service.
///
/// Creating a review does not touch the listing's `rating`/`review_count`;
/// those aggregates are maintained externally by the gateway platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Gateway-assigned identifier
    pub id: String,
    pub service_id: String,
    pub booking_id: String,
    pub customer_id: String,
    pub provider_id: String,
    /// Rating in 0-5
    pub rating: f64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
    pub service_id: String,
    pub booking_id: String,
    pub customer_id: String,
    pub provider_id: String,
    pub rating: f64,
    pub comment: String,
}

impl NewReview {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(Error::Validation(
                "rating must be between 0 and 5".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================
// Uploads
// ============================================

/// An image file handed to a create/update operation for blob upload
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_transition_table() {
        use BookingStatus::*;

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));

        // No backwards or out-of-terminal moves
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));

        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Confirmed.is_terminal());
    }

    #[test]
    fn test_participant_key_is_order_independent() {
        assert_eq!(participant_key("alice", "bob"), participant_key("bob", "alice"));
        assert_eq!(participant_key("alice", "bob"), "alice|bob");
    }

    #[test]
    fn test_time_window_validation() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let window = TimeWindow {
            date,
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        };
        assert!(window.validate().is_ok());

        let inverted = TimeWindow {
            date,
            start: window.end,
            end: window.start,
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_listing_patch_serializes_only_supplied_keys() {
        let patch = ListingPatch {
            price: Some(150.0),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["price"], 150.0);
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!("provider".parse::<Role>().unwrap(), Role::Provider);
        assert_eq!(Role::Customer.as_str(), "customer");
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_new_review_rating_bounds() {
        let mut review = NewReview {
            service_id: "s1".into(),
            booking_id: "b1".into(),
            customer_id: "c1".into(),
            provider_id: "p1".into(),
            rating: 4.5,
            comment: "great".into(),
        };
        assert!(review.validate().is_ok());
        review.rating = 5.5;
        assert!(review.validate().is_err());
    }
}
