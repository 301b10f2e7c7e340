//! Bookings container: scheduling and the booking state machine.
//!
//! `update` and `cancel` are read-modify-write operations guarded by the
//! transition table on [`BookingStatus`]: a terminal booking rejects every
//! further change, and a patched status must be a legal successor of the
//! current one.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::gateway::{
    collections::BOOKINGS, from_document, to_fields, DocumentStore, Gateway, Query,
};
use crate::types::{Booking, BookingPatch, BookingStatus, NewBooking};

use super::slice::{Slice, SliceState};

/// Intents the dispatch channel routes to this container
#[derive(Debug, Clone)]
pub enum BookingsIntent {
    ListForCustomer(String),
    ListForProvider(String),
    GetById(String),
    Create(NewBooking),
    Update { id: String, patch: BookingPatch },
    Cancel(String),
}

pub struct BookingsContainer {
    gateway: Arc<dyn Gateway>,
    slice: Slice<Booking>,
}

impl BookingsContainer {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            slice: Slice::new(),
        }
    }

    /// Snapshot of the booking slice
    pub fn state(&self) -> SliceState<Booking> {
        self.slice.snapshot()
    }

    pub async fn handle(&self, intent: BookingsIntent) {
        let result = match intent {
            BookingsIntent::ListForCustomer(id) => self.list_for_customer(&id).await.map(|_| ()),
            BookingsIntent::ListForProvider(id) => self.list_for_provider(&id).await.map(|_| ()),
            BookingsIntent::GetById(id) => self.get_by_id(&id).await.map(|_| ()),
            BookingsIntent::Create(booking) => self.create(booking).await.map(|_| ()),
            BookingsIntent::Update { id, patch } => self.update(&id, patch).await.map(|_| ()),
            BookingsIntent::Cancel(id) => self.cancel(&id).await.map(|_| ()),
        };

        if let Err(e) = result {
            tracing::debug!(error = %e, "bookings intent rejected");
        }
    }

    pub async fn list_for_customer(&self, customer_id: &str) -> Result<Vec<Booking>> {
        self.slice.begin();
        let result = self.fetch(Query::new().eq("customer_id", customer_id)).await;
        self.slice
            .settle(result, |state, items| state.items = items.clone())
    }

    pub async fn list_for_provider(&self, provider_id: &str) -> Result<Vec<Booking>> {
        self.slice.begin();
        let result = self.fetch(Query::new().eq("provider_id", provider_id)).await;
        self.slice
            .settle(result, |state, items| state.items = items.clone())
    }

    async fn fetch(&self, query: Query) -> Result<Vec<Booking>> {
        let docs = self.gateway.query(BOOKINGS, &query).await?;
        docs.iter().map(from_document).collect()
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Booking> {
        self.slice.begin();
        let result = self.read_booking(id).await;
        self.slice
            .settle(result, |state, booking| state.current = Some(booking.clone()))
    }

    async fn read_booking(&self, id: &str) -> Result<Booking> {
        match self.gateway.get(BOOKINGS, id).await? {
            Some(doc) => from_document(&doc),
            None => Err(Error::NotFound(format!("booking not found: {}", id))),
        }
    }

    /// Create a booking with the caller-supplied initial status (normally
    /// `pending`), stamping `created_at`.
    pub async fn create(&self, booking: NewBooking) -> Result<Booking> {
        self.slice.begin();
        let result = self.do_create(booking).await;
        self.slice.settle(result, |state, booking| {
            state.items.push(booking.clone());
            state.current = Some(booking.clone());
        })
    }

    async fn do_create(&self, booking: NewBooking) -> Result<Booking> {
        booking.validate()?;

        let mut record = Booking {
            id: String::new(),
            service_id: booking.service_id,
            customer_id: booking.customer_id,
            provider_id: booking.provider_id,
            window: booking.window,
            status: booking.status,
            payment_status: booking.payment_status,
            total_amount: booking.total_amount,
            note: booking.note,
            created_at: Utc::now(),
        };
        record.id = self.gateway.insert(BOOKINGS, to_fields(&record)?).await?;

        tracing::info!(booking_id = %record.id, status = record.status.as_str(), "booking created");
        Ok(record)
    }

    /// Guarded partial merge: rejects any change to a terminal booking, and
    /// rejects a status change the transition table forbids.
    pub async fn update(&self, id: &str, patch: BookingPatch) -> Result<Booking> {
        self.slice.begin();
        let result = self.do_update(id, patch).await;
        self.settle_updated(result)
    }

    async fn do_update(&self, id: &str, patch: BookingPatch) -> Result<Booking> {
        let current = self.read_booking(id).await?;
        let requested = patch.status.unwrap_or(current.status);
        check_transition(current.status, requested)?;

        if let Some(window) = &patch.window {
            window.validate()?;
        }

        self.gateway.update(BOOKINGS, id, to_fields(&patch)?).await?;
        self.read_booking(id).await
    }

    /// Constrained update that moves the booking to `cancelled`, rejecting
    /// the move when the current status is terminal.
    pub async fn cancel(&self, id: &str) -> Result<Booking> {
        self.slice.begin();
        let result = self.do_cancel(id).await;
        self.settle_updated(result)
    }

    async fn do_cancel(&self, id: &str) -> Result<Booking> {
        let current = self.read_booking(id).await?;
        check_transition(current.status, BookingStatus::Cancelled)?;

        let patch = BookingPatch {
            status: Some(BookingStatus::Cancelled),
            ..Default::default()
        };
        self.gateway.update(BOOKINGS, id, to_fields(&patch)?).await?;

        tracing::info!(booking_id = %id, "booking cancelled");
        self.read_booking(id).await
    }

    fn settle_updated(&self, result: Result<Booking>) -> Result<Booking> {
        self.slice.settle(result, |state, booking| {
            if let Some(existing) = state.items.iter_mut().find(|b| b.id == booking.id) {
                *existing = booking.clone();
            }
            state.current = Some(booking.clone());
        })
    }
}

/// Enforce the booking state machine for a requested status.
///
/// A no-op request (`requested == current`) is allowed so patches that do
/// not touch the status pass through; everything else must be a legal
/// transition out of a non-terminal status.
fn check_transition(current: BookingStatus, requested: BookingStatus) -> Result<()> {
    if current.is_terminal() {
        return Err(Error::InvalidTransition {
            current: current.as_str().to_string(),
            requested: requested.as_str().to_string(),
        });
    }
    if requested != current && !current.can_transition_to(requested) {
        return Err(Error::InvalidTransition {
            current: current.as_str().to_string(),
            requested: requested.as_str().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::InMemoryGateway;
    use crate::types::{PaymentStatus, TimeWindow};
    use chrono::{NaiveDate, NaiveTime};

    fn container() -> (Arc<InMemoryGateway>, BookingsContainer) {
        let gateway = Arc::new(InMemoryGateway::new());
        let container = BookingsContainer::new(gateway.clone());
        (gateway, container)
    }

    fn new_booking() -> NewBooking {
        NewBooking {
            service_id: "svc-1".to_string(),
            customer_id: "cust-1".to_string(),
            provider_id: "prov-1".to_string(),
            window: TimeWindow {
                date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            },
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total_amount: 200.0,
            note: Some("bring samples".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_stamps_created_at_and_returns_id() {
        let (_gateway, bookings) = container();
        let booking = bookings.create(new_booking()).await.unwrap();
        assert!(!booking.id.is_empty());
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(bookings.state().current.unwrap().id, booking.id);
    }

    #[tokio::test]
    async fn test_list_filters_by_party() {
        let (_gateway, bookings) = container();
        bookings.create(new_booking()).await.unwrap();
        let mut other = new_booking();
        other.customer_id = "cust-2".to_string();
        bookings.create(other).await.unwrap();

        let mine = bookings.list_for_customer("cust-1").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].customer_id, "cust-1");

        let for_provider = bookings.list_for_provider("prov-1").await.unwrap();
        assert_eq!(for_provider.len(), 2);
    }

    #[tokio::test]
    async fn test_update_follows_transition_table() {
        let (_gateway, bookings) = container();
        let booking = bookings.create(new_booking()).await.unwrap();

        let confirmed = bookings
            .update(
                &booking.id,
                BookingPatch {
                    status: Some(BookingStatus::Confirmed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        // pending -> completed is not in the table
        let fresh = bookings.create(new_booking()).await.unwrap();
        let err = bookings
            .update(
                &fresh.id,
                BookingPatch {
                    status: Some(BookingStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_update_without_status_keeps_current() {
        let (_gateway, bookings) = container();
        let booking = bookings.create(new_booking()).await.unwrap();

        let updated = bookings
            .update(
                &booking.id,
                BookingPatch {
                    payment_status: Some(PaymentStatus::Paid),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, BookingStatus::Pending);
        assert_eq!(updated.payment_status, PaymentStatus::Paid);
        assert_eq!(updated.note, booking.note);
    }

    #[tokio::test]
    async fn test_cancel_pending_booking() {
        let (_gateway, bookings) = container();
        let booking = bookings.create(new_booking()).await.unwrap();

        let cancelled = bookings.cancel(&booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_completed_booking_is_invalid_transition() {
        let (_gateway, bookings) = container();
        let booking = bookings.create(new_booking()).await.unwrap();
        bookings
            .update(
                &booking.id,
                BookingPatch {
                    status: Some(BookingStatus::Confirmed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        bookings
            .update(
                &booking.id,
                BookingPatch {
                    status: Some(BookingStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = bookings.cancel(&booking.id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));

        // The stored record is untouched
        let still = bookings.get_by_id(&booking.id).await.unwrap();
        assert_eq!(still.status, BookingStatus::Completed);
    }

    #[tokio::test]
    async fn test_terminal_booking_rejects_any_update() {
        let (_gateway, bookings) = container();
        let booking = bookings.create(new_booking()).await.unwrap();
        bookings.cancel(&booking.id).await.unwrap();

        let err = bookings
            .update(
                &booking.id,
                BookingPatch {
                    note: Some("changed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }
}
