//! Integration tests for the store aggregator and container flows.
//!
//! These tests run the full container stack against the in-memory gateway:
//! dispatch routing, the pending/settled flag discipline, the session
//! watcher lifecycle, and an end-to-end marketplace flow.

use std::sync::Arc;
use std::time::Duration;

use gigboard_core::gateway::memory::InMemoryGateway;
use gigboard_core::gateway::AuthGateway;
use gigboard_core::store::{AuthIntent, BookingsIntent, ChatIntent, ServicesIntent};
use gigboard_core::{
    BookingPatch, BookingStatus, ImageUpload, Intent, NewBooking, NewListing, PaymentStatus, Role,
    Store, StoreOptions, TimeWindow,
};

fn store() -> (Arc<InMemoryGateway>, Arc<Store>) {
    let gateway = Arc::new(InMemoryGateway::new());
    let store = Store::connect(gateway.clone(), StoreOptions::default());
    (gateway, store)
}

fn new_listing() -> NewListing {
    NewListing {
        provider_id: "prov-1".to_string(),
        title: "Logo Design".to_string(),
        description: "Vector logo with two revisions".to_string(),
        category: "design".to_string(),
        price: 200.0,
        location: "Remote".to_string(),
    }
}

fn new_booking(service_id: &str, provider_id: &str, customer_id: &str) -> NewBooking {
    NewBooking {
        service_id: service_id.to_string(),
        customer_id: customer_id.to_string(),
        provider_id: provider_id.to_string(),
        window: TimeWindow {
            date: chrono::NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            start: chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end: chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        },
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        total_amount: 200.0,
        note: None,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within deadline");
}

#[tokio::test]
async fn test_dispatch_routes_and_absorbs_errors() {
    let (_gateway, store) = store();

    store
        .dispatch(Intent::Auth(AuthIntent::Register {
            email: "prov@example.com".to_string(),
            password: "secret1".to_string(),
            display_name: "Pat".to_string(),
            role: Role::Provider,
        }))
        .await;
    assert!(store.auth.state().current.is_some());

    store
        .dispatch(Intent::Services(ServicesIntent::Create {
            listing: new_listing(),
            image: None,
        }))
        .await;
    assert_eq!(store.services.state().items.len(), 1);

    // A failing intent never propagates; it lands in the slice's error
    store
        .dispatch(Intent::Services(ServicesIntent::GetById(
            "missing".to_string(),
        )))
        .await;
    let state = store.services.state();
    assert!(state.error.is_some());
    assert_eq!(state.items.len(), 1);

    store.shutdown();
}

#[tokio::test]
async fn test_pending_flag_is_observable_mid_flight() {
    let (gateway, store) = store();
    store.services.create(new_listing(), None).await.unwrap();

    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    gateway.gate_reads(gate.clone());

    let services = store.services.clone();
    let task = tokio::spawn(async move { services.list().await });

    // The operation enters pending synchronously, before the read settles
    wait_until(|| store.services.state().is_loading).await;
    let pending = store.services.state();
    assert!(pending.is_loading);
    assert!(pending.error.is_none());

    gate.add_permits(1);
    let listings = task.await.unwrap().unwrap();
    assert_eq!(listings.len(), 1);

    let settled = store.services.state();
    assert!(!settled.is_loading);
    assert!(settled.error.is_none());

    store.shutdown();
}

#[tokio::test]
async fn test_session_watcher_forwards_gateway_sign_out() {
    let (gateway, store) = store();

    store
        .auth
        .register("ada@example.com", "secret1", "Ada", Role::Customer)
        .await
        .unwrap();
    assert!(store.auth.session().is_some());

    // A sign-out observed at the gateway, not through the container
    gateway.sign_out().await.unwrap();
    wait_until(|| store.auth.session().is_none()).await;

    store.shutdown();
}

#[tokio::test]
async fn test_shutdown_unsubscribes_the_watcher() {
    let (gateway, store) = store();

    store
        .auth
        .register("ada@example.com", "secret1", "Ada", Role::Customer)
        .await
        .unwrap();
    wait_until(|| store.auth.session().is_some()).await;

    store.shutdown();

    // Events after shutdown are no longer forwarded
    gateway.sign_out().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.auth.session().is_some());
}

#[tokio::test]
async fn test_create_listing_example_flow() {
    let (_gateway, store) = store();

    let listing = store
        .services
        .create(
            new_listing(),
            Some(ImageUpload {
                file_name: "x.png".to_string(),
                bytes: vec![0xFF, 0xD8],
            }),
        )
        .await
        .unwrap();

    assert!(!listing.id.is_empty());
    assert_eq!(listing.rating, 0.0);
    assert_eq!(listing.review_count, 0);
    assert!(listing.image_url.contains("/services/"));

    // The returned identifier is the gateway-assigned one
    let read_back = store.services.get_by_id(&listing.id).await.unwrap();
    assert_eq!(read_back.id, listing.id);
    assert_eq!(read_back.image_url, listing.image_url);

    store.shutdown();
}

#[tokio::test]
async fn test_marketplace_end_to_end() {
    let (_gateway, store) = store();

    // Provider registers and lists a service
    let provider = store
        .auth
        .register("prov@example.com", "secret1", "Pat", Role::Provider)
        .await
        .unwrap();
    let mut listing = new_listing();
    listing.provider_id = provider.id.clone();
    let listing = store.services.create(listing, None).await.unwrap();

    // Customer registers and books it
    let customer = store
        .auth
        .register("cust@example.com", "secret1", "Casey", Role::Customer)
        .await
        .unwrap();
    let booking = store
        .bookings
        .create(new_booking(&listing.id, &provider.id, &customer.id))
        .await
        .unwrap();

    store
        .dispatch(Intent::Bookings(BookingsIntent::Update {
            id: booking.id.clone(),
            patch: BookingPatch {
                status: Some(BookingStatus::Confirmed),
                ..Default::default()
            },
        }))
        .await;
    let confirmed = store.bookings.get_by_id(&booking.id).await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    // They talk about it
    let conversation = store
        .chat
        .get_or_create_conversation(&customer.id, &provider.id)
        .await
        .unwrap();
    store
        .dispatch(Intent::Chat(ChatIntent::SendMessage {
            conversation_id: conversation.id.clone(),
            sender_id: customer.id.clone(),
            receiver_id: provider.id.clone(),
            content: "see you tomorrow".to_string(),
        }))
        .await;

    let conversations = store.chat.list_conversations(&provider.id).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].unread_count, 1);
    assert_eq!(conversations[0].last_message, "see you tomorrow");

    store
        .chat
        .mark_read(&conversation.id, &provider.id)
        .await
        .unwrap();
    let refreshed = store.chat.list_conversations(&provider.id).await.unwrap();
    assert_eq!(refreshed[0].unread_count, 0);

    store.shutdown();
}
