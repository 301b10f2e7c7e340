//! Root state aggregator.
//!
//! [`Store`] composes the four domain containers into one addressable state
//! tree and exposes a single [`Intent`] dispatch channel. It also owns the
//! only push-driven path in the system: one subscription to the gateway's
//! session-change broadcast, taken exactly once at [`Store::connect`] and
//! released on [`Store::shutdown`] (or drop), forwarding each change to the
//! auth container.

pub mod auth;
pub mod bookings;
pub mod chat;
pub mod services;
pub mod slice;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::gateway::{AuthGateway, Gateway};
use crate::types::Role;

pub use auth::{AuthContainer, AuthIntent};
pub use bookings::{BookingsContainer, BookingsIntent};
pub use chat::{ChatContainer, ChatIntent};
pub use services::{ServicesContainer, ServicesIntent};
pub use slice::SliceState;

/// A state-mutating intent, routed to the owning container.
///
/// Dispatch discards the typed settlement; the state tree is the contract
/// on this channel. Callers that want a typed result use the container
/// methods directly.
#[derive(Debug, Clone)]
pub enum Intent {
    Auth(AuthIntent),
    Services(ServicesIntent),
    Bookings(BookingsIntent),
    Chat(ChatIntent),
}

/// Store construction options
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Role for accounts synthesized on first federated sign-in
    pub default_role_for_federated_sign_in: Role,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            default_role_for_federated_sign_in: Role::Customer,
        }
    }
}

impl From<&Config> for StoreOptions {
    fn from(config: &Config) -> Self {
        Self {
            default_role_for_federated_sign_in: config.auth.default_role_for_federated_sign_in,
        }
    }
}

/// The aggregated state tree and dispatch channel
pub struct Store {
    pub auth: Arc<AuthContainer>,
    pub services: Arc<ServicesContainer>,
    pub bookings: Arc<BookingsContainer>,
    pub chat: Arc<ChatContainer>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Store {
    /// Build the containers and subscribe to the gateway's session-change
    /// broadcast. Must be called from within a tokio runtime; the watcher
    /// task lives until [`Store::shutdown`].
    pub fn connect(gateway: Arc<dyn Gateway>, options: StoreOptions) -> Arc<Self> {
        let auth = Arc::new(AuthContainer::new(
            gateway.clone(),
            options.default_role_for_federated_sign_in,
        ));
        let services = Arc::new(ServicesContainer::new(gateway.clone()));
        let bookings = Arc::new(BookingsContainer::new(gateway.clone()));
        let chat = Arc::new(ChatContainer::new(gateway.clone()));

        let mut changes = gateway.subscribe_session_changes();
        let watcher_auth = auth.clone();
        let watcher = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if let Err(e) = watcher_auth.apply_session_change(change).await {
                            tracing::warn!(error = %e, "failed to apply session change");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session watcher lagged behind broadcast");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Arc::new(Self {
            auth,
            services,
            bookings,
            chat,
            watcher: Mutex::new(Some(watcher)),
        })
    }

    /// Route an intent to its owning container.
    ///
    /// Operation failures are absorbed into the owning slice's `error`
    /// field; nothing propagates past this boundary.
    pub async fn dispatch(&self, intent: Intent) {
        match intent {
            Intent::Auth(intent) => self.auth.handle(intent).await,
            Intent::Services(intent) => self.services.handle(intent).await,
            Intent::Bookings(intent) => self.bookings.handle(intent).await,
            Intent::Chat(intent) => self.chat.handle(intent).await,
        }
    }

    /// Stop the session watcher. Idempotent.
    pub fn shutdown(&self) {
        let handle = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("session watcher stopped");
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.shutdown();
    }
}
