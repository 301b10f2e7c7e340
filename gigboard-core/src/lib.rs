//! # gigboard-core
//!
//! Core library for gigboard - a service-marketplace client.
//!
//! This library provides:
//! - Typed domain records for accounts, listings, bookings, chat, and reviews
//! - Four domain state containers with a uniform pending/fulfilled/rejected
//!   lifecycle over every remote operation
//! - A root store aggregating the containers behind one dispatch channel
//! - Gateway ports for the managed auth + document + blob platform, with a
//!   REST adapter and an in-memory adapter
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! A view layer issues an [`Intent`]; the store routes it to the owning
//! container; the container calls the gateway and, on settlement, updates
//! its state slice immutably. Views re-render from cloned state snapshots
//! and never receive a thrown error: rejections land in the owning slice's
//! `error` field.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gigboard_core::gateway::rest::RestGateway;
//! use gigboard_core::{Config, Store, StoreOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> gigboard_core::Result<()> {
//! let config = Config::load()?;
//! let gateway = Arc::new(RestGateway::new(&config.gateway)?);
//! let store = Store::connect(gateway, StoreOptions::from(&config));
//!
//! store.services.list().await?;
//! println!("{} listings", store.services.state().items.len());
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use store::{Intent, SliceState, Store, StoreOptions};
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod routes;
pub mod store;
pub mod types;
