//! Gateway ports: the contract this library consumes from the managed
//! auth + document store + blob store platform.
//!
//! Everything "hard" (credential checks, persistence, querying, file
//! storage) lives behind these traits. Two adapters are provided:
//! [`rest::RestGateway`] for a remote HTTP surface and
//! [`memory::InMemoryGateway`] for tests and local development.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{Error, Result};

/// Collection names used by the domain containers
pub mod collections {
    pub const ACCOUNTS: &str = "accounts";
    pub const SERVICES: &str = "services";
    pub const BOOKINGS: &str = "bookings";
    pub const CONVERSATIONS: &str = "conversations";
    pub const MESSAGES: &str = "messages";
    pub const REVIEWS: &str = "reviews";
}

// ============================================
// Auth surface
// ============================================

/// The authenticated identity returned by the gateway's auth surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Auth subject identifier
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Proof of a federated sign-in obtained by the view layer.
///
/// The interactive popup/redirect hop belongs to the view layer; this
/// library only sees its result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedAssertion {
    /// Identity provider name (e.g. "google")
    pub provider: String,
    pub id_token: String,
}

/// A session transition observed by this client instance.
///
/// Broadcast by the gateway adapter whenever one of its own auth calls
/// settles; the store subscribes exactly once at start and forwards each
/// change to the auth container.
#[derive(Debug, Clone)]
pub enum SessionChange {
    SignedIn { principal_id: String },
    SignedOut,
}

/// Credential management and session surface of the gateway
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Create a new email/password credential and sign it in
    async fn create_account_credential(&self, email: &str, password: &str) -> Result<Principal>;

    /// Authenticate an existing email/password credential
    async fn authenticate(&self, email: &str, password: &str) -> Result<Principal>;

    /// Authenticate via an identity-provider assertion
    async fn federated_sign_in(&self, assertion: &FederatedAssertion) -> Result<Principal>;

    /// Set the display name on the currently signed-in auth profile
    async fn set_display_name(&self, name: &str) -> Result<()>;

    /// Invalidate the current session
    async fn sign_out(&self) -> Result<()>;

    /// Subscribe to session transitions observed by this client instance
    fn subscribe_session_changes(&self) -> broadcast::Receiver<SessionChange>;
}

// ============================================
// Document surface
// ============================================

/// A schema-less document as stored by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Value,
}

/// Sort direction for an ordered query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

/// A single query predicate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    /// Field equals value
    Eq { field: String, value: Value },
    /// Array-valued field contains value
    ArrayContains { field: String, value: Value },
}

/// The gateway's full query surface: equality, array-membership, ordering.
/// Unordered queries return documents in storage-default order, which the
/// gateway does not define; callers must not rely on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<(String, Direction)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn array_contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::ArrayContains {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }
}

/// Create/read/update/delete and query on named collections
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document; the gateway assigns and returns its identifier
    async fn insert(&self, collection: &str, fields: Value) -> Result<String>;

    /// Write a document under a caller-chosen identifier (upsert)
    async fn put(&self, collection: &str, id: &str, fields: Value) -> Result<()>;

    /// Read a document by identifier
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Shallow-merge the supplied fields into an existing document
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<()>;

    /// Delete a document by identifier
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Read all documents matching the query
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;
}

// ============================================
// Blob surface
// ============================================

/// File upload returning a retrievable URL
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String>;
}

/// The complete gateway: auth + documents + blobs
pub trait Gateway: AuthGateway + DocumentStore + BlobStore {}

impl<T: AuthGateway + DocumentStore + BlobStore> Gateway for T {}

// ============================================
// Document <-> record conversion
// ============================================

/// Deserialize a typed record from a document, folding the document id
/// into the record's `id` field.
pub fn from_document<T: DeserializeOwned>(doc: &Document) -> Result<T> {
    let mut fields = doc.fields.clone();
    match fields.as_object_mut() {
        Some(map) => {
            map.insert("id".to_string(), Value::String(doc.id.clone()));
        }
        None => {
            return Err(Error::Read(format!(
                "document {} is not a JSON object",
                doc.id
            )))
        }
    }
    Ok(serde_json::from_value(fields)?)
}

/// Serialize a typed record to document fields, stripping the `id` field
/// (the identifier is the document key, not a stored field).
pub fn to_fields<T: Serialize>(record: &T) -> Result<Value> {
    let mut value = serde_json::to_value(record)?;
    if let Some(map) = value.as_object_mut() {
        map.remove("id");
    }
    Ok(value)
}
