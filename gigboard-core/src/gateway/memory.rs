//! In-memory gateway adapter for tests and local development.
//!
//! Mirrors the observable behavior of the managed platform: opaque id
//! assignment on insert, shallow-merge partial updates, equality and
//! array-membership queries with an undefined storage-default order
//! (insertion order here), credential rules modeled on a managed auth
//! provider, and a session-change broadcast fed by this instance's own
//! auth calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, Semaphore};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::{
    AuthGateway, BlobStore, Direction, Document, DocumentStore, FederatedAssertion, Filter,
    Principal, Query, SessionChange,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
struct Credential {
    password: String,
    principal: Principal,
}

/// In-memory stand-in for the managed gateway platform
pub struct InMemoryGateway {
    collections: Mutex<HashMap<String, Vec<(String, Value)>>>,
    credentials: Mutex<HashMap<String, Credential>>,
    federated: Mutex<HashMap<String, Principal>>,
    session: Mutex<Option<Principal>>,
    uploaded: Mutex<Vec<String>>,
    events: broadcast::Sender<SessionChange>,
    fail_next_insert: AtomicBool,
    fail_next_upload: AtomicBool,
    read_gate: Mutex<Option<Arc<Semaphore>>>,
    write_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            collections: Mutex::new(HashMap::new()),
            credentials: Mutex::new(HashMap::new()),
            federated: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            uploaded: Mutex::new(Vec::new()),
            events,
            fail_next_insert: AtomicBool::new(false),
            fail_next_upload: AtomicBool::new(false),
            read_gate: Mutex::new(None),
            write_gate: Mutex::new(None),
        }
    }

    /// Pre-register a federated identity so `federated_sign_in` can resolve it
    pub fn register_federated_identity(
        &self,
        assertion: &FederatedAssertion,
        principal: Principal,
    ) {
        lock(&self.federated).insert(federated_key(assertion), principal);
    }

    /// Paths of every blob uploaded so far (orphaned blobs included)
    pub fn uploaded_paths(&self) -> Vec<String> {
        lock(&self.uploaded).clone()
    }

    /// Make the next `insert` fail with a write error
    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }

    /// Make the next `upload` fail
    pub fn fail_next_upload(&self) {
        self.fail_next_upload.store(true, Ordering::SeqCst);
    }

    /// Hold every read (`get`/`query`) on the semaphore until a permit is
    /// added, so a test can observe in-flight container state
    pub fn gate_reads(&self, gate: Arc<Semaphore>) {
        *lock(&self.read_gate) = Some(gate);
    }

    /// Hold every `insert` on the semaphore until a permit is added, so a
    /// test can interleave lookups and creates deterministically
    pub fn gate_writes(&self, gate: Arc<Semaphore>) {
        *lock(&self.write_gate) = Some(gate);
    }

    async fn wait_read_gate(&self) {
        let gate = lock(&self.read_gate).clone();
        Self::wait_gate(gate).await;
    }

    async fn wait_write_gate(&self) {
        let gate = lock(&self.write_gate).clone();
        Self::wait_gate(gate).await;
    }

    async fn wait_gate(gate: Option<Arc<Semaphore>>) {
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }

    fn set_session(&self, principal: Option<Principal>) {
        let change = match &principal {
            Some(p) => SessionChange::SignedIn {
                principal_id: p.id.clone(),
            },
            None => SessionChange::SignedOut,
        };
        *lock(&self.session) = principal;
        let _ = self.events.send(change);
    }
}

fn federated_key(assertion: &FederatedAssertion) -> String {
    format!("{}|{}", assertion.provider, assertion.id_token)
}

fn validate_credentials(email: &str, password: &str) -> Result<()> {
    if !email.contains('@') {
        return Err(Error::Validation("invalid email address".to_string()));
    }
    if password.len() < 6 {
        return Err(Error::Validation(
            "password should be at least 6 characters".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl AuthGateway for InMemoryGateway {
    async fn create_account_credential(&self, email: &str, password: &str) -> Result<Principal> {
        validate_credentials(email, password)?;

        let mut credentials = lock(&self.credentials);
        if credentials.contains_key(email) {
            return Err(Error::Validation(
                "email address already in use".to_string(),
            ));
        }

        let principal = Principal {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            display_name: None,
            avatar_url: None,
        };
        credentials.insert(
            email.to_string(),
            Credential {
                password: password.to_string(),
                principal: principal.clone(),
            },
        );
        drop(credentials);

        self.set_session(Some(principal.clone()));
        Ok(principal)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Principal> {
        let principal = {
            let credentials = lock(&self.credentials);
            match credentials.get(email) {
                Some(credential) if credential.password == password => {
                    credential.principal.clone()
                }
                _ => return Err(Error::Validation("invalid email or password".to_string())),
            }
        };

        self.set_session(Some(principal.clone()));
        Ok(principal)
    }

    async fn federated_sign_in(&self, assertion: &FederatedAssertion) -> Result<Principal> {
        let principal = {
            let federated = lock(&self.federated);
            match federated.get(&federated_key(assertion)) {
                Some(principal) => principal.clone(),
                None => {
                    return Err(Error::Validation(format!(
                        "unknown {} identity",
                        assertion.provider
                    )))
                }
            }
        };

        self.set_session(Some(principal.clone()));
        Ok(principal)
    }

    async fn set_display_name(&self, name: &str) -> Result<()> {
        let mut session = lock(&self.session);
        let principal = session
            .as_mut()
            .ok_or_else(|| Error::Write("no authenticated principal".to_string()))?;
        principal.display_name = Some(name.to_string());

        let email = principal.email.clone();
        let updated = principal.clone();
        drop(session);

        if let Some(credential) = lock(&self.credentials).get_mut(&email) {
            credential.principal = updated;
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        self.set_session(None);
        Ok(())
    }

    fn subscribe_session_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }
}

#[async_trait]
impl DocumentStore for InMemoryGateway {
    async fn insert(&self, collection: &str, fields: Value) -> Result<String> {
        self.wait_write_gate().await;

        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(Error::Write("injected write failure".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        lock(&self.collections)
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), fields));
        Ok(id)
    }

    async fn put(&self, collection: &str, id: &str, fields: Value) -> Result<()> {
        let mut collections = lock(&self.collections);
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|(doc_id, _)| doc_id == id) {
            Some((_, existing)) => *existing = fields,
            None => docs.push((id.to_string(), fields)),
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.wait_read_gate().await;

        let collections = lock(&self.collections);
        Ok(collections.get(collection).and_then(|docs| {
            docs.iter()
                .find(|(doc_id, _)| doc_id == id)
                .map(|(doc_id, fields)| Document {
                    id: doc_id.clone(),
                    fields: fields.clone(),
                })
        }))
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        let patch = match patch {
            Value::Object(map) => map,
            _ => return Err(Error::Write("update patch must be an object".to_string())),
        };

        let mut collections = lock(&self.collections);
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|(doc_id, _)| doc_id == id))
            .ok_or_else(|| Error::NotFound(format!("{}/{}", collection, id)))?;

        match doc.1.as_object_mut() {
            Some(fields) => {
                for (key, value) in patch {
                    fields.insert(key, value);
                }
                Ok(())
            }
            None => Err(Error::Write(format!(
                "document {}/{} is not an object",
                collection, id
            ))),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        if let Some(docs) = lock(&self.collections).get_mut(collection) {
            docs.retain(|(doc_id, _)| doc_id != id);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        self.wait_read_gate().await;

        let collections = lock(&self.collections);
        let mut results: Vec<Document> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| matches_filters(fields, &query.filters))
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        if let Some((field, direction)) = &query.order_by {
            results.sort_by(|a, b| {
                let ordering = cmp_json(a.fields.get(field), b.fields.get(field));
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        Ok(results)
    }
}

fn matches_filters(fields: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq { field, value } => fields.get(field) == Some(value),
        Filter::ArrayContains { field, value } => fields
            .get(field)
            .and_then(Value::as_array)
            .map(|array| array.contains(value))
            .unwrap_or(false),
    })
}

/// Comparison over the JSON value kinds the domain actually orders by
/// (timestamps as RFC 3339 strings, numbers). Absent fields sort last.
fn cmp_json(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Greater,
            (_, Value::Null) => Ordering::Less,
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => Ordering::Equal,
        },
    }
}

#[async_trait]
impl BlobStore for InMemoryGateway {
    async fn upload(&self, path: &str, _bytes: &[u8]) -> Result<String> {
        if self.fail_next_upload.swap(false, Ordering::SeqCst) {
            return Err(Error::Upload("injected upload failure".to_string()));
        }

        lock(&self.uploaded).push(path.to_string());
        Ok(format!("https://blobs.local/{}", path))
    }
}
