//! Auth container: session lifecycle and account records.
//!
//! Owns the session slice (`current` is the signed-in account; `items` is
//! unused by design). All credential work is delegated to the gateway's
//! auth surface; the account record lives in the `accounts` collection
//! keyed by the auth subject identifier.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::gateway::{
    collections::ACCOUNTS, from_document, to_fields, AuthGateway, DocumentStore,
    FederatedAssertion, Gateway, Principal, SessionChange,
};
use crate::types::{Account, ProfilePatch, Role};

use super::slice::{Slice, SliceState};

/// Intents the dispatch channel routes to this container
#[derive(Debug, Clone)]
pub enum AuthIntent {
    Register {
        email: String,
        password: String,
        display_name: String,
        role: Role,
    },
    SignIn {
        email: String,
        password: String,
    },
    FederatedSignIn(FederatedAssertion),
    SignOut,
    SetSession(Option<Account>),
    UpdateProfile(ProfilePatch),
}

pub struct AuthContainer {
    gateway: Arc<dyn Gateway>,
    slice: Slice<Account>,
    /// Role for accounts synthesized on first federated sign-in
    default_federated_role: Role,
}

impl AuthContainer {
    pub fn new(gateway: Arc<dyn Gateway>, default_federated_role: Role) -> Self {
        Self {
            gateway,
            slice: Slice::new(),
            default_federated_role,
        }
    }

    /// Snapshot of the session slice
    pub fn state(&self) -> SliceState<Account> {
        self.slice.snapshot()
    }

    /// The signed-in account, if any
    pub fn session(&self) -> Option<Account> {
        self.slice.snapshot().current
    }

    pub async fn handle(&self, intent: AuthIntent) {
        let result = match intent {
            AuthIntent::Register {
                email,
                password,
                display_name,
                role,
            } => self
                .register(&email, &password, &display_name, role)
                .await
                .map(|_| ()),
            AuthIntent::SignIn { email, password } => {
                self.sign_in(&email, &password).await.map(|_| ())
            }
            AuthIntent::FederatedSignIn(assertion) => {
                self.federated_sign_in(&assertion).await.map(|_| ())
            }
            AuthIntent::SignOut => self.sign_out().await,
            AuthIntent::SetSession(account) => {
                self.set_session(account);
                Ok(())
            }
            AuthIntent::UpdateProfile(patch) => self.update_profile(patch).await.map(|_| ()),
        };

        if let Err(e) = result {
            tracing::debug!(error = %e, "auth intent rejected");
        }
    }

    /// Create a credential, then the account record keyed by the new
    /// subject identifier. Gateway credential rejections surface verbatim.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        role: Role,
    ) -> Result<Account> {
        self.slice.begin();
        let result = self
            .do_register(email, password, display_name, role)
            .await;
        self.slice
            .settle(result, |state, account| state.current = Some(account.clone()))
    }

    async fn do_register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        role: Role,
    ) -> Result<Account> {
        let principal = self
            .gateway
            .create_account_credential(email, password)
            .await?;
        self.gateway.set_display_name(display_name).await?;

        let account = Account {
            id: principal.id,
            email: email.to_string(),
            display_name: display_name.to_string(),
            avatar_url: None,
            role,
            created_at: Utc::now(),
        };
        self.gateway
            .put(ACCOUNTS, &account.id, to_fields(&account)?)
            .await?;

        tracing::info!(account_id = %account.id, role = role.as_str(), "account registered");
        Ok(account)
    }

    /// Authenticate, then read the account record. A missing record after a
    /// successful authentication is an inconsistency between the auth and
    /// profile stores and rejects with `NotFound`.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Account> {
        self.slice.begin();
        let result = self.do_sign_in(email, password).await;
        self.slice
            .settle(result, |state, account| state.current = Some(account.clone()))
    }

    async fn do_sign_in(&self, email: &str, password: &str) -> Result<Account> {
        let principal = self.gateway.authenticate(email, password).await?;
        self.read_account(&principal.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user record not found: {}", principal.id)))
    }

    /// Authenticate via an identity-provider assertion; synthesize an
    /// account with the configured default role on first sign-in.
    pub async fn federated_sign_in(&self, assertion: &FederatedAssertion) -> Result<Account> {
        self.slice.begin();
        let result = self.do_federated_sign_in(assertion).await;
        self.slice
            .settle(result, |state, account| state.current = Some(account.clone()))
    }

    async fn do_federated_sign_in(&self, assertion: &FederatedAssertion) -> Result<Account> {
        let principal = self.gateway.federated_sign_in(assertion).await?;

        if let Some(account) = self.read_account(&principal.id).await? {
            return Ok(account);
        }

        let account = self.synthesize_account(principal);
        self.gateway
            .put(ACCOUNTS, &account.id, to_fields(&account)?)
            .await?;
        tracing::info!(
            account_id = %account.id,
            role = account.role.as_str(),
            "account synthesized on first federated sign-in"
        );
        Ok(account)
    }

    fn synthesize_account(&self, principal: Principal) -> Account {
        let display_name = principal
            .display_name
            .clone()
            .unwrap_or_else(|| principal.email.clone());
        Account {
            id: principal.id,
            email: principal.email,
            display_name,
            avatar_url: principal.avatar_url,
            role: self.default_federated_role,
            created_at: Utc::now(),
        }
    }

    /// Invalidate the gateway session and clear the local one
    pub async fn sign_out(&self) -> Result<()> {
        self.slice.begin();
        let result = self.gateway.sign_out().await;
        self.slice.settle(result, |state, _| state.current = None)
    }

    /// Synchronous session reducer, used by the store's session watcher
    pub fn set_session(&self, account: Option<Account>) {
        self.slice.mutate(|state| state.current = account);
    }

    /// Shallow-merge profile fields onto the account record and refresh
    /// the session with the stored result.
    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<Account> {
        self.slice.begin();
        let result = self.do_update_profile(patch).await;
        self.slice
            .settle(result, |state, account| state.current = Some(account.clone()))
    }

    async fn do_update_profile(&self, patch: ProfilePatch) -> Result<Account> {
        let session = self
            .session()
            .ok_or_else(|| Error::Validation("no active session".to_string()))?;

        self.gateway
            .update(ACCOUNTS, &session.id, to_fields(&patch)?)
            .await?;
        self.read_account(&session.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user record not found: {}", session.id)))
    }

    /// React to a session transition pushed by the gateway: re-read the
    /// account record on sign-in, clear the session on sign-out or when
    /// the record is absent.
    pub async fn apply_session_change(&self, change: SessionChange) -> Result<()> {
        match change {
            SessionChange::SignedIn { principal_id } => {
                let account = self.read_account(&principal_id).await?;
                if account.is_none() {
                    tracing::warn!(%principal_id, "session change for principal without account record");
                }
                self.set_session(account);
            }
            SessionChange::SignedOut => self.set_session(None),
        }
        Ok(())
    }

    async fn read_account(&self, id: &str) -> Result<Option<Account>> {
        match self.gateway.get(ACCOUNTS, id).await? {
            Some(doc) => Ok(Some(from_document(&doc)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::InMemoryGateway;

    fn container() -> (Arc<InMemoryGateway>, AuthContainer) {
        let gateway = Arc::new(InMemoryGateway::new());
        let container = AuthContainer::new(gateway.clone(), Role::Customer);
        (gateway, container)
    }

    #[tokio::test]
    async fn test_register_creates_session_and_record() {
        let (gateway, auth) = container();

        let account = auth
            .register("ada@example.com", "secret1", "Ada", Role::Provider)
            .await
            .unwrap();
        assert_eq!(account.display_name, "Ada");
        assert_eq!(account.role, Role::Provider);

        // Record is written under the auth subject id
        let doc = gateway.get(ACCOUNTS, &account.id).await.unwrap().unwrap();
        assert_eq!(doc.fields["email"], "ada@example.com");

        let state = auth.state();
        assert!(!state.is_loading);
        assert!(state.error.is_none());
        assert_eq!(state.current.unwrap().id, account.id);
    }

    #[tokio::test]
    async fn test_register_surfaces_gateway_rejection_verbatim() {
        let (_gateway, auth) = container();

        let err = auth
            .register("ada@example.com", "short", "Ada", Role::Customer)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let state = auth.state();
        assert_eq!(
            state.error.as_deref(),
            Some("password should be at least 6 characters")
        );
        assert!(state.current.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_without_account_record_is_not_found() {
        let (gateway, auth) = container();

        // Credential exists but the account record was never written
        gateway
            .create_account_credential("ada@example.com", "secret1")
            .await
            .unwrap();

        let err = auth.sign_in("ada@example.com", "secret1").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(auth.session().is_none());
    }

    #[tokio::test]
    async fn test_federated_sign_in_synthesizes_default_role() {
        let (gateway, auth) = container();

        let assertion = FederatedAssertion {
            provider: "google".to_string(),
            id_token: "tok-1".to_string(),
        };
        gateway.register_federated_identity(
            &assertion,
            Principal {
                id: "sub-9".to_string(),
                email: "lin@example.com".to_string(),
                display_name: Some("Lin".to_string()),
                avatar_url: None,
            },
        );

        let account = auth.federated_sign_in(&assertion).await.unwrap();
        assert_eq!(account.id, "sub-9");
        assert_eq!(account.role, Role::Customer);
        assert_eq!(account.display_name, "Lin");

        // Second sign-in finds the stored record instead of synthesizing
        let again = auth.federated_sign_in(&assertion).await.unwrap();
        assert_eq!(again.id, account.id);
        assert_eq!(again.created_at, account.created_at);
    }

    #[tokio::test]
    async fn test_sign_out_clears_session() {
        let (_gateway, auth) = container();
        auth.register("ada@example.com", "secret1", "Ada", Role::Customer)
            .await
            .unwrap();
        assert!(auth.session().is_some());

        auth.sign_out().await.unwrap();
        assert!(auth.session().is_none());
    }

    #[tokio::test]
    async fn test_update_profile_merges_and_refreshes_session() {
        let (_gateway, auth) = container();
        auth.register("ada@example.com", "secret1", "Ada", Role::Customer)
            .await
            .unwrap();

        let updated = auth
            .update_profile(ProfilePatch {
                display_name: Some("Ada L.".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.display_name, "Ada L.");
        // Untouched fields survive the shallow merge
        assert_eq!(updated.email, "ada@example.com");
        assert_eq!(auth.session().unwrap().display_name, "Ada L.");
    }

    #[tokio::test]
    async fn test_apply_session_change() {
        let (_gateway, auth) = container();
        let account = auth
            .register("ada@example.com", "secret1", "Ada", Role::Customer)
            .await
            .unwrap();

        auth.set_session(None);
        auth.apply_session_change(SessionChange::SignedIn {
            principal_id: account.id.clone(),
        })
        .await
        .unwrap();
        assert_eq!(auth.session().unwrap().id, account.id);

        auth.apply_session_change(SessionChange::SignedOut)
            .await
            .unwrap();
        assert!(auth.session().is_none());
    }
}
