//! Accounts backed by the persistence engine.

use std::sync::Arc;

use playhub_protocol::{Account, Credentials};
use playhub_session::{Authenticator, Identity, SessionError};
use playhub_store::{StoreClient, StoreError};
use serde_json::json;
use tokio::sync::Mutex;

/// [`Authenticator`] that keeps accounts in the role collections
/// (`publishers` / `consumers`).
///
/// Registrations run one at a time so the username check and the insert
/// cannot interleave.
#[derive(Clone)]
pub struct StoreAuthenticator {
    store: Arc<StoreClient>,
    registering: Arc<Mutex<()>>,
}

impl StoreAuthenticator {
    pub fn new(store: Arc<StoreClient>) -> Self {
        Self {
            store,
            registering: Arc::new(Mutex::new(())),
        }
    }

    async fn find(&self, creds: &Credentials) -> Result<Option<Account>, SessionError> {
        let matches: Vec<Account> = self
            .store
            .query(creds.role.collection(), &json!({ "username": creds.username }))
            .await
            .map_err(backend)?;
        Ok(matches.into_iter().next())
    }
}

fn backend(e: StoreError) -> SessionError {
    SessionError::Backend(e.to_string())
}

impl Authenticator for StoreAuthenticator {
    async fn register(&self, creds: &Credentials) -> Result<Account, SessionError> {
        let _registering = self.registering.lock().await;
        if self.find(creds).await?.is_some() {
            return Err(SessionError::UsernameTaken(creds.username.clone()));
        }
        let account = Account {
            id: String::new(),
            username: creds.username.clone(),
            password: creds.password.clone(),
            role: creds.role,
        };
        let created: Account = self
            .store
            .create(creds.role.collection(), &account)
            .await
            .map_err(backend)?;
        tracing::info!(role = %created.role, username = %created.username, id = %created.id, "account registered");
        Ok(created)
    }

    async fn authenticate(&self, creds: &Credentials) -> Result<Identity, SessionError> {
        match self.find(creds).await? {
            Some(account) if account.password == creds.password => {
                Ok(Identity::new(creds.role, account.username))
            }
            _ => Err(SessionError::AuthFailed),
        }
    }
}
