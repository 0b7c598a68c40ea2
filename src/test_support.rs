//! In-memory collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{mpsc, oneshot};

use crate::backend::{BackendError, CreateOutcome, NewUser, UserDirectory, UserRecord};
use crate::identity::{AuthError, Claims, Identity, IdentityProvider, SignInMethod};
use crate::role::Role;

// =============================================================================
// MockDirectory
// =============================================================================

/// Scripted answer for one `GET /users/{uid}`.
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(Role),
    NotFound,
    Fail(BackendError),
}

/// Scripted user directory. Per-uid answers are consumed in order; the last
/// one repeats. Unscripted uids answer 404.
pub struct MockDirectory {
    lookups: Mutex<HashMap<String, VecDeque<Lookup>>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    create_result: Mutex<Result<CreateOutcome, BackendError>>,
    created: Mutex<Vec<NewUser>>,
    lookup_calls: Mutex<Vec<String>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self {
            lookups: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            create_result: Mutex::new(Ok(CreateOutcome::Created)),
            created: Mutex::new(Vec::new()),
            lookup_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_lookup(&self, uid: &str, answer: Lookup) {
        self.lookups
            .lock()
            .unwrap()
            .entry(uid.to_owned())
            .or_default()
            .push_back(answer);
    }

    pub fn on_create(&self, result: Result<CreateOutcome, BackendError>) {
        *self.create_result.lock().unwrap() = result;
    }

    /// Hold the next lookup for `uid` until the returned sender fires.
    pub fn gate(&self, uid: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(uid.to_owned(), rx);
        tx
    }

    pub fn created(&self) -> Vec<NewUser> {
        self.created.lock().unwrap().clone()
    }

    pub fn lookup_count(&self, uid: &str) -> usize {
        self.lookup_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == uid)
            .count()
    }

    fn next_answer(&self, uid: &str) -> Lookup {
        let mut lookups = self.lookups.lock().unwrap();
        match lookups.get_mut(uid) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Lookup::NotFound),
            None => Lookup::NotFound,
        }
    }
}

#[async_trait::async_trait]
impl UserDirectory for MockDirectory {
    async fn get_user(&self, uid: &str) -> Result<Option<UserRecord>, BackendError> {
        self.lookup_calls.lock().unwrap().push(uid.to_owned());
        let gate = self.gates.lock().unwrap().remove(uid);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match self.next_answer(uid) {
            Lookup::Found(role) => Ok(Some(UserRecord {
                uid: Some(uid.to_owned()),
                email: None,
                display_name: None,
                photo_url: None,
                provider: None,
                role,
                created_at: None,
            })),
            Lookup::NotFound => Ok(None),
            Lookup::Fail(e) => Err(e),
        }
    }

    async fn create_user(&self, user: &NewUser) -> Result<CreateOutcome, BackendError> {
        self.created.lock().unwrap().push(user.clone());
        self.create_result.lock().unwrap().clone()
    }
}

// =============================================================================
// MockIdentityProvider
// =============================================================================

/// In-memory identity provider. Every state change is broadcast to all
/// `identity_changes` subscribers, like the hosted SDK does.
pub struct MockIdentityProvider {
    current: Mutex<Option<Identity>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<Option<Identity>>>>,
    accounts: Mutex<HashMap<String, (String, Identity)>>,
    federated: Mutex<Result<Identity, AuthError>>,
    claims: Mutex<Claims>,
    fail_display_name: AtomicBool,
    next_id: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub forced_refreshes: AtomicUsize,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            accounts: Mutex::new(HashMap::new()),
            federated: Mutex::new(Err(AuthError::Cancelled)),
            claims: Mutex::new(Claims::new()),
            fail_display_name: AtomicBool::new(false),
            next_id: AtomicUsize::new(1),
            sign_out_calls: AtomicUsize::new(0),
            forced_refreshes: AtomicUsize::new(0),
        }
    }

    /// Set the current identity and notify subscribers.
    pub fn emit(&self, identity: Option<Identity>) {
        *self.current.lock().unwrap() = identity.clone();
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|tx| tx.send(identity.clone()).is_ok());
    }

    pub fn add_account(&self, password: &str, identity: Identity) {
        self.accounts
            .lock()
            .unwrap()
            .insert(identity.email.clone(), (password.to_owned(), identity));
    }

    pub fn script_federated(&self, result: Result<Identity, AuthError>) {
        *self.federated.lock().unwrap() = result;
    }

    pub fn set_claims(&self, claims: Claims) {
        *self.claims.lock().unwrap() = claims;
    }

    pub fn fail_display_name_updates(&self) {
        self.fail_display_name.store(true, Ordering::SeqCst);
    }

    pub fn account(&self, email: &str) -> Option<Identity> {
        self.accounts
            .lock()
            .unwrap()
            .get(email)
            .map(|(_, identity)| identity.clone())
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn create_user_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if !email.contains('@') {
            return Err(AuthError::InvalidEmail);
        }
        if password.len() < 6 {
            return Err(AuthError::WeakPassword);
        }
        if self.accounts.lock().unwrap().contains_key(email) {
            return Err(AuthError::AccountExists);
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let identity = Identity::new(format!("pw-{n}"), email, SignInMethod::Password);
        self.add_account(password, identity.clone());
        self.emit(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let found = self.accounts.lock().unwrap().get(email).cloned();
        match found {
            Some((stored, identity)) if stored == password => {
                self.emit(Some(identity.clone()));
                Ok(identity)
            }
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn sign_in_federated(&self) -> Result<Identity, AuthError> {
        let result = self.federated.lock().unwrap().clone();
        if let Ok(identity) = &result {
            self.emit(Some(identity.clone()));
        }
        result
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.emit(None);
        Ok(())
    }

    async fn update_display_name(&self, identity: &Identity, display_name: &str) -> Result<(), AuthError> {
        if self.fail_display_name.load(Ordering::SeqCst) {
            return Err(AuthError::Provider("profile update rejected".into()));
        }
        if let Some((_, stored)) = self.accounts.lock().unwrap().get_mut(&identity.email) {
            stored.display_name = Some(display_name.to_owned());
        }
        Ok(())
    }

    async fn token_claims(&self, force_refresh: bool) -> Result<Claims, AuthError> {
        if self.current.lock().unwrap().is_none() {
            return Err(AuthError::NoIdentity);
        }
        if force_refresh {
            self.forced_refreshes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(self.claims.lock().unwrap().clone())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.current.lock().unwrap().clone()
    }

    fn identity_changes(&self) -> mpsc::UnboundedReceiver<Option<Identity>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(self.current_identity());
        self.listeners.lock().unwrap().push(tx);
        rx
    }
}
