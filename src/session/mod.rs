//! Process-wide authentication session.
//!
//! ARCHITECTURE
//! ============
//! `SessionManager` observes the identity provider, resolves the backend role
//! for the current identity, and publishes one immutable [`SessionSnapshot`]
//! per resolution. It is constructed once at startup and handed to route
//! guards and views; it is cheap to clone.
//!
//! STALENESS
//! =========
//! Each identity change takes a new generation number before any I/O. A
//! resolution may only publish if its generation is still the latest, so a
//! slow lookup for an identity that has since signed out (or been replaced)
//! is discarded instead of overwriting the newer snapshot. The check and the
//! publish happen under one lock, so identity, role and loading state always
//! change together.
//!
//! Role refreshes take a sequence number on top of the generation, so an
//! older refresh that completes late cannot overwrite a newer one. A refresh
//! only runs while the session is `Ready` and the provider still reports the
//! published identity.
//!
//! FAILURE MODEL
//! =============
//! Only provider rejections ([`AuthError`]) reach callers. Backend failures
//! are logged and degrade the role to [`Role::User`].

mod resolve;
pub mod snapshot;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use crate::backend::{NewUser, UserDirectory};
use crate::identity::{AuthError, Identity, IdentityProvider};
use crate::role::Role;
pub use snapshot::{LoadingState, SessionPhase, SessionSnapshot};

type Callback = Arc<dyn Fn(&SessionSnapshot) + Send + Sync>;

/// Generation tag taken when an identity change is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket(u64);

/// Tag for one `refresh_role` call: the generation it belongs to plus its
/// position among refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RefreshTicket {
    generation: u64,
    seq: u64,
}

struct SessionState {
    generation: u64,
    refresh_seq: u64,
    phase: SessionPhase,
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    directory: Arc<dyn UserDirectory>,
    state: Mutex<SessionState>,
    snapshot: watch::Sender<SessionSnapshot>,
    subscribers: Mutex<HashMap<Uuid, Callback>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    /// Display names of in-flight registrations, keyed by email. Consumed by
    /// the resolution the provider's sign-in event triggers.
    pending_names: Mutex<HashMap<String, String>>,
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Build a manager in `Initializing` without attaching to the provider.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, directory: Arc<dyn UserDirectory>) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::initializing());
        Self {
            inner: Arc::new(Inner {
                provider,
                directory,
                state: Mutex::new(SessionState {
                    generation: 0,
                    refresh_seq: 0,
                    phase: SessionPhase::Initializing,
                }),
                snapshot,
                subscribers: Mutex::new(HashMap::new()),
                listener: Mutex::new(None),
                pending_names: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Build a manager and subscribe it to the provider's identity changes.
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(provider: Arc<dyn IdentityProvider>, directory: Arc<dyn UserDirectory>) -> Self {
        let manager = Self::new(provider, directory);
        manager.attach();
        manager
    }

    fn attach(&self) {
        let mut changes = self.inner.provider.identity_changes();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        // Resolutions live in the listener's JoinSet, so aborting the
        // listener aborts them too.
        let handle = tokio::spawn(async move {
            let mut resolutions = JoinSet::new();
            loop {
                tokio::select! {
                    change = changes.recv() => {
                        let Some(identity) = change else { break };
                        let Some(inner) = weak.upgrade() else { break };
                        let manager = SessionManager { inner };
                        // Tag in arrival order; resolve concurrently.
                        let ticket = manager.begin(identity.as_ref());
                        match identity {
                            None => {
                                manager.publish(ticket, SessionSnapshot::anonymous());
                            }
                            Some(identity) => {
                                resolutions.spawn(async move { manager.finish(ticket, identity).await });
                            }
                        }
                    }
                    Some(_) = resolutions.join_next(), if !resolutions.is_empty() => {}
                }
            }
            tracing::debug!("identity subscription closed");
            while resolutions.join_next().await.is_some() {}
        });

        let previous = lock(&self.inner.listener).replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Detach from the identity provider and drop in-flight resolutions.
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        let handle = lock(&self.inner.listener).take();
        if let Some(handle) = handle {
            handle.abort();
            // A resolution already past its last await must still lose the
            // generation check.
            lock(&self.inner.state).generation += 1;
            lock(&self.inner.pending_names).clear();
            tracing::debug!("session manager detached from identity provider");
        }
    }

    fn is_attached(&self) -> bool {
        lock(&self.inner.listener).is_some()
    }

    // =========================================================================
    // READ SIDE
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.inner.snapshot.borrow().role()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        lock(&self.inner.state).phase
    }

    /// A receiver that always holds the latest snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Invoke `callback` with every snapshot published from now on.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionSnapshot) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        lock(&self.inner.subscribers).insert(id, Arc::new(callback));
        Subscription { id, inner: Arc::downgrade(&self.inner) }
    }

    // =========================================================================
    // IDENTITY CHANGES
    // =========================================================================

    /// Drive the state machine for a new identity-provider state.
    ///
    /// Completes once this change's resolution has either published or been
    /// discarded as stale.
    pub async fn on_identity_changed(&self, identity: Option<Identity>) {
        let ticket = self.begin(identity.as_ref());
        match identity {
            None => {
                self.publish(ticket, SessionSnapshot::anonymous());
            }
            Some(identity) => self.finish(ticket, identity).await,
        }
    }

    fn begin(&self, identity: Option<&Identity>) -> Ticket {
        let mut state = lock(&self.inner.state);
        state.generation += 1;
        if let Some(identity) = identity {
            state.phase = SessionPhase::Resolving;
            tracing::debug!(uid = %identity.id, generation = state.generation, "resolving role");
        }
        Ticket(state.generation)
    }

    async fn finish(&self, ticket: Ticket, mut identity: Identity) {
        let pending = lock(&self.inner.pending_names).remove(&identity.email);
        if let Some(name) = pending {
            if identity.display_name.is_none() {
                identity = identity.with_display_name(name);
            }
        }
        let role = resolve::resolve_role(self.inner.directory.as_ref(), &identity, &identity.claims).await;
        self.publish(ticket, SessionSnapshot::signed_in(identity, role));
    }

    /// Publish a resolution result if `ticket` is still the latest generation.
    fn publish(&self, ticket: Ticket, snapshot: SessionSnapshot) -> bool {
        {
            let mut state = lock(&self.inner.state);
            if state.generation != ticket.0 {
                tracing::debug!(
                    generation = ticket.0,
                    latest = state.generation,
                    uid = ?snapshot.uid(),
                    "discarding stale resolution"
                );
                return false;
            }
            state.phase = if snapshot.is_signed_in() { SessionPhase::Ready } else { SessionPhase::Anonymous };
            self.inner.snapshot.send_replace(snapshot);
        }
        self.notify();
        true
    }

    /// Deliver the latest snapshot to callback subscribers. Callbacks run
    /// outside every lock, so they may call back into the manager.
    fn notify(&self) {
        let latest = self.snapshot();
        tracing::debug!(uid = ?latest.uid(), role = %latest.role(), loading = ?latest.loading(), "session published");
        let callbacks: Vec<Callback> = lock(&self.inner.subscribers).values().cloned().collect();
        for callback in callbacks {
            callback(&latest);
        }
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Re-resolve the role of the current identity with a freshly minted token.
    ///
    /// Loading state stays `ready`. Only runs while the session is `Ready`
    /// and the provider still reports the published identity; otherwise
    /// nothing is looked up and the live role is returned (`user` while a
    /// new identity is resolving). A refresh overtaken by an identity change
    /// or by a later refresh is discarded and also returns the live role.
    pub async fn refresh_role(&self) -> Role {
        let live = self.inner.provider.current_identity();
        let (mut identity, ticket) = {
            let mut state = lock(&self.inner.state);
            let current = self.inner.snapshot.borrow();
            let Some(identity) = current.identity() else {
                return live_role(&state, &current);
            };
            if state.phase != SessionPhase::Ready || live.as_ref().map(|i| i.id.as_str()) != Some(identity.id.as_str())
            {
                tracing::debug!(uid = %identity.id, phase = ?state.phase, "identity changing, skipping role refresh");
                return Role::User;
            }
            state.refresh_seq += 1;
            let ticket = RefreshTicket { generation: state.generation, seq: state.refresh_seq };
            (identity.clone(), ticket)
        };

        match self.inner.provider.token_claims(true).await {
            Ok(claims) => identity.claims = claims,
            Err(e) => tracing::warn!(uid = %identity.id, error = %e, "token refresh failed, using cached claims"),
        }

        let role = resolve::resolve_role(self.inner.directory.as_ref(), &identity, &identity.claims).await;
        if self.publish_refresh(ticket, SessionSnapshot::signed_in(identity, role)) {
            role
        } else {
            let state = lock(&self.inner.state);
            live_role(&state, &self.inner.snapshot.borrow())
        }
    }

    /// Publish a refresh result if no identity change and no later refresh
    /// happened since it started, and the provider still reports the same
    /// identity. Leaves the phase alone.
    fn publish_refresh(&self, ticket: RefreshTicket, snapshot: SessionSnapshot) -> bool {
        let live = self.inner.provider.current_identity();
        let uid = snapshot.uid().unwrap_or_default();
        {
            let state = lock(&self.inner.state);
            let same_identity =
                self.inner.snapshot.borrow().uid() == Some(uid) && live.as_ref().map(|i| i.id.as_str()) == Some(uid);
            if state.generation != ticket.generation || state.refresh_seq != ticket.seq || !same_identity {
                tracing::debug!(%uid, seq = ticket.seq, latest = state.refresh_seq, "discarding stale role refresh");
                return false;
            }
            self.inner.snapshot.send_replace(snapshot);
        }
        self.notify();
        true
    }

    /// Create a password account, set its display name, and record it in the
    /// backend. Backend and profile failures are logged only.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the provider rejects the registration.
    pub async fn register_with_password(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError> {
        // The provider announces the new identity before the display name is
        // set; the resolution it triggers picks the name up from here.
        if self.is_attached() {
            lock(&self.inner.pending_names).insert(email.to_owned(), display_name.to_owned());
        }
        let identity = match self.inner.provider.create_user_with_password(email, password).await {
            Ok(identity) => identity,
            Err(e) => {
                lock(&self.inner.pending_names).remove(email);
                tracing::warn!(error = %e, "registration rejected");
                return Err(e);
            }
        };

        if let Err(e) = self
            .inner
            .provider
            .update_display_name(&identity, display_name)
            .await
        {
            tracing::warn!(uid = %identity.id, error = %e, "display name update failed");
        }
        let identity = identity.with_display_name(display_name);

        resolve::provision(self.inner.directory.as_ref(), &NewUser::from_identity(&identity)).await;
        Ok(identity)
    }

    /// Role resolution follows asynchronously via the identity subscription.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] on rejected credentials.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.inner
            .provider
            .sign_in_with_password(email, password)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "password sign-in rejected"))
    }

    /// Run the provider's interactive flow. First-time identities are
    /// provisioned by the resolution the subscription triggers.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the flow is cancelled or fails.
    pub async fn sign_in_with_federated_provider(&self) -> Result<Identity, AuthError> {
        self.inner
            .provider
            .sign_in_federated()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "federated sign-in failed"))
    }

    /// End the provider session. A no-op when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the provider fails to sign out.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if self.inner.provider.current_identity().is_none() {
            tracing::debug!("sign-out with no active identity");
            return Ok(());
        }
        self.inner
            .provider
            .sign_out()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "sign-out failed"))
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Handle returned by [`SessionManager::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: Uuid,
    inner: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner.subscribers).remove(&self.id);
        }
    }
}

/// Role of the live session: the published role once `Ready`, `user` while
/// a resolution is pending or nobody is signed in.
fn live_role(state: &SessionState, current: &SessionSnapshot) -> Role {
    if state.phase == SessionPhase::Ready { current.role() } else { Role::User }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
