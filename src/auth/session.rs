//! Session lifecycle: restore at startup, login, logout and background renewal.
//!
//! State machine:
//!
//! ```text
//! Uninitialized -> Restoring -> Authenticated | Anonymous
//! Authenticated -> Anonymous      (logout, renewal failure)
//! Anonymous     -> Authenticated  (login only)
//! ```

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::storage::{
    ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SESSION_KEYS, SessionStore, StorageError, USER_KEY,
};
use crate::auth::{AuthBackend, AuthError, Credentials, Identity, Tokens, jwt};
use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Restoring,
    Authenticated,
    Anonymous,
}

impl SessionState {
    /// Views must not render (or redirect) until this is false.
    pub fn is_pending(self) -> bool {
        matches!(self, SessionState::Uninitialized | SessionState::Restoring)
    }
}

/// Identity and access token, always present together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: Identity,
    pub access_token: String,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub renewal_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SessionOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            renewal_interval: config.renewal_interval(),
            request_timeout: config.request_timeout(),
        }
    }
}

struct Inner {
    state: SessionState,
    session: Option<Session>,
    /// Bumped whenever the session is replaced; async results carry the epoch
    /// they started under and are dropped if it no longer matches.
    epoch: u64,
}

struct RenewalTask {
    cancel: CancellationToken,
    _handle: JoinHandle<()>,
}

struct Shared<B, S> {
    backend: Arc<B>,
    store: Arc<S>,
    options: SessionOptions,
    inner: RwLock<Inner>,
    renewal: Mutex<Option<RenewalTask>>,
    state_tx: watch::Sender<SessionState>,
}

impl<B, S> Drop for Shared<B, S> {
    fn drop(&mut self) {
        let task = self
            .renewal
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.cancel.cancel();
        }
    }
}

/// Single source of truth for who is logged in and which credential to use.
pub struct SessionManager<B, S> {
    shared: Arc<Shared<B, S>>,
}

impl<B, S> Clone for SessionManager<B, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B, S> SessionManager<B, S>
where
    B: AuthBackend + 'static,
    S: SessionStore + 'static,
{
    pub fn new(backend: Arc<B>, store: Arc<S>, options: SessionOptions) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Uninitialized);
        Self {
            shared: Arc::new(Shared {
                backend,
                store,
                options,
                inner: RwLock::new(Inner {
                    state: SessionState::Uninitialized,
                    session: None,
                    epoch: 0,
                }),
                renewal: Mutex::new(None),
                state_tx,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.read().state
    }

    /// Watch state transitions (including those made by the renewal task).
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn session(&self) -> Option<Session> {
        self.shared.read().session.clone()
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.shared.read().session.as_ref().map(|s| s.user.clone())
    }

    /// Restore a persisted session. Always resolves to `Authenticated` or `Anonymous`.
    ///
    /// Only the first call restores; later calls return the current state.
    pub async fn restore(&self) -> SessionState {
        let epoch = {
            let mut inner = self.shared.write();
            if inner.state != SessionState::Uninitialized {
                return inner.state;
            }
            inner.state = SessionState::Restoring;
            inner.epoch
        };
        self.shared.publish(SessionState::Restoring);

        match self.shared.load_and_refresh().await {
            Ok(Some((identity, access_token))) => {
                match self.shared.install(identity, &access_token, None, epoch) {
                    Ok(true) if self.activate(epoch) => {
                        tracing::info!("session restored");
                        SessionState::Authenticated
                    }
                    // A login or logout raced the restore and owns the session now.
                    Ok(_) => self.state(),
                    Err(e) => {
                        tracing::warn!("failed to persist restored session: {e}");
                        self.shared.end_session(epoch);
                        SessionState::Anonymous
                    }
                }
            }
            Ok(None) => {
                tracing::info!("no stored session");
                self.shared.end_session(epoch);
                self.state()
            }
            Err(e) => {
                tracing::warn!("session restore failed: {e}");
                self.shared.end_session(epoch);
                self.state()
            }
        }
    }

    /// Establish a session from a login grant, replacing any prior session.
    pub fn login(&self, identity: Identity, tokens: Tokens) -> Result<Session, AuthError> {
        let epoch = {
            let mut inner = self.shared.write();
            inner.epoch += 1;
            inner.epoch
        };

        match self.shared.install(
            identity,
            &tokens.access_token,
            Some(&tokens.refresh_token),
            epoch,
        ) {
            Ok(true) => {}
            Ok(false) => {
                return Err(AuthError::Malformed(
                    "login superseded by a newer session".into(),
                ));
            }
            Err(e) => {
                self.logout();
                return Err(e);
            }
        }

        if !self.activate(epoch) {
            return Err(AuthError::Malformed(
                "session ended before login completed".into(),
            ));
        }

        let session = self
            .session()
            .ok_or_else(|| AuthError::Malformed("session vanished during login".into()))?;
        tracing::info!(user_id = session.user.user_id, "logged in");
        Ok(session)
    }

    /// Log in against the auth server with email and password.
    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let grant = tokio::time::timeout(
            self.shared.options.request_timeout,
            self.shared.backend.login(email, password),
        )
        .await
        .map_err(|_| AuthError::Timeout)??;
        self.login(grant.identity, grant.tokens)
    }

    /// Clear the session in memory and in storage and stop renewal. Idempotent.
    pub fn logout(&self) {
        let epoch = self.shared.read().epoch;
        self.shared.end_session(epoch);
        tracing::info!("logged out");
    }

    /// Start the renewal task and announce `Authenticated`, cancelling any
    /// previous task first.
    ///
    /// Returns false and does nothing if the session for `epoch` has already
    /// been replaced. The renewal slot stays locked until the state is
    /// published, so a concurrent `end_session` always publishes after us.
    fn activate(&self, epoch: u64) -> bool {
        let mut slot = self
            .shared
            .renewal
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if self.shared.read().epoch != epoch {
            return false;
        }
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let weak: Weak<Shared<B, S>> = Arc::downgrade(&self.shared);
        let period = self.shared.options.renewal_interval;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(period) => {}
                }

                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let outcome = tokio::select! {
                    _ = token.cancelled() => break,
                    outcome = shared.renew(epoch) => outcome,
                };
                if outcome.is_err() {
                    break;
                }
            }
            tracing::debug!(epoch, "renewal task stopped");
        });

        *slot = Some(RenewalTask {
            cancel,
            _handle: handle,
        });
        self.shared.publish(SessionState::Authenticated);
        true
    }
}

impl<B, S> Shared<B, S>
where
    B: AuthBackend,
    S: SessionStore,
{
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: SessionState) {
        self.state_tx.send_replace(state);
    }

    async fn refresh_with_timeout(&self, refresh_token: &str) -> Result<String, AuthError> {
        tokio::time::timeout(
            self.options.request_timeout,
            self.backend.refresh(refresh_token),
        )
        .await
        .map_err(|_| AuthError::Timeout)?
    }

    /// Read the stored identity and refresh token and mint a fresh access token.
    async fn load_and_refresh(&self) -> Result<Option<(Identity, String)>, AuthError> {
        let user_json = self.store.get(USER_KEY)?;
        let refresh_token = self.store.get(REFRESH_TOKEN_KEY)?;
        let (Some(user_json), Some(refresh_token)) = (user_json, refresh_token) else {
            return Ok(None);
        };

        let identity: Identity = serde_json::from_str(&user_json)
            .map_err(|e| AuthError::Malformed(format!("stored user record: {e}")))?;
        let access_token = self.refresh_with_timeout(&refresh_token).await?;
        Ok(Some((identity, access_token)))
    }

    /// Persist and publish a session if `epoch` is still current.
    ///
    /// `refresh_token` is written only when given (login); restore keeps the stored one.
    fn install(
        &self,
        identity: Identity,
        access_token: &str,
        refresh_token: Option<&str>,
        epoch: u64,
    ) -> Result<bool, AuthError> {
        let user = merge_token_identity(identity, access_token);
        let user_json = serde_json::to_string(&user).map_err(StorageError::from)?;

        let mut inner = self.write();
        if inner.epoch != epoch {
            return Ok(false);
        }

        let mut entries = vec![(USER_KEY, user_json.as_str()), (ACCESS_TOKEN_KEY, access_token)];
        if let Some(refresh_token) = refresh_token {
            entries.push((REFRESH_TOKEN_KEY, refresh_token));
        }
        self.store.set_many(&entries)?;

        inner.session = Some(Session {
            user,
            access_token: access_token.to_string(),
        });
        inner.state = SessionState::Authenticated;
        Ok(true)
    }

    async fn renew(&self, epoch: u64) -> Result<(), AuthError> {
        let result = match self.store.get(REFRESH_TOKEN_KEY) {
            Ok(Some(refresh_token)) => self.refresh_with_timeout(&refresh_token).await,
            Ok(None) => Err(AuthError::Malformed("no refresh token stored".into())),
            Err(e) => Err(e.into()),
        };

        match result.and_then(|access_token| self.swap_access_token(epoch, access_token)) {
            Ok(()) => {
                tracing::debug!("access token renewed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!("access token renewal failed, ending session: {e}");
                self.end_session(epoch);
                Err(e)
            }
        }
    }

    fn swap_access_token(&self, epoch: u64, access_token: String) -> Result<(), AuthError> {
        let mut inner = self.write();
        if inner.epoch != epoch {
            return Ok(());
        }
        let Some(session) = inner.session.as_mut() else {
            return Ok(());
        };

        self.store.set(ACCESS_TOKEN_KEY, &access_token)?;
        if let Some(user_id) = jwt::user_id(&access_token) {
            session.user.user_id = user_id;
        }
        session.access_token = access_token;
        Ok(())
    }

    /// Stop renewal and clear memory and storage, unless a newer session exists.
    fn end_session(&self, epoch: u64) {
        {
            let mut inner = self.write();
            if inner.epoch != epoch {
                return;
            }
            inner.epoch += 1;
            inner.session = None;
            inner.state = SessionState::Anonymous;
        }

        let task = self
            .renewal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.cancel.cancel();
        }

        if let Err(e) = self.store.remove_many(&SESSION_KEYS) {
            tracing::warn!("failed to clear stored session: {e}");
        }
        self.publish(SessionState::Anonymous);
    }
}

impl<B, S> Credentials for SessionManager<B, S>
where
    B: AuthBackend + 'static,
    S: SessionStore + 'static,
{
    fn access_token(&self) -> Option<String> {
        self.shared
            .read()
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    fn user_id(&self) -> Option<u64> {
        self.shared.read().session.as_ref().map(|s| s.user.user_id)
    }
}

/// The access token is authoritative for the numeric user id.
fn merge_token_identity(mut identity: Identity, access_token: &str) -> Identity {
    if let Some(user_id) = jwt::user_id(access_token) {
        identity.user_id = user_id;
    }
    identity
}
