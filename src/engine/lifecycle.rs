//! Token Lifecycle Engine
//!
//! Owns the in-memory credential, decides whether the cached token is usable,
//! orchestrates refresh and code exchanges, and publishes every committed change.
//!
//! All exchanges run on their own task behind a single gate. Concurrent callers
//! that need a token join the refresh or code exchange already in flight. Every
//! exchange captures the credential generation when it starts; a result whose
//! generation no longer matches (logout, implicit install) is discarded instead
//! of committed.

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::engine::persist::Persister;
use crate::error::{ExchangeError, ReauthReason, TokenError, TokenResult};
use crate::exchange::TokenExchanger;
use crate::notify::{TokenNotifier, TokenSubscription};
use crate::store::TokenStore;
use crate::telemetry::{NoOpMetrics, TokenMetrics};
use crate::types::{
    AccessToken, ClientCredentials, Credential, Grant, TokenEvent, TokenState,
    DEFAULT_REFRESH_BUFFER_SECS,
};

type PendingExchange = Shared<BoxFuture<'static, TokenResult<AccessToken>>>;

/// Engine tuning.
#[derive(Clone)]
pub struct EngineOptions {
    /// Tokens are unusable this long before they expire (default: 5 minutes).
    pub refresh_buffer: Duration,
    /// Metrics sink.
    pub metrics: Arc<dyn TokenMetrics>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            refresh_buffer: Duration::from_secs(DEFAULT_REFRESH_BUFFER_SECS),
            metrics: Arc::new(NoOpMetrics),
        }
    }
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("refresh_buffer", &self.refresh_buffer)
            .finish_non_exhaustive()
    }
}

struct EngineState {
    credential: Credential,
    /// Bumped whenever the credential is replaced outside an exchange.
    generation: u64,
    /// Bumped on every commit; carried by change events.
    sequence: u64,
    refresh_failed: bool,
    in_flight: Option<PendingExchange>,
    /// Latest code exchange still running, keyed by its id.
    code_exchange: Option<(u64, PendingExchange)>,
    code_exchange_ids: u64,
}

enum Waiting {
    Refresh(PendingExchange),
    CodeExchange(u64, PendingExchange),
}

enum Persist {
    Save,
    Clear,
}

struct Inner {
    client: ClientCredentials,
    exchanger: Arc<dyn TokenExchanger>,
    refresh_buffer: chrono::Duration,
    state: Mutex<EngineState>,
    gate: tokio::sync::Mutex<()>,
    notifier: TokenNotifier,
    persister: Persister,
    changes: watch::Sender<u64>,
    metrics: Arc<dyn TokenMetrics>,
}

/// Token lifecycle engine. Cheap to clone; clones share one credential.
#[derive(Clone)]
pub struct TokenLifecycleEngine {
    inner: Arc<Inner>,
}

impl TokenLifecycleEngine {
    /// Load the persisted credential and start the engine.
    ///
    /// A store that cannot be read is logged and treated as empty.
    pub async fn open(
        client: ClientCredentials,
        exchanger: Arc<dyn TokenExchanger>,
        store: Arc<dyn TokenStore>,
        options: EngineOptions,
    ) -> Self {
        let credential = match store.load().await {
            Ok(credential) => credential,
            Err(e) => {
                error!(error = %e, "Failed to load persisted credential, starting signed out");
                Credential::empty()
            }
        };

        let refresh_buffer = chrono::Duration::from_std(options.refresh_buffer)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_REFRESH_BUFFER_SECS as i64));

        info!(
            has_access_token = !credential.is_empty(),
            has_refresh_token = credential.has_refresh_token(),
            encrypted = store.is_encrypted(),
            "Token engine started"
        );

        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                client,
                exchanger,
                refresh_buffer,
                state: Mutex::new(EngineState {
                    credential,
                    generation: 0,
                    sequence: 0,
                    refresh_failed: false,
                    in_flight: None,
                    code_exchange: None,
                    code_exchange_ids: 0,
                }),
                gate: tokio::sync::Mutex::new(()),
                notifier: TokenNotifier::new(),
                persister: Persister::spawn(store, options.metrics.clone()),
                changes,
                metrics: options.metrics,
            }),
        }
    }

    /// Return a usable access token, refreshing it first if needed.
    ///
    /// A cache hit never touches the network. While a refresh or code exchange
    /// is in flight, callers wait for it and share its outcome.
    pub async fn get_valid_token(&self) -> TokenResult<AccessToken> {
        loop {
            let waiting = {
                let mut state = self.inner.lock_state();
                if let Some(token) = self.usable_token(&state) {
                    trace!("Access token served from cache");
                    self.inner.metrics.record_cache_hit();
                    return Ok(token);
                }
                match state.code_exchange.clone() {
                    Some((id, exchange)) => {
                        trace!("Waiting for code exchange in flight");
                        self.inner.metrics.record_coalesced_wait();
                        Waiting::CodeExchange(id, exchange)
                    }
                    None if state.credential.is_empty() => {
                        return Err(TokenError::NeedsReauth(ReauthReason::NoCredential));
                    }
                    None => Waiting::Refresh(self.start_refresh(&mut state, false)?),
                }
            };

            match waiting {
                Waiting::Refresh(pending) => return pending.await,
                Waiting::CodeExchange(id, exchange) => {
                    if let Ok(token) = exchange.await {
                        return Ok(token);
                    }
                    // A failed exchange leaves the credential as it was; decide again.
                    self.inner.lock_state().finish_code_exchange(id);
                }
            }
        }
    }

    /// Refresh now, even if the cached token is still usable.
    pub async fn refresh(&self) -> TokenResult<AccessToken> {
        let pending = {
            let mut state = self.inner.lock_state();
            if state.credential.is_empty() {
                return Err(TokenError::NeedsReauth(ReauthReason::NoCredential));
            }
            self.start_refresh(&mut state, true)?
        };
        pending.await
    }

    /// Trade an authorization code for a new credential.
    ///
    /// On failure the current credential is left untouched. The exchange runs
    /// to completion even if the returned future is dropped.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> TokenResult<AccessToken> {
        let pending = {
            let mut state = self.inner.lock_state();
            state.code_exchange_ids += 1;
            let id = state.code_exchange_ids;
            let task = tokio::spawn(self.clone().run_code_exchange(
                id,
                code.to_string(),
                redirect_uri.to_string(),
            ));
            let pending = share(task, "Code exchange");
            state.code_exchange = Some((id, pending.clone()));
            pending
        };
        pending.await
    }

    async fn run_code_exchange(
        self,
        id: u64,
        code: String,
        redirect_uri: String,
    ) -> TokenResult<AccessToken> {
        let _gate = self.inner.gate.lock().await;
        let result = self.exchange_code_locked(&code, &redirect_uri).await;
        self.inner.lock_state().finish_code_exchange(id);
        result
    }

    async fn exchange_code_locked(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> TokenResult<AccessToken> {
        let generation = self.inner.lock_state().generation;
        let issued_at = Utc::now();

        debug!(redirect_uri, "Exchanging authorization code");
        let result = self
            .inner
            .exchanger
            .exchange(
                Grant::AuthorizationCode {
                    code: code.to_string(),
                    redirect_uri: redirect_uri.to_string(),
                },
                &self.inner.client,
            )
            .await;

        let mut state = self.inner.lock_state();
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.log_exchange_failure("authorization_code", &e);
                return Err(TokenError::Exchange(e));
            }
        };

        if state.generation != generation {
            info!("Discarding code exchange result, credential changed while in flight");
            self.inner
                .metrics
                .record_exchange("authorization_code", "discarded");
            return Err(TokenError::NeedsReauth(ReauthReason::Superseded));
        }

        self.inner
            .metrics
            .record_exchange("authorization_code", "success");
        if response.refresh_token.as_deref().map_or(true, str::is_empty) {
            warn!("Code exchange returned no refresh token, re-authorization needed at expiry");
        }

        state.generation += 1;
        let credential = Credential::from_code_response(&response, issued_at);
        self.commit(&mut state, credential, Persist::Save);
        info!(expires_in = response.expires_in, "Authorization code exchanged");
        state
            .credential
            .access()
            .ok_or(TokenError::NeedsReauth(ReauthReason::NoCredential))
    }

    /// Install a token obtained through the implicit grant.
    ///
    /// The credential has no refresh token. Any exchange in flight is discarded.
    pub fn install_implicit_token(&self, access_token: String, expires_in: u64) -> AccessToken {
        let credential = Credential::implicit(access_token, expires_in, Utc::now());
        let token = AccessToken::new(
            credential.access_token.clone().unwrap_or_default(),
            credential.expires_at,
        );

        let mut state = self.inner.lock_state();
        state.generation += 1;
        self.commit(&mut state, credential, Persist::Save);
        info!(expires_in, "Implicit grant token installed");
        token
    }

    /// Forget the credential, persist the cleared state and notify "no token".
    ///
    /// An exchange still in flight cannot resurrect the cleared credential.
    pub fn logout(&self) {
        let mut state = self.inner.lock_state();
        state.generation += 1;
        state.code_exchange = None;
        self.commit(&mut state, Credential::empty(), Persist::Clear);
        info!("Logged out");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TokenState {
        let state = self.inner.lock_state();
        if state.credential.is_empty() {
            TokenState::Empty
        } else if state.refresh_failed {
            TokenState::RefreshFailed
        } else if state
            .credential
            .is_usable_at(Utc::now(), self.inner.refresh_buffer)
        {
            TokenState::Valid
        } else {
            TokenState::Expiring
        }
    }

    /// Snapshot of the current credential.
    pub fn credential(&self) -> Credential {
        self.inner.lock_state().credential.clone()
    }

    /// Check if a usable token is cached.
    pub fn is_authenticated(&self) -> bool {
        self.state() == TokenState::Valid
    }

    /// Subscribe to token changes, replacing any previous subscriber.
    ///
    /// The first event carries the current value.
    pub fn subscribe(&self) -> TokenSubscription {
        let state = self.inner.lock_state();
        let subscription = self.inner.notifier.subscribe(TokenEvent {
            sequence: state.sequence,
            access_token: state.credential.access(),
        });
        self.inner.metrics.record_notification();
        subscription
    }

    /// Wait until every committed change has reached the store.
    pub async fn flush(&self) {
        self.inner.persister.flush().await;
    }

    /// Refresh deadline: `expires_at - buffer`, if a refresh is possible.
    pub(crate) fn next_refresh_at(&self) -> Option<chrono::DateTime<Utc>> {
        let state = self.inner.lock_state();
        if state.credential.is_empty() || !state.credential.has_refresh_token() {
            return None;
        }
        Some(state.credential.expires_at - self.inner.refresh_buffer)
    }

    /// Receiver that changes on every commit.
    pub(crate) fn watch_changes(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    fn usable_token(&self, state: &EngineState) -> Option<AccessToken> {
        if state.refresh_failed
            || !state
                .credential
                .is_usable_at(Utc::now(), self.inner.refresh_buffer)
        {
            return None;
        }
        state.credential.access()
    }

    fn start_refresh(&self, state: &mut EngineState, force: bool) -> TokenResult<PendingExchange> {
        if let Some(pending) = &state.in_flight {
            trace!("Joining refresh already in flight");
            self.inner.metrics.record_coalesced_wait();
            return Ok(pending.clone());
        }

        if !state.credential.has_refresh_token() {
            debug!("Token expiring and no refresh token available");
            return Err(TokenError::NeedsReauth(ReauthReason::NoRefreshToken));
        }

        // The task only touches state after this lock is released, so the slot
        // is always filled before it can be cleared.
        let task = tokio::spawn(self.clone().run_refresh(force));
        let pending = share(task, "Refresh");
        state.in_flight = Some(pending.clone());
        Ok(pending)
    }

    async fn run_refresh(self, force: bool) -> TokenResult<AccessToken> {
        let _gate = self.inner.gate.lock().await;
        let result = self.refresh_locked(force).await;
        self.inner.lock_state().in_flight = None;
        result
    }

    async fn refresh_locked(&self, force: bool) -> TokenResult<AccessToken> {
        let (generation, refresh_token) = {
            let state = self.inner.lock_state();
            if state.credential.is_empty() {
                return Err(TokenError::NeedsReauth(ReauthReason::NoCredential));
            }
            // A code exchange may have installed a fresh token while this waited.
            if !force {
                if let Some(token) = self.usable_token(&state) {
                    return Ok(token);
                }
            }
            match state.credential.refresh_token.clone() {
                Some(refresh_token) => (state.generation, refresh_token),
                None => return Err(TokenError::NeedsReauth(ReauthReason::NoRefreshToken)),
            }
        };
        let issued_at = Utc::now();

        debug!("Refreshing access token");
        let result = self
            .inner
            .exchanger
            .exchange(Grant::RefreshToken { refresh_token }, &self.inner.client)
            .await;

        let mut state = self.inner.lock_state();
        if state.generation != generation {
            info!("Discarding refresh result, credential changed while in flight");
            self.inner.metrics.record_exchange("refresh_token", "discarded");
            return self
                .usable_token(&state)
                .ok_or(TokenError::NeedsReauth(ReauthReason::Superseded));
        }

        match result {
            Ok(response) => {
                self.inner.metrics.record_exchange("refresh_token", "success");
                let credential = state.credential.refreshed(&response, issued_at);
                self.commit(&mut state, credential, Persist::Save);
                info!(expires_in = response.expires_in, "Access token refreshed");
                state
                    .credential
                    .access()
                    .ok_or(TokenError::NeedsReauth(ReauthReason::NoCredential))
            }
            Err(ExchangeError::InvalidGrant { description }) => {
                warn!(?description, "Refresh token rejected, clearing credential");
                self.inner
                    .metrics
                    .record_exchange("refresh_token", "invalid_grant");
                self.commit(&mut state, Credential::empty(), Persist::Clear);
                Err(TokenError::NeedsReauth(ReauthReason::RefreshTokenRejected))
            }
            Err(e) => {
                self.log_exchange_failure("refresh_token", &e);
                state.refresh_failed = true;
                Err(TokenError::Transient {
                    message: e.to_string(),
                })
            }
        }
    }

    fn log_exchange_failure(&self, grant_type: &str, error: &ExchangeError) {
        match error {
            ExchangeError::MalformedResponse { message } => {
                error!(grant_type, message = %message, "Token endpoint returned malformed response");
                self.inner.metrics.record_exchange(grant_type, "malformed");
            }
            ExchangeError::InvalidGrant { description } => {
                warn!(grant_type, ?description, "Grant rejected by token endpoint");
                self.inner.metrics.record_exchange(grant_type, "invalid_grant");
            }
            ExchangeError::Transient { status, reason } => {
                warn!(grant_type, ?status, reason = %reason, "Token exchange failed");
                self.inner.metrics.record_exchange(grant_type, "transient");
            }
        }
    }

    /// Replace the credential, queue persistence and publish, as one step.
    fn commit(&self, state: &mut EngineState, credential: Credential, persist: Persist) {
        state.credential = credential;
        state.refresh_failed = false;
        state.sequence += 1;

        match persist {
            Persist::Save => self.inner.persister.save(state.credential.clone()),
            Persist::Clear => self.inner.persister.clear(),
        }

        let event = TokenEvent {
            sequence: state.sequence,
            access_token: state.credential.access(),
        };
        if self.inner.notifier.publish(event) {
            self.inner.metrics.record_notification();
        }
        self.inner.changes.send_replace(state.sequence);
    }
}

impl EngineState {
    fn finish_code_exchange(&mut self, id: u64) {
        if matches!(&self.code_exchange, Some((current, _)) if *current == id) {
            self.code_exchange = None;
        }
    }
}

/// Shared handle on an exchange task; every clone resolves to the same outcome.
fn share(task: JoinHandle<TokenResult<AccessToken>>, kind: &'static str) -> PendingExchange {
    async move {
        task.await.unwrap_or_else(|e| {
            Err(TokenError::Transient {
                message: format!("{} task failed: {}", kind, e),
            })
        })
    }
    .boxed()
    .shared()
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for TokenLifecycleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLifecycleEngine")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
