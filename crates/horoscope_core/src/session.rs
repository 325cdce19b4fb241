//! crates/horoscope_core/src/session.rs
//!
//! The session controller: single owner of `{user, profile, loading}`.
//!
//! It bootstraps the session at startup, follows auth-state change events
//! from the gateway, loads and self-heals the profile row, and exposes the
//! resulting state through a `tokio::sync::watch` channel. Gateway and
//! store failures never cross this boundary as errors: every network-bound
//! call is timeout-bounded and degrades to "no session" or "no profile"
//! so the application can never hang on a spinner.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, warn};
use uuid::Uuid;

use crate::domain::{AuthSession, AuthUser, NewProfile, Profile, ProfileChanges, Role};
use crate::ports::{AuthEvent, AuthGateway, PortError, ProfileStore};
use crate::router::AuthSnapshot;
use crate::zodiac;

//=========================================================================================
// Auth State
//=========================================================================================

/// The application-wide auth state.
///
/// Valid shapes: `(None, None, true)` while booting, `(None, None, false)`
/// signed out, `(Some, None, false)` signed in with the profile pending or
/// failed, `(Some, Some, false)` fully ready. A profile is never retained
/// across a user change: every transition re-fetches.
#[derive(Debug, Clone)]
pub struct AuthState {
    pub user: Option<AuthUser>,
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl AuthState {
    fn booting() -> Self {
        Self {
            user: None,
            profile: None,
            loading: true,
        }
    }

    /// The slice of this state the navigation router consumes.
    pub fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot {
            loading: self.loading,
            user_present: self.user.is_some(),
            role: self.profile.as_ref().map(|p| p.role),
        }
    }
}

/// Upper bounds on the gateway and store calls. The profile bound is kept
/// below the bootstrap bound so the profile load cannot outlive bootstrap.
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    pub bootstrap: Duration,
    pub profile: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            bootstrap: Duration::from_secs(8),
            profile: Duration::from_secs(5),
        }
    }
}

//=========================================================================================
// Flow Errors
//=========================================================================================

/// The single human-readable message a user-initiated auth flow can
/// surface to its form. Everything else is logged and swallowed.
#[derive(Debug, thiserror::Error)]
pub enum AuthFlowError {
    #[error("{0}")]
    Rejected(String),
    #[error("This account does not have {} access.", .required.as_str())]
    RoleMismatch { required: Role },
    #[error("Your profile could not be loaded. Please try again.")]
    ProfileUnavailable,
    #[error("You must be signed in to do that.")]
    NotSignedIn,
}

/// How a registration concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Session issued and profile row created.
    Complete,
    /// The provider requires email confirmation before issuing a session;
    /// no profile row exists yet.
    ConfirmationRequired,
}

/// The fields collected by the registration form.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub gender: String,
    pub date_of_birth: Option<String>,
}

//=========================================================================================
// Session Controller
//=========================================================================================

/// Owns [`AuthState`] and every mutation of it.
///
/// Constructed with its collaborators injected; there is no global
/// singleton. Consumers observe state via [`SessionController::subscribe`].
pub struct SessionController {
    auth: Arc<dyn AuthGateway>,
    profiles: Arc<dyn ProfileStore>,
    timeouts: SessionTimeouts,
    state: watch::Sender<AuthState>,
    /// Bumped on every user transition. An in-flight profile load captures
    /// the epoch at its start and is discarded if the epoch moved on,
    /// so a late completion can never overwrite newer state.
    epoch: AtomicU64,
}

impl SessionController {
    pub fn new(
        auth: Arc<dyn AuthGateway>,
        profiles: Arc<dyn ProfileStore>,
        timeouts: SessionTimeouts,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::booting());
        Self {
            auth,
            profiles,
            timeouts,
            state,
            epoch: AtomicU64::new(0),
        }
    }

    /// A receiver that yields every auth-state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// A clone of the current state.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    //-------------------------------------------------------------------------------------
    // Bootstrap and event handling
    //-------------------------------------------------------------------------------------

    /// Establishes the initial auth state. Runs once at startup.
    ///
    /// A hung or failed session fetch is treated as signed out, never as a
    /// user-facing error. `loading` is guaranteed to end up `false` on
    /// every path, and the profile load completes (or gives up) first.
    pub async fn bootstrap(&self) {
        let session = match timeout(self.timeouts.bootstrap, self.auth.current_session()).await {
            Err(_) => {
                warn!("session fetch timed out - treating as no session");
                None
            }
            Ok(Err(e)) => {
                error!("session fetch failed: {e}");
                None
            }
            Ok(Ok(session)) => session,
        };

        if let Some(session) = session {
            let epoch = self.begin_transition(Some(session.user.clone()));
            let profile = self.load_profile(session.user.id).await;
            self.apply_profile(epoch, profile);
        }

        self.state.send_modify(|s| s.loading = false);
    }

    /// Follows auth-state change events from the gateway until it closes.
    ///
    /// The returned handle must be aborted on teardown; together with the
    /// epoch guard this keeps a late event from resurrecting a dismantled
    /// controller's state.
    pub fn run(self: Arc<Self>) -> JoinHandle<()> {
        let controller = self;
        let mut events = controller.auth.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    // Bootstrap already performed the first session read;
                    // reacting here would double the initial profile load.
                    Ok(AuthEvent::InitialSession(_)) => {}
                    Ok(AuthEvent::SignedIn(session))
                    | Ok(AuthEvent::TokenRefreshed(session)) => {
                        controller.on_session_present(session).await;
                    }
                    Ok(AuthEvent::SignedOut) => {
                        controller.clear_session();
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "auth event stream lagged; re-reading the gateway");
                        controller.refresh_profile().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn on_session_present(&self, session: AuthSession) {
        let epoch = self.begin_transition(Some(session.user.clone()));
        let profile = self.load_profile(session.user.id).await;
        self.apply_profile(epoch, profile);
    }

    fn clear_session(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|s| {
            s.user = None;
            s.profile = None;
        });
    }

    /// Starts a user transition: bumps the epoch, installs the new user and
    /// drops any profile belonging to the previous one.
    fn begin_transition(&self, user: Option<AuthUser>) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| {
            s.user = user;
            s.profile = None;
        });
        epoch
    }

    /// Installs a loaded profile unless the controller has moved on to a
    /// different user (or signed out) since the load began.
    fn apply_profile(&self, epoch: u64, profile: Option<Profile>) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            warn!("discarding profile load that outlived its user transition");
            return;
        }
        self.state.send_modify(|s| s.profile = profile);
    }

    //-------------------------------------------------------------------------------------
    // Profile loading and self-healing
    //-------------------------------------------------------------------------------------

    /// Fetches the profile row for `user_id`, bounded by the profile
    /// timeout. Timeout, missing row and store errors all come back as
    /// `None`; the caller retries implicitly via [`Self::refresh_profile`].
    pub async fn load_profile(&self, user_id: Uuid) -> Option<Profile> {
        let fetched = match timeout(self.timeouts.profile, self.profiles.fetch_by_id(user_id)).await
        {
            Err(_) => {
                warn!(%user_id, "profile fetch timed out");
                return None;
            }
            Ok(Err(e)) => {
                error!(%user_id, "profile fetch failed: {e}");
                return None;
            }
            Ok(Ok(row)) => row?,
        };
        Some(self.heal_zodiac_sign(fetched))
    }

    /// Re-derives `zodiac_sign` from `date_of_birth` and repairs a stale
    /// stored value. The corrected profile is returned immediately; the
    /// write-back is a best-effort background task whose failure is only
    /// logged, since the in-memory value already took effect.
    fn heal_zodiac_sign(&self, mut profile: Profile) -> Profile {
        let Some(dob) = profile.date_of_birth.as_deref() else {
            return profile;
        };
        let computed = zodiac::sign_for_date(dob);
        if computed == profile.zodiac_sign {
            return profile;
        }

        warn!(
            id = %profile.id,
            stored = ?profile.zodiac_sign,
            corrected = ?computed,
            "repairing stale zodiac sign"
        );
        profile.zodiac_sign = computed;

        let profiles = Arc::clone(&self.profiles);
        let id = profile.id;
        tokio::spawn(async move {
            if let Err(e) = profiles.update_zodiac_sign(id, computed).await {
                warn!(%id, "zodiac sign correction write failed: {e}");
            }
        });

        profile
    }

    /// Re-reads the session from the gateway (local state may be stale
    /// right after an out-of-band mutation) and reloads the profile.
    pub async fn refresh_profile(&self) {
        let session = match timeout(self.timeouts.profile, self.auth.current_session()).await {
            Err(_) => {
                warn!("session re-read timed out");
                return;
            }
            Ok(Err(e)) => {
                error!("session re-read failed: {e}");
                return;
            }
            Ok(Ok(session)) => session,
        };

        if let Some(session) = session {
            let epoch = self.begin_transition(Some(session.user.clone()));
            let profile = self.load_profile(session.user.id).await;
            self.apply_profile(epoch, profile);
        }
    }

    /// Signs out remotely, then clears local state unconditionally: even a
    /// slow or failed gateway call must not leave a stale signed-in state.
    pub async fn sign_out(&self) {
        if let Err(e) = self.auth.sign_out().await {
            error!("gateway sign-out failed: {e}");
        }
        self.clear_session();
    }

    //-------------------------------------------------------------------------------------
    // User-initiated flows
    //-------------------------------------------------------------------------------------

    /// Credential sign-in through one of the two portals.
    ///
    /// The profile's role is validated against the requested portal; a
    /// mismatch signs the session back out rather than leaving an account
    /// signed in through the wrong surface.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        portal: Role,
    ) -> Result<Profile, AuthFlowError> {
        let session = self
            .auth
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| AuthFlowError::Rejected(rejection_message(e)))?;

        let epoch = self.begin_transition(Some(session.user.clone()));
        let profile = self.load_profile(session.user.id).await;
        self.apply_profile(epoch, profile.clone());

        let Some(profile) = profile else {
            // Row missing or fetch slow: a recoverable "not ready" state.
            // The session stays; the form may retry.
            return Err(AuthFlowError::ProfileUnavailable);
        };

        if profile.role != portal {
            self.sign_out().await;
            return Err(AuthFlowError::RoleMismatch { required: portal });
        }

        Ok(profile)
    }

    /// Registers a regular account: signs up, then creates the profile row
    /// with the zodiac sign derived from the submitted date of birth.
    pub async fn register(
        &self,
        registration: NewRegistration,
    ) -> Result<RegistrationOutcome, AuthFlowError> {
        let zodiac_sign = registration
            .date_of_birth
            .as_deref()
            .and_then(zodiac::sign_for_date);

        let outcome = self
            .auth
            .sign_up(&registration.email, &registration.password)
            .await
            .map_err(|e| AuthFlowError::Rejected(rejection_message(e)))?;

        if outcome.session.is_none() {
            return Ok(RegistrationOutcome::ConfirmationRequired);
        }

        self.profiles
            .insert(NewProfile {
                id: outcome.user.id,
                full_name: registration.full_name,
                gender: registration.gender,
                date_of_birth: registration.date_of_birth,
                zodiac_sign,
                role: Role::User,
            })
            .await
            .map_err(|e| AuthFlowError::Rejected(rejection_message(e)))?;

        self.refresh_profile().await;
        Ok(RegistrationOutcome::Complete)
    }

    /// Registers an admin account. The zodiac sign starts empty; a failed
    /// profile insert rolls the half-created session back out.
    pub async fn register_admin(
        &self,
        registration: NewRegistration,
    ) -> Result<RegistrationOutcome, AuthFlowError> {
        let outcome = self
            .auth
            .sign_up(&registration.email, &registration.password)
            .await
            .map_err(|e| AuthFlowError::Rejected(rejection_message(e)))?;

        if outcome.session.is_none() {
            return Ok(RegistrationOutcome::ConfirmationRequired);
        }

        let inserted = self
            .profiles
            .insert(NewProfile {
                id: outcome.user.id,
                full_name: registration.full_name,
                gender: registration.gender,
                date_of_birth: registration.date_of_birth,
                zodiac_sign: None,
                role: Role::Admin,
            })
            .await;

        if let Err(e) = inserted {
            self.sign_out().await;
            return Err(AuthFlowError::Rejected(rejection_message(e)));
        }

        self.refresh_profile().await;
        Ok(RegistrationOutcome::Complete)
    }

    /// Saves the settings form. The derived sign is recomputed from the
    /// edited date of birth; when the date is cleared the previous sign is
    /// kept, matching the settings page's behavior. Local state is only
    /// refreshed after the write succeeded.
    pub async fn save_profile(&self, mut changes: ProfileChanges) -> Result<(), AuthFlowError> {
        let user = self
            .state
            .borrow()
            .user
            .clone()
            .ok_or(AuthFlowError::NotSignedIn)?;

        changes.zodiac_sign = match changes.date_of_birth.as_deref() {
            Some(dob) => zodiac::sign_for_date(dob),
            None => self.state.borrow().profile.as_ref().and_then(|p| p.zodiac_sign),
        };

        self.profiles
            .update(user.id, changes)
            .await
            .map_err(|e| AuthFlowError::Rejected(rejection_message(e)))?;

        self.refresh_profile().await;
        Ok(())
    }

    /// Changes the password of the signed-in user.
    pub async fn change_password(&self, new_password: &str) -> Result<(), AuthFlowError> {
        self.auth
            .update_password(new_password)
            .await
            .map_err(|e| match e {
                PortError::Unauthorized => AuthFlowError::NotSignedIn,
                other => AuthFlowError::Rejected(rejection_message(other)),
            })
    }
}

/// Collapses a port error into the one line a form may display.
fn rejection_message(e: PortError) -> String {
    match e {
        PortError::Unauthorized => "Invalid email or password.".to_string(),
        PortError::NotFound(msg) | PortError::Unexpected(msg) => msg,
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortResult, SignUpOutcome};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn user(id: Uuid) -> AuthUser {
        AuthUser {
            id,
            email: "stargazer@example.com".to_string(),
        }
    }

    fn session(id: Uuid) -> AuthSession {
        AuthSession {
            user: user(id),
            created_at: Utc::now(),
        }
    }

    fn profile(id: Uuid, dob: &str, sign: Option<crate::domain::ZodiacSign>, role: Role) -> Profile {
        Profile {
            id,
            full_name: "Luna Vega".to_string(),
            gender: "female".to_string(),
            date_of_birth: Some(dob.to_string()),
            zodiac_sign: sign,
            role,
            created_at: Utc::now(),
        }
    }

    //-------------------------------------------------------------------------------------
    // In-memory mocks of the ports
    //-------------------------------------------------------------------------------------

    struct MockGateway {
        session: Mutex<Option<AuthSession>>,
        events: broadcast::Sender<AuthEvent>,
        hang: bool,
        /// Models a provider whose policy requires email confirmation:
        /// sign-up returns the user but withholds the session.
        confirmation_required: bool,
        sign_outs: AtomicUsize,
    }

    impl MockGateway {
        fn new(session: Option<AuthSession>) -> Self {
            let (events, _) = broadcast::channel(16);
            Self {
                session: Mutex::new(session),
                events,
                hang: false,
                confirmation_required: false,
                sign_outs: AtomicUsize::new(0),
            }
        }

        fn hanging() -> Self {
            let mut gw = Self::new(None);
            gw.hang = true;
            gw
        }

        fn emit(&self, event: AuthEvent) {
            let _ = self.events.send(event);
        }
    }

    #[async_trait]
    impl AuthGateway for MockGateway {
        async fn current_session(&self) -> PortResult<Option<AuthSession>> {
            if self.hang {
                futures_pending().await;
            }
            Ok(self.session.lock().unwrap().clone())
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }

        async fn sign_in_with_password(
            &self,
            _email: &str,
            _password: &str,
        ) -> PortResult<AuthSession> {
            self.session
                .lock()
                .unwrap()
                .clone()
                .ok_or(PortError::Unauthorized)
        }

        async fn sign_up(&self, email: &str, _password: &str) -> PortResult<SignUpOutcome> {
            let new = AuthSession {
                user: AuthUser {
                    id: Uuid::new_v4(),
                    email: email.to_string(),
                },
                created_at: Utc::now(),
            };
            if self.confirmation_required {
                return Ok(SignUpOutcome {
                    user: new.user,
                    session: None,
                });
            }
            *self.session.lock().unwrap() = Some(new.clone());
            Ok(SignUpOutcome {
                user: new.user.clone(),
                session: Some(new),
            })
        }

        async fn sign_out(&self) -> PortResult<()> {
            self.sign_outs.fetch_add(1, Ordering::SeqCst);
            *self.session.lock().unwrap() = None;
            Ok(())
        }

        async fn update_password(&self, _new_password: &str) -> PortResult<()> {
            if self.session.lock().unwrap().is_none() {
                return Err(PortError::Unauthorized);
            }
            Ok(())
        }
    }

    struct FailingGateway;

    #[async_trait]
    impl AuthGateway for FailingGateway {
        async fn current_session(&self) -> PortResult<Option<AuthSession>> {
            Err(PortError::Unexpected("gateway unreachable".into()))
        }
        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            broadcast::channel(1).1
        }
        async fn sign_in_with_password(&self, _: &str, _: &str) -> PortResult<AuthSession> {
            Err(PortError::Unauthorized)
        }
        async fn sign_up(&self, _: &str, _: &str) -> PortResult<SignUpOutcome> {
            Err(PortError::Unexpected("gateway unreachable".into()))
        }
        async fn sign_out(&self) -> PortResult<()> {
            Err(PortError::Unexpected("gateway unreachable".into()))
        }
        async fn update_password(&self, _: &str) -> PortResult<()> {
            Err(PortError::Unauthorized)
        }
    }

    async fn futures_pending() {
        std::future::pending::<()>().await;
    }

    #[derive(Default)]
    struct MockStore {
        rows: Mutex<HashMap<Uuid, Profile>>,
        fetch_delay: Option<Duration>,
        fail_fetch: bool,
        fail_insert: bool,
        fetches: AtomicUsize,
    }

    impl MockStore {
        fn with_profile(profile: Profile) -> Self {
            let store = Self::default();
            store.rows.lock().unwrap().insert(profile.id, profile);
            store
        }

        fn stored(&self, id: Uuid) -> Option<Profile> {
            self.rows.lock().unwrap().get(&id).cloned()
        }
    }

    #[async_trait]
    impl ProfileStore for MockStore {
        async fn fetch_by_id(&self, id: Uuid) -> PortResult<Option<Profile>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.fetch_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_fetch {
                return Err(PortError::Unexpected("store offline".into()));
            }
            Ok(self.stored(id))
        }

        async fn insert(&self, new: NewProfile) -> PortResult<()> {
            if self.fail_insert {
                return Err(PortError::Unexpected("store offline".into()));
            }
            let row = Profile {
                id: new.id,
                full_name: new.full_name,
                gender: new.gender,
                date_of_birth: new.date_of_birth,
                zodiac_sign: new.zodiac_sign,
                role: new.role,
                created_at: Utc::now(),
            };
            self.rows.lock().unwrap().insert(row.id, row);
            Ok(())
        }

        async fn update(&self, id: Uuid, changes: ProfileChanges) -> PortResult<()> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .get_mut(&id)
                .ok_or_else(|| PortError::NotFound(format!("profile {id}")))?;
            row.full_name = changes.full_name;
            row.gender = changes.gender;
            row.date_of_birth = changes.date_of_birth;
            row.zodiac_sign = changes.zodiac_sign;
            Ok(())
        }

        async fn update_zodiac_sign(
            &self,
            id: Uuid,
            sign: Option<crate::domain::ZodiacSign>,
        ) -> PortResult<()> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .get_mut(&id)
                .ok_or_else(|| PortError::NotFound(format!("profile {id}")))?;
            row.zodiac_sign = sign;
            Ok(())
        }

        async fn delete(&self, id: Uuid) -> PortResult<()> {
            self.rows.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn list_all(&self) -> PortResult<Vec<Profile>> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }

        async fn count_by_role(&self, role: Role) -> PortResult<i64> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.role == role)
                .count() as i64)
        }
    }

    fn controller(
        gateway: Arc<MockGateway>,
        store: Arc<MockStore>,
    ) -> SessionController {
        SessionController::new(gateway, store, SessionTimeouts::default())
    }

    //-------------------------------------------------------------------------------------
    // Bootstrap
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn bootstrap_with_session_loads_profile() {
        let id = Uuid::new_v4();
        let gateway = Arc::new(MockGateway::new(Some(session(id))));
        let store = Arc::new(MockStore::with_profile(profile(
            id,
            "1990-06-15",
            Some(crate::domain::ZodiacSign::Gemini),
            Role::User,
        )));
        let ctl = controller(gateway, store);

        ctl.bootstrap().await;

        let state = ctl.state();
        assert!(!state.loading);
        assert_eq!(state.user.unwrap().id, id);
        assert_eq!(state.profile.unwrap().id, id);
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_survives_a_hung_gateway() {
        let gateway = Arc::new(MockGateway::hanging());
        let store = Arc::new(MockStore::default());
        let ctl = controller(gateway, store);

        // The paused clock auto-advances; bootstrap must give up at its
        // timeout bound and land in the signed-out state.
        ctl.bootstrap().await;

        let state = ctl.state();
        assert!(!state.loading);
        assert!(state.user.is_none());
        assert!(state.profile.is_none());
    }

    #[tokio::test]
    async fn bootstrap_swallows_gateway_errors() {
        let ctl = SessionController::new(
            Arc::new(FailingGateway),
            Arc::new(MockStore::default()),
            SessionTimeouts::default(),
        );
        ctl.bootstrap().await;

        let state = ctl.state();
        assert!(!state.loading);
        assert!(state.user.is_none());
    }

    //-------------------------------------------------------------------------------------
    // Profile loading and self-healing
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn load_profile_repairs_stale_zodiac_sign() {
        let id = Uuid::new_v4();
        let gateway = Arc::new(MockGateway::new(None));
        // Gemini birthday stored with an Aries sign.
        let store = Arc::new(MockStore::with_profile(profile(
            id,
            "1990-06-15",
            Some(crate::domain::ZodiacSign::Aries),
            Role::User,
        )));
        let ctl = controller(gateway, Arc::clone(&store));

        // The corrected profile comes back immediately, without waiting on
        // the background write.
        let loaded = ctl.load_profile(id).await.unwrap();
        assert_eq!(loaded.zodiac_sign, Some(crate::domain::ZodiacSign::Gemini));

        // The write-back eventually lands in the store.
        for _ in 0..50 {
            tokio::task::yield_now().await;
            if store.stored(id).unwrap().zodiac_sign
                == Some(crate::domain::ZodiacSign::Gemini)
            {
                return;
            }
        }
        panic!("correction write never reached the store");
    }

    #[tokio::test]
    async fn load_profile_returns_none_on_store_error() {
        let id = Uuid::new_v4();
        let gateway = Arc::new(MockGateway::new(None));
        let store = Arc::new(MockStore {
            fail_fetch: true,
            ..Default::default()
        });
        let ctl = controller(gateway, store);

        assert!(ctl.load_profile(id).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn load_profile_returns_none_on_timeout() {
        let id = Uuid::new_v4();
        let gateway = Arc::new(MockGateway::new(None));
        let store = Arc::new(MockStore {
            fetch_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let ctl = controller(gateway, store);

        assert!(ctl.load_profile(id).await.is_none());
    }

    //-------------------------------------------------------------------------------------
    // Event handling and liveness
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn signed_in_event_loads_profile_and_initial_session_is_ignored() {
        let id = Uuid::new_v4();
        let gateway = Arc::new(MockGateway::new(Some(session(id))));
        let store = Arc::new(MockStore::with_profile(profile(
            id,
            "1990-06-15",
            Some(crate::domain::ZodiacSign::Gemini),
            Role::User,
        )));
        let ctl = Arc::new(controller(Arc::clone(&gateway), Arc::clone(&store)));
        let events = Arc::clone(&ctl).run();

        gateway.emit(AuthEvent::InitialSession(Some(session(id))));
        gateway.emit(AuthEvent::SignedIn(session(id)));

        let mut state_rx = ctl.subscribe();
        let ready = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if state_rx.borrow().profile.is_some() {
                    break;
                }
                state_rx.changed().await.unwrap();
            }
        })
        .await;
        assert!(ready.is_ok(), "profile never arrived");

        // Only the SignedIn event fetched; InitialSession stayed inert.
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);

        events.abort();
    }

    #[tokio::test]
    async fn signed_out_event_clears_state() {
        let id = Uuid::new_v4();
        let gateway = Arc::new(MockGateway::new(Some(session(id))));
        let store = Arc::new(MockStore::with_profile(profile(
            id,
            "1990-06-15",
            Some(crate::domain::ZodiacSign::Gemini),
            Role::User,
        )));
        let ctl = Arc::new(controller(Arc::clone(&gateway), store));
        let events = Arc::clone(&ctl).run();
        ctl.bootstrap().await;
        assert!(ctl.state().profile.is_some());

        gateway.emit(AuthEvent::SignedOut);

        let mut state_rx = ctl.subscribe();
        let cleared = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if state_rx.borrow().user.is_none() {
                    break;
                }
                state_rx.changed().await.unwrap();
            }
        })
        .await;
        assert!(cleared.is_ok(), "state never cleared");
        assert!(ctl.state().profile.is_none());

        events.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn late_profile_load_is_discarded_after_sign_out() {
        let id = Uuid::new_v4();
        let gateway = Arc::new(MockGateway::new(Some(session(id))));
        // Make the fetch slow enough that the sign-out lands mid-flight.
        let mut store = MockStore::with_profile(profile(
            id,
            "1990-06-15",
            Some(crate::domain::ZodiacSign::Gemini),
            Role::User,
        ));
        store.fetch_delay = Some(Duration::from_secs(2));
        let store = Arc::new(store);
        let ctl = Arc::new(controller(Arc::clone(&gateway), store));

        let refresher = {
            let ctl = Arc::clone(&ctl);
            tokio::spawn(async move { ctl.refresh_profile().await })
        };
        tokio::task::yield_now().await;
        ctl.sign_out().await;
        refresher.await.unwrap();

        // The fetch finished after the sign-out; its result must not be
        // applied.
        let state = ctl.state();
        assert!(state.user.is_none());
        assert!(state.profile.is_none());
    }

    //-------------------------------------------------------------------------------------
    // Sign-out and flows
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn sign_out_clears_state_even_when_gateway_fails() {
        let id = Uuid::new_v4();
        let store = Arc::new(MockStore::with_profile(profile(
            id,
            "1990-06-15",
            Some(crate::domain::ZodiacSign::Gemini),
            Role::User,
        )));
        let ctl = SessionController::new(
            Arc::new(FailingGateway),
            store,
            SessionTimeouts::default(),
        );

        ctl.sign_out().await;

        let state = ctl.state();
        assert!(state.user.is_none());
        assert!(state.profile.is_none());
    }

    #[tokio::test]
    async fn sign_in_validates_portal_role() {
        let id = Uuid::new_v4();
        let gateway = Arc::new(MockGateway::new(Some(session(id))));
        let store = Arc::new(MockStore::with_profile(profile(
            id,
            "1990-06-15",
            Some(crate::domain::ZodiacSign::Gemini),
            Role::User,
        )));
        let ctl = controller(Arc::clone(&gateway), store);

        // A regular account through the admin portal is rejected and the
        // session rolled back.
        let err = ctl
            .sign_in("stargazer@example.com", "pw", Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthFlowError::RoleMismatch { required: Role::Admin }));
        assert_eq!(gateway.sign_outs.load(Ordering::SeqCst), 1);
        assert!(ctl.state().user.is_none());
    }

    #[tokio::test]
    async fn sign_in_through_matching_portal_succeeds() {
        let id = Uuid::new_v4();
        let gateway = Arc::new(MockGateway::new(Some(session(id))));
        let store = Arc::new(MockStore::with_profile(profile(
            id,
            "1990-06-15",
            Some(crate::domain::ZodiacSign::Gemini),
            Role::User,
        )));
        let ctl = controller(gateway, store);

        let profile = ctl
            .sign_in("stargazer@example.com", "pw", Role::User)
            .await
            .unwrap();
        assert_eq!(profile.role, Role::User);
        assert!(ctl.state().profile.is_some());
    }

    #[tokio::test]
    async fn register_derives_sign_and_creates_profile() {
        let gateway = Arc::new(MockGateway::new(None));
        let store = Arc::new(MockStore::default());
        let ctl = controller(gateway, Arc::clone(&store));

        let outcome = ctl
            .register(NewRegistration {
                email: "new@example.com".to_string(),
                password: "pw".to_string(),
                full_name: "Nova Star".to_string(),
                gender: "other".to_string(),
                date_of_birth: Some("1990-06-15".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(outcome, RegistrationOutcome::Complete);
        let rows = store.list_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].zodiac_sign, Some(crate::domain::ZodiacSign::Gemini));
        assert_eq!(rows[0].role, Role::User);
    }

    #[tokio::test]
    async fn register_without_session_reports_confirmation_required() {
        let mut gateway = MockGateway::new(None);
        gateway.confirmation_required = true;
        let gateway = Arc::new(gateway);
        let store = Arc::new(MockStore::default());
        let ctl = controller(gateway, Arc::clone(&store));

        let outcome = ctl
            .register(NewRegistration {
                email: "new@example.com".to_string(),
                password: "pw".to_string(),
                full_name: "Nova Star".to_string(),
                gender: "other".to_string(),
                date_of_birth: Some("1990-06-15".to_string()),
            })
            .await
            .unwrap();

        // No session means no profile row yet; it is created once the
        // account is confirmed and signs in.
        assert_eq!(outcome, RegistrationOutcome::ConfirmationRequired);
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(ctl.state().user.is_none());
    }

    #[tokio::test]
    async fn failed_admin_profile_insert_rolls_the_session_back() {
        let gateway = Arc::new(MockGateway::new(None));
        let store = Arc::new(MockStore {
            fail_insert: true,
            ..Default::default()
        });
        let ctl = controller(Arc::clone(&gateway), store);

        let err = ctl
            .register_admin(NewRegistration {
                email: "admin@example.com".to_string(),
                password: "pw".to_string(),
                full_name: "Vera Orion".to_string(),
                gender: "female".to_string(),
                date_of_birth: None,
            })
            .await
            .unwrap_err();

        // The half-created account must not stay signed in without its
        // profile row.
        assert!(matches!(err, AuthFlowError::Rejected(_)));
        assert_eq!(gateway.sign_outs.load(Ordering::SeqCst), 1);
        assert!(ctl.state().user.is_none());
    }

    #[tokio::test]
    async fn save_profile_recomputes_sign_and_refreshes() {
        let id = Uuid::new_v4();
        let gateway = Arc::new(MockGateway::new(Some(session(id))));
        let store = Arc::new(MockStore::with_profile(profile(
            id,
            "1990-06-15",
            Some(crate::domain::ZodiacSign::Gemini),
            Role::User,
        )));
        let ctl = controller(gateway, Arc::clone(&store));
        ctl.bootstrap().await;

        ctl.save_profile(ProfileChanges {
            full_name: "Luna Vega".to_string(),
            gender: "female".to_string(),
            date_of_birth: Some("1990-07-30".to_string()),
            zodiac_sign: None,
        })
        .await
        .unwrap();

        // The stored row and the refreshed local state both carry the
        // recomputed sign.
        assert_eq!(
            store.stored(id).unwrap().zodiac_sign,
            Some(crate::domain::ZodiacSign::Leo)
        );
        assert_eq!(
            ctl.state().profile.unwrap().zodiac_sign,
            Some(crate::domain::ZodiacSign::Leo)
        );
    }
}
