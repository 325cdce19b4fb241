//! crates/horoscope_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or a
//! hosted identity provider.

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{
    AuthSession, AuthUser, NewProfile, Profile, ProfileChanges, Role, SignContent,
    SignContentChanges, ZodiacSign,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Auth Gateway Events
//=========================================================================================

/// An auth-state change pushed by the gateway to its subscribers.
///
/// `InitialSession` mirrors the synthetic event identity providers emit when a
/// subscription attaches: the session controller must ignore it, because the
/// bootstrap path already handles the first session read.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    InitialSession(Option<AuthSession>),
    SignedIn(AuthSession),
    SignedOut,
    TokenRefreshed(AuthSession),
}

/// The outcome of a sign-up. The session is absent when the provider's
/// policy requires email confirmation before issuing one.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Identity provider contract: session issuance and observation.
///
/// Every method may fail or hang; callers are expected to bound each call
/// with a timeout and degrade to "no session" rather than surface an error.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Reads the currently established session, if any.
    async fn current_session(&self) -> PortResult<Option<AuthSession>>;

    /// Subscribes to auth-state changes (sign-in, sign-out, token refresh).
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> PortResult<AuthSession>;

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<SignUpOutcome>;

    async fn sign_out(&self) -> PortResult<()>;

    /// Changes the password of the currently signed-in user.
    async fn update_password(&self, new_password: &str) -> PortResult<()>;
}

/// Persistence contract for profile rows.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetches a profile by its auth user id. A missing row is `Ok(None)`,
    /// not an error: the row may legitimately not exist yet right after
    /// sign-up.
    async fn fetch_by_id(&self, id: Uuid) -> PortResult<Option<Profile>>;

    async fn insert(&self, profile: NewProfile) -> PortResult<()>;

    /// Overwrites the editable field set of a profile.
    async fn update(&self, id: Uuid, changes: ProfileChanges) -> PortResult<()>;

    /// Writes only the derived zodiac sign. Used by the self-healing
    /// correction so it cannot clobber concurrent edits to other fields.
    async fn update_zodiac_sign(&self, id: Uuid, sign: Option<ZodiacSign>) -> PortResult<()>;

    async fn delete(&self, id: Uuid) -> PortResult<()>;

    // Admin surface.
    async fn list_all(&self) -> PortResult<Vec<Profile>>;
    async fn count_by_role(&self, role: Role) -> PortResult<i64>;
}

/// Persistence contract for the per-sign editorial content shown on the
/// horoscope pages and edited from the admin panel.
#[async_trait]
pub trait SignContentStore: Send + Sync {
    async fn list_signs(&self) -> PortResult<Vec<SignContent>>;

    async fn fetch_sign(&self, sign: ZodiacSign) -> PortResult<Option<SignContent>>;

    async fn update_sign(&self, sign: ZodiacSign, changes: SignContentChanges)
        -> PortResult<()>;
}
