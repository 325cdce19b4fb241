//! services/portal/src/adapters/auth.rs
//!
//! The identity-provider adapter: a concrete `AuthGateway` backed by the
//! `credentials` and `auth_sessions` tables. One instance serves one
//! connected client and tracks that client's established session, pushing
//! sign-in/sign-out changes to subscribers the way a hosted auth provider
//! would.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use tokio::sync::{broadcast, RwLock};
use tracing::error;
use uuid::Uuid;

use horoscope_core::domain::{AuthSession, AuthUser};
use horoscope_core::ports::{AuthEvent, AuthGateway, PortError, PortResult, SignUpOutcome};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Per-client auth gateway over the shared connection pool.
pub struct PgAuthGateway {
    pool: PgPool,
    session_ttl: Duration,
    /// The session token this client currently holds, if any.
    current: RwLock<Option<String>>,
    events: broadcast::Sender<AuthEvent>,
}

impl PgAuthGateway {
    /// Creates a gateway, optionally resuming a previously issued session
    /// token (e.g. one the client kept from an earlier connection).
    pub fn new(pool: PgPool, session_ttl_days: i64, resume_token: Option<String>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            pool,
            session_ttl: Duration::days(session_ttl_days),
            current: RwLock::new(resume_token),
            events,
        }
    }

    /// The token backing the current session, for the client to keep and
    /// for bearer-authenticated REST calls.
    pub async fn session_token(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    /// Emits the synthetic initial-session event a hosted provider sends
    /// right after a subscription attaches. The session controller ignores
    /// it; bootstrap owns the first session read.
    pub async fn announce_initial_session(&self) {
        let session = self.current_session().await.unwrap_or(None);
        let _ = self.events.send(AuthEvent::InitialSession(session));
    }

    async fn load_session(&self, token: &str) -> PortResult<Option<AuthSession>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT s.created_at, c.user_id, c.email \
             FROM auth_sessions s JOIN credentials c ON c.user_id = s.user_id \
             WHERE s.token = $1 AND s.expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.map(SessionRecord::to_domain))
    }

    /// Issues a fresh session row for `user` and makes it current.
    async fn issue_session(&self, user: AuthUser) -> PortResult<AuthSession> {
        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + self.session_ttl;

        sqlx::query(
            "INSERT INTO auth_sessions (token, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&token)
        .bind(user.id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        *self.current.write().await = Some(token);
        Ok(AuthSession {
            user,
            created_at: Utc::now(),
        })
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CredentialRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct SessionRecord {
    created_at: DateTime<Utc>,
    user_id: Uuid,
    email: String,
}

impl SessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            user: AuthUser {
                id: self.user_id,
                email: self.email,
            },
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `AuthGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthGateway for PgAuthGateway {
    async fn current_session(&self) -> PortResult<Option<AuthSession>> {
        let token = match self.current.read().await.clone() {
            Some(token) => token,
            None => return Ok(None),
        };

        let session = self.load_session(&token).await?;
        if session.is_none() {
            // Expired or revoked; drop the stale token.
            *self.current.write().await = None;
        }
        Ok(session)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> PortResult<AuthSession> {
        let credential = sqlx::query_as::<_, CredentialRecord>(
            "SELECT user_id, email, hashed_password FROM credentials WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .ok_or(PortError::Unauthorized)?;

        let parsed_hash = PasswordHash::new(&credential.hashed_password).map_err(|e| {
            error!("Failed to parse password hash: {:?}", e);
            PortError::Unexpected("Authentication error".to_string())
        })?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            return Err(PortError::Unauthorized);
        }

        let session = self
            .issue_session(AuthUser {
                id: credential.user_id,
                email: credential.email,
            })
            .await?;

        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<SignUpOutcome> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                error!("Failed to hash password: {:?}", e);
                PortError::Unexpected("Failed to hash password".to_string())
            })?
            .to_string();

        let user_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO credentials (user_id, email, hashed_password) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(email)
        .bind(&password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                PortError::Unexpected("An account with this email already exists.".to_string())
            } else {
                PortError::Unexpected(e.to_string())
            }
        })?;

        let user = AuthUser {
            id: user_id,
            email: email.to_string(),
        };
        // This store issues a session immediately; no email confirmation
        // policy. The contract still allows `session: None` for providers
        // that have one.
        let session = self.issue_session(user.clone()).await?;
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));

        Ok(SignUpOutcome {
            user,
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> PortResult<()> {
        if let Some(token) = self.current.write().await.take() {
            sqlx::query("DELETE FROM auth_sessions WHERE token = $1")
                .bind(&token)
                .execute(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> PortResult<()> {
        let session = self.current_session().await?.ok_or(PortError::Unauthorized)?;

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(new_password.as_bytes(), &salt)
            .map_err(|e| {
                error!("Failed to hash password: {:?}", e);
                PortError::Unexpected("Failed to hash password".to_string())
            })?
            .to_string();

        sqlx::query("UPDATE credentials SET hashed_password = $1 WHERE user_id = $2")
            .bind(&password_hash)
            .bind(session.user.id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
