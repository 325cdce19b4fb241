//! services/portal/src/adapters/store.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ProfileStore` and `SignContentStore` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use horoscope_core::domain::{
    NewProfile, Profile, ProfileChanges, Role, SignContent, SignContentChanges, ZodiacSign,
};
use horoscope_core::ports::{PortError, PortResult, ProfileStore, SignContentStore};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the profile and sign-content ports.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    full_name: String,
    gender: String,
    date_of_birth: Option<String>,
    // Stored as text; empty or unrecognized labels degrade to "no sign"
    // instead of failing the row. The store has held stale values before.
    zodiac_sign: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            id: self.id,
            full_name: self.full_name,
            gender: self.gender,
            date_of_birth: self.date_of_birth,
            zodiac_sign: ZodiacSign::from_label(&self.zodiac_sign),
            role: Role::from_label(&self.role),
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct SignContentRecord {
    sign_name: String,
    symbol: String,
    date_range: String,
    element: String,
    ruling_planet: String,
    traits: String,
    compatibility: String,
    color_hex: String,
    description: String,
    daily_horoscope: String,
    monthly_horoscope: String,
    created_at: DateTime<Utc>,
}

impl SignContentRecord {
    fn to_domain(self) -> Option<SignContent> {
        let sign = ZodiacSign::from_label(&self.sign_name)?;
        Some(SignContent {
            sign,
            symbol: self.symbol,
            date_range: self.date_range,
            element: self.element,
            ruling_planet: self.ruling_planet,
            traits: self.traits,
            compatibility: self.compatibility,
            color_hex: self.color_hex,
            description: self.description,
            daily_horoscope: self.daily_horoscope,
            monthly_horoscope: self.monthly_horoscope,
            created_at: self.created_at,
        })
    }
}

fn sign_label(sign: Option<ZodiacSign>) -> &'static str {
    sign.map(|s| s.as_str()).unwrap_or("")
}

const PROFILE_COLUMNS: &str =
    "id, full_name, gender, date_of_birth, zodiac_sign, role, created_at";

const SIGN_COLUMNS: &str = "sign_name, symbol, date_range, element, ruling_planet, traits, \
     compatibility, color_hex, description, daily_horoscope, monthly_horoscope, created_at";

//=========================================================================================
// `ProfileStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileStore for PgStore {
    async fn fetch_by_id(&self, id: Uuid) -> PortResult<Option<Profile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(ProfileRecord::to_domain))
    }

    async fn insert(&self, profile: NewProfile) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO profiles (id, full_name, gender, date_of_birth, zodiac_sign, role) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(profile.id)
        .bind(&profile.full_name)
        .bind(&profile.gender)
        .bind(&profile.date_of_birth)
        .bind(sign_label(profile.zodiac_sign))
        .bind(profile.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn update(&self, id: Uuid, changes: ProfileChanges) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE profiles SET full_name = $1, gender = $2, date_of_birth = $3, \
             zodiac_sign = $4 WHERE id = $5",
        )
        .bind(&changes.full_name)
        .bind(&changes.gender)
        .bind(&changes.date_of_birth)
        .bind(sign_label(changes.zodiac_sign))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Profile {} not found", id)));
        }
        Ok(())
    }

    async fn update_zodiac_sign(&self, id: Uuid, sign: Option<ZodiacSign>) -> PortResult<()> {
        let result = sqlx::query("UPDATE profiles SET zodiac_sign = $1 WHERE id = $2")
            .bind(sign_label(sign))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Profile {} not found", id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_all(&self) -> PortResult<Vec<Profile>> {
        let records = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(ProfileRecord::to_domain).collect())
    }

    async fn count_by_role(&self, role: Role) -> PortResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(count)
    }
}

//=========================================================================================
// `SignContentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SignContentStore for PgStore {
    async fn list_signs(&self) -> PortResult<Vec<SignContent>> {
        let records = sqlx::query_as::<_, SignContentRecord>(&format!(
            "SELECT {SIGN_COLUMNS} FROM zodiac_signs ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        // Rows with an unrecognized sign label are dropped rather than
        // failing the whole listing.
        Ok(records
            .into_iter()
            .filter_map(SignContentRecord::to_domain)
            .collect())
    }

    async fn fetch_sign(&self, sign: ZodiacSign) -> PortResult<Option<SignContent>> {
        let record = sqlx::query_as::<_, SignContentRecord>(&format!(
            "SELECT {SIGN_COLUMNS} FROM zodiac_signs WHERE sign_name = $1"
        ))
        .bind(sign.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.and_then(SignContentRecord::to_domain))
    }

    async fn update_sign(&self, sign: ZodiacSign, changes: SignContentChanges) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE zodiac_signs SET description = $1, traits = $2, compatibility = $3, \
             daily_horoscope = $4, monthly_horoscope = $5 WHERE sign_name = $6",
        )
        .bind(&changes.description)
        .bind(&changes.traits)
        .bind(&changes.compatibility)
        .bind(&changes.daily_horoscope)
        .bind(&changes.monthly_horoscope)
        .bind(sign.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Sign {} not found", sign)));
        }
        Ok(())
    }
}
