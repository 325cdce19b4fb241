//! crates/horoscope_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role stored on the profile row. Decides which portal the
/// account may use and which chrome surrounds protected pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Parses the role label as stored in the profile table.
    /// Unknown labels fall back to `User` rather than failing the row.
    pub fn from_label(label: &str) -> Role {
        match label {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// One of the twelve tropical zodiac signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZodiacSign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 12] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ZodiacSign::Aries => "Aries",
            ZodiacSign::Taurus => "Taurus",
            ZodiacSign::Gemini => "Gemini",
            ZodiacSign::Cancer => "Cancer",
            ZodiacSign::Leo => "Leo",
            ZodiacSign::Virgo => "Virgo",
            ZodiacSign::Libra => "Libra",
            ZodiacSign::Scorpio => "Scorpio",
            ZodiacSign::Sagittarius => "Sagittarius",
            ZodiacSign::Capricorn => "Capricorn",
            ZodiacSign::Aquarius => "Aquarius",
            ZodiacSign::Pisces => "Pisces",
        }
    }

    /// Parses a stored sign label. The store has historically contained
    /// stale or empty values, so unknown labels map to `None` instead of
    /// an error.
    pub fn from_label(label: &str) -> Option<ZodiacSign> {
        ZodiacSign::ALL.iter().copied().find(|s| s.as_str() == label)
    }
}

impl std::fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The durable user record, one-to-one with the auth user id.
///
/// Invariant: when `date_of_birth` is present, `zodiac_sign` should equal
/// the calculator's output for it. The store may hold stale values; the
/// session controller repairs them on every fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub gender: String,
    /// Calendar date in `YYYY-MM-DD` form. Kept as text so a malformed
    /// stored value degrades to "no sign" instead of failing the row.
    pub date_of_birth: Option<String>,
    pub zodiac_sign: Option<ZodiacSign>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// A profile row as first written by the registration flow.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub full_name: String,
    pub gender: String,
    pub date_of_birth: Option<String>,
    pub zodiac_sign: Option<ZodiacSign>,
    pub role: Role,
}

/// The editable field set written as a whole by the settings form.
#[derive(Debug, Clone)]
pub struct ProfileChanges {
    pub full_name: String,
    pub gender: String,
    pub date_of_birth: Option<String>,
    pub zodiac_sign: Option<ZodiacSign>,
}

// Represents the authenticated user - observed via the auth gateway,
// never stored by the core.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// An ephemeral authentication grant tied to a user.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: AuthUser,
    pub created_at: DateTime<Utc>,
}

/// Per-sign editorial content managed from the admin panel and rendered
/// by the daily/monthly horoscope pages.
#[derive(Debug, Clone)]
pub struct SignContent {
    pub sign: ZodiacSign,
    pub symbol: String,
    pub date_range: String,
    pub element: String,
    pub ruling_planet: String,
    pub traits: String,
    pub compatibility: String,
    pub color_hex: String,
    pub description: String,
    pub daily_horoscope: String,
    pub monthly_horoscope: String,
    pub created_at: DateTime<Utc>,
}

/// The editorial fields an admin can rewrite for a sign.
#[derive(Debug, Clone)]
pub struct SignContentChanges {
    pub description: String,
    pub traits: String,
    pub compatibility: String,
    pub daily_horoscope: String,
    pub monthly_horoscope: String,
}

/// Every page the application can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Page {
    Landing,
    Login,
    Register,
    AdminRegister,
    Dashboard,
    MyZodiac,
    Daily,
    Monthly,
    Profile,
    AdminDashboard,
    AdminSigns,
    AdminUsers,
}

impl Default for Page {
    fn default() -> Self {
        Page::Landing
    }
}
