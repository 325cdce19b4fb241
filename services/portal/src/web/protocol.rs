//! services/portal/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and
//! the portal server for the interactive horoscope application shell.

use serde::{Deserialize, Serialize};

use horoscope_core::domain::{Page, Profile, Role};
use horoscope_core::gate::Chrome;
use horoscope_core::session::{AuthState, RegistrationOutcome};
use horoscope_core::zodiac;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens the shell. This must be the first message sent on the
    /// connection; `session_token` resumes an earlier session if present.
    Hello { session_token: Option<String> },

    /// Credential sign-in through the user or admin portal.
    SignIn {
        email: String,
        password: String,
        portal: Role,
    },

    /// Creates a regular account plus its profile row.
    Register {
        email: String,
        password: String,
        full_name: String,
        gender: String,
        date_of_birth: Option<String>,
    },

    /// Creates an admin account plus its profile row.
    RegisterAdmin {
        email: String,
        password: String,
        full_name: String,
        gender: String,
    },

    SignOut,

    /// An explicit, user-initiated navigation (nav link click).
    Navigate { page: Page },

    /// Re-reads the session and profile after an out-of-band mutation.
    RefreshProfile,

    /// Saves the settings form.
    SaveProfile {
        full_name: String,
        gender: String,
        date_of_birth: Option<String>,
    },

    ChangePassword { new_password: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The current auth state; re-sent on every change.
    AuthState {
        loading: bool,
        email: Option<String>,
        profile: Option<ProfileView>,
        /// Present while signed in, for the client to keep for resume and
        /// for bearer-authenticated REST calls.
        session_token: Option<String>,
    },

    /// The resolved page and its surrounding chrome, sent whenever either
    /// an explicit navigation or an automatic redirect changes the page.
    Page { page: Page, chrome: Chrome },

    /// The one human-readable line a form displays inline.
    FlowError { message: String },

    /// How a registration concluded.
    Registered { outcome: RegistrationView },

    PasswordChanged,

    /// Reports a fatal error, after which the connection closes.
    Error { message: String },
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationView {
    Complete,
    ConfirmationRequired,
}

impl From<RegistrationOutcome> for RegistrationView {
    fn from(outcome: RegistrationOutcome) -> Self {
        match outcome {
            RegistrationOutcome::Complete => RegistrationView::Complete,
            RegistrationOutcome::ConfirmationRequired => RegistrationView::ConfirmationRequired,
        }
    }
}

/// The profile fields the client renders.
#[derive(Serialize, Debug, Clone)]
pub struct ProfileView {
    pub full_name: String,
    pub gender: String,
    pub date_of_birth: Option<String>,
    pub zodiac_sign: Option<String>,
    pub zodiac_symbol: Option<String>,
    pub role: Role,
}

impl ProfileView {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            full_name: profile.full_name.clone(),
            gender: profile.gender.clone(),
            date_of_birth: profile.date_of_birth.clone(),
            zodiac_sign: profile.zodiac_sign.map(|s| s.as_str().to_string()),
            zodiac_symbol: profile.zodiac_sign.map(|s| zodiac::symbol(s).to_string()),
            role: profile.role,
        }
    }
}

impl ServerMessage {
    /// Builds the auth-state message for a state snapshot.
    pub fn auth_state(state: &AuthState, session_token: Option<String>) -> Self {
        ServerMessage::AuthState {
            loading: state.loading,
            email: state.user.as_ref().map(|u| u.email.clone()),
            profile: state.profile.as_ref().map(ProfileView::from_profile),
            session_token,
        }
    }
}
