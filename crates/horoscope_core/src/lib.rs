pub mod domain;
pub mod gate;
pub mod ports;
pub mod router;
pub mod session;
pub mod zodiac;

pub use domain::{
    AuthSession, AuthUser, NewProfile, Page, Profile, ProfileChanges, Role, SignContent,
    SignContentChanges, ZodiacSign,
};
pub use gate::{Chrome, PageClass};
pub use ports::{AuthEvent, AuthGateway, PortError, PortResult, ProfileStore, SignContentStore};
pub use router::{AuthSnapshot, NavigationRouter, RouterEvent};
pub use session::{
    AuthFlowError, AuthState, NewRegistration, RegistrationOutcome, SessionController,
    SessionTimeouts,
};
