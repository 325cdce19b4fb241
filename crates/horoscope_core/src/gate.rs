//! crates/horoscope_core/src/gate.rs
//!
//! Static page classification: which pages need a signed-in user, which
//! need an admin, and which layout chrome surrounds each.

use crate::domain::{Page, Role};
use serde::Serialize;

/// Access class of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageClass {
    Public,
    UserProtected,
    AdminProtected,
}

/// The layout shell a page is rendered inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Chrome {
    Plain,
    UserShell,
    AdminShell,
}

/// Classifies a page by static membership.
///
/// `AdminRegister` is deliberately public: it is the sign-up form for a
/// new admin account, reachable before any session exists.
pub fn classify(page: Page) -> PageClass {
    match page {
        Page::Landing | Page::Login | Page::Register | Page::AdminRegister => PageClass::Public,
        Page::Dashboard | Page::MyZodiac | Page::Daily | Page::Monthly | Page::Profile => {
            PageClass::UserProtected
        }
        Page::AdminDashboard | Page::AdminSigns | Page::AdminUsers => PageClass::AdminProtected,
    }
}

/// Selects the surrounding chrome for a page.
pub fn chrome(page: Page) -> Chrome {
    match classify(page) {
        PageClass::Public => Chrome::Plain,
        PageClass::UserProtected => Chrome::UserShell,
        PageClass::AdminProtected => Chrome::AdminShell,
    }
}

/// The dashboard a freshly authenticated account lands on.
pub fn home_for(role: Role) -> Page {
    match role {
        Role::Admin => Page::AdminDashboard,
        Role::User => Page::Dashboard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_register_is_public_and_plain() {
        assert_eq!(classify(Page::AdminRegister), PageClass::Public);
        assert_eq!(chrome(Page::AdminRegister), Chrome::Plain);
    }

    #[test]
    fn admin_pages_get_admin_shell() {
        for page in [Page::AdminDashboard, Page::AdminSigns, Page::AdminUsers] {
            assert_eq!(classify(page), PageClass::AdminProtected);
            assert_eq!(chrome(page), Chrome::AdminShell);
        }
    }

    #[test]
    fn user_pages_get_user_shell() {
        for page in [
            Page::Dashboard,
            Page::MyZodiac,
            Page::Daily,
            Page::Monthly,
            Page::Profile,
        ] {
            assert_eq!(classify(page), PageClass::UserProtected);
            assert_eq!(chrome(page), Chrome::UserShell);
        }
    }

    #[test]
    fn home_follows_role() {
        assert_eq!(home_for(Role::User), Page::Dashboard);
        assert_eq!(home_for(Role::Admin), Page::AdminDashboard);
    }
}
