//! crates/horoscope_core/src/router.rs
//!
//! The navigation state machine: derives the active page from auth state
//! and user navigation, as a plain `transition(event)` object instead of a
//! reactive effect.
//!
//! Conflicts between an explicit user navigation and an automatic redirect
//! are resolved with a monotonic generation counter rather than a timer:
//! every user navigation bumps the generation, and an auth evaluation only
//! applies if the snapshot it was computed from is at least that new. A
//! snapshot taken before the navigation can therefore never bounce the
//! user off the page they just chose, regardless of scheduling delays.

use crate::domain::{Page, Role};
use crate::gate::{self, PageClass};

/// The slice of auth state the router needs to make a decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthSnapshot {
    pub loading: bool,
    pub user_present: bool,
    /// `Some` once the profile row has arrived; `None` while it is still
    /// pending or failed to load.
    pub role: Option<Role>,
}

/// A discrete input to the navigation state machine.
#[derive(Debug, Clone)]
pub enum RouterEvent {
    /// An explicit, user-initiated navigation (nav link, post-login jump).
    UserNavigated(Page),
    /// Auth state changed. `seen_generation` is the router generation
    /// observed at the moment `snapshot` was taken.
    AuthChanged {
        snapshot: AuthSnapshot,
        seen_generation: u64,
    },
}

/// Owns the current page and the navigation generation counter.
#[derive(Debug)]
pub struct NavigationRouter {
    page: Page,
    generation: u64,
}

impl Default for NavigationRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationRouter {
    pub fn new() -> Self {
        Self {
            page: Page::Landing,
            generation: 0,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// The generation to stamp on auth snapshots taken right now.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Applies one event. Returns the new page when the event changed it.
    pub fn apply(&mut self, event: RouterEvent) -> Option<Page> {
        match event {
            RouterEvent::UserNavigated(target) => {
                self.generation += 1;
                if self.page == target {
                    return None;
                }
                self.page = target;
                Some(target)
            }
            RouterEvent::AuthChanged {
                snapshot,
                seen_generation,
            } => {
                if snapshot.loading {
                    // Render a loading view; make no routing decision yet.
                    return None;
                }
                if seen_generation < self.generation {
                    // The user navigated after this snapshot was taken.
                    return None;
                }
                self.evaluate(snapshot)
            }
        }
    }

    fn evaluate(&mut self, snapshot: AuthSnapshot) -> Option<Page> {
        let class = gate::classify(self.page);
        if !snapshot.user_present {
            // Signed out: kicked off protected pages only. Public pages
            // stay browsable.
            if class != PageClass::Public {
                self.page = Page::Landing;
                return Some(Page::Landing);
            }
            return None;
        }
        if let Some(role) = snapshot.role {
            // Signed in with a profile: redirected away from public pages
            // only. An already-routed user is never bounced by a later
            // re-evaluation.
            if class == PageClass::Public {
                let home = gate::home_for(role);
                self.page = home;
                return Some(home);
            }
        }
        // Signed in, profile still loading: wait for the next evaluation.
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(loading: bool, user_present: bool, role: Option<Role>) -> AuthSnapshot {
        AuthSnapshot {
            loading,
            user_present,
            role,
        }
    }

    fn changed(router: &mut NavigationRouter, snapshot: AuthSnapshot) -> Option<Page> {
        let seen_generation = router.generation();
        router.apply(RouterEvent::AuthChanged {
            snapshot,
            seen_generation,
        })
    }

    #[test]
    fn signed_out_user_is_kicked_off_protected_pages() {
        let mut router = NavigationRouter::new();
        router.apply(RouterEvent::UserNavigated(Page::Daily));
        assert_eq!(changed(&mut router, auth(false, false, None)), Some(Page::Landing));
        assert_eq!(router.page(), Page::Landing);
    }

    #[test]
    fn signed_out_user_may_browse_public_pages() {
        let mut router = NavigationRouter::new();
        router.apply(RouterEvent::UserNavigated(Page::Login));
        assert_eq!(changed(&mut router, auth(false, false, None)), None);
        assert_eq!(router.page(), Page::Login);
    }

    #[test]
    fn regular_user_on_login_page_goes_to_dashboard() {
        let mut router = NavigationRouter::new();
        router.apply(RouterEvent::UserNavigated(Page::Login));
        assert_eq!(
            changed(&mut router, auth(false, true, Some(Role::User))),
            Some(Page::Dashboard)
        );
    }

    #[test]
    fn admin_on_register_page_goes_to_admin_dashboard() {
        let mut router = NavigationRouter::new();
        router.apply(RouterEvent::UserNavigated(Page::Register));
        assert_eq!(
            changed(&mut router, auth(false, true, Some(Role::Admin))),
            Some(Page::AdminDashboard)
        );
    }

    #[test]
    fn routed_user_is_never_bounced_by_reevaluation() {
        let mut router = NavigationRouter::new();
        router.apply(RouterEvent::UserNavigated(Page::Profile));
        // Repeated auth evaluations must leave an authenticated, already
        // routed user exactly where they are.
        for _ in 0..3 {
            assert_eq!(changed(&mut router, auth(false, true, Some(Role::User))), None);
        }
        assert_eq!(router.page(), Page::Profile);
    }

    #[test]
    fn pending_profile_makes_no_decision() {
        let mut router = NavigationRouter::new();
        assert_eq!(changed(&mut router, auth(false, true, None)), None);
        assert_eq!(router.page(), Page::Landing);
    }

    #[test]
    fn loading_suppresses_routing() {
        let mut router = NavigationRouter::new();
        router.apply(RouterEvent::UserNavigated(Page::Daily));
        assert_eq!(changed(&mut router, auth(true, false, None)), None);
        assert_eq!(router.page(), Page::Daily);
    }

    #[test]
    fn stale_snapshot_loses_to_user_intent() {
        let mut router = NavigationRouter::new();
        // Snapshot taken while the auto-redirect to the dashboard would
        // apply...
        let stale_generation = router.generation();
        // ...but the user explicitly navigates before it is evaluated.
        router.apply(RouterEvent::UserNavigated(Page::Profile));
        let moved = router.apply(RouterEvent::AuthChanged {
            snapshot: auth(false, true, Some(Role::User)),
            seen_generation: stale_generation,
        });
        assert_eq!(moved, None);
        assert_eq!(router.page(), Page::Profile);
    }

    #[test]
    fn fresh_snapshot_still_applies_after_navigation() {
        let mut router = NavigationRouter::new();
        router.apply(RouterEvent::UserNavigated(Page::Login));
        // A snapshot taken after the navigation carries the new generation
        // and may redirect normally.
        assert_eq!(
            changed(&mut router, auth(false, true, Some(Role::User))),
            Some(Page::Dashboard)
        );
    }

    #[test]
    fn sign_out_after_session_expiry_returns_to_landing() {
        let mut router = NavigationRouter::new();
        router.apply(RouterEvent::UserNavigated(Page::AdminSigns));
        assert_eq!(changed(&mut router, auth(false, true, Some(Role::Admin))), None);
        assert_eq!(changed(&mut router, auth(false, false, None)), Some(Page::Landing));
    }
}
