use crate::session::SessionState;

/// Navigation targets a guard can redirect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The sign-in surface.
    Login,
    /// Profile setup for signed-in users who have not finished it.
    ProfileSetup,
    /// The main recommendation surface.
    Home,
}

/// Outcome of evaluating a guard against the current session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Route),
    /// The session is not established yet (startup or a verify in
    /// flight). Callers should wait or show a retry affordance, never a
    /// sign-in prompt.
    Pending,
}

/// Route-level access checks over [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGuard {
    /// Main app routes: signed in with a complete profile.
    RequiresComplete,
    /// Profile setup: signed in, profile not yet complete.
    RequiresIncomplete,
    /// Login surface: signed out only.
    RequiresUnauthenticated,
}

impl RouteGuard {
    pub fn evaluate(self, state: SessionState) -> GuardDecision {
        use GuardDecision::*;
        use SessionState::*;

        match (self, state) {
            (_, Uninitialized | Verifying) => Pending,

            (RouteGuard::RequiresComplete, AuthenticatedComplete) => Allow,
            (RouteGuard::RequiresComplete, AuthenticatedIncomplete) => {
                Redirect(Route::ProfileSetup)
            }
            (RouteGuard::RequiresComplete, Unauthenticated) => Redirect(Route::Login),

            (RouteGuard::RequiresIncomplete, AuthenticatedIncomplete) => Allow,
            (RouteGuard::RequiresIncomplete, AuthenticatedComplete) => Redirect(Route::Home),
            (RouteGuard::RequiresIncomplete, Unauthenticated) => Redirect(Route::Login),

            (RouteGuard::RequiresUnauthenticated, Unauthenticated) => Allow,
            (RouteGuard::RequiresUnauthenticated, AuthenticatedComplete) => Redirect(Route::Home),
            (RouteGuard::RequiresUnauthenticated, AuthenticatedIncomplete) => {
                Redirect(Route::ProfileSetup)
            }
        }
    }
}
