//! Route surface and session guard.
//!
//! The view layer owns navigation; this module only answers whether a
//! route may be entered given the current session slice.

use crate::store::SliceState;
use crate::types::Account;

/// Every route the view layer can navigate to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    // Public
    Home,
    Login,
    Register,
    Services,
    ServiceDetail,
    // Guarded
    Dashboard,
    Profile,
    CreateService,
    EditService,
    Bookings,
    BookingDetail,
    Chat,
}

impl Route {
    /// Path pattern for the route
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Services => "/services",
            Route::ServiceDetail => "/services/:id",
            Route::Dashboard => "/dashboard",
            Route::Profile => "/profile",
            Route::CreateService => "/services/new",
            Route::EditService => "/services/:id/edit",
            Route::Bookings => "/bookings",
            Route::BookingDetail => "/bookings/:id",
            Route::Chat => "/chat",
        }
    }

    /// Whether the route requires an active session
    pub fn requires_session(&self) -> bool {
        matches!(
            self,
            Route::Dashboard
                | Route::Profile
                | Route::CreateService
                | Route::EditService
                | Route::Bookings
                | Route::BookingDetail
                | Route::Chat
        )
    }

    /// Whether a signed-in visitor is bounced away (login/register)
    pub fn redirects_when_signed_in(&self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }
}

/// Outcome of evaluating a navigation against the session slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Grant,
    /// Session state still settling; the view renders a spinner
    Pending,
    RedirectToLogin,
    RedirectToDashboard,
}

/// Gate a navigation on the current session slice
pub fn evaluate(route: Route, session: &SliceState<Account>) -> RouteAccess {
    if route.requires_session() {
        if session.is_loading {
            return RouteAccess::Pending;
        }
        if session.current.is_none() {
            return RouteAccess::RedirectToLogin;
        }
        return RouteAccess::Grant;
    }

    if route.redirects_when_signed_in() && session.current.is_some() {
        return RouteAccess::RedirectToDashboard;
    }

    RouteAccess::Grant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use chrono::Utc;

    fn signed_in() -> SliceState<Account> {
        SliceState {
            current: Some(Account {
                id: "sub-1".to_string(),
                email: "a@example.com".to_string(),
                display_name: "Ada".to_string(),
                avatar_url: None,
                role: Role::Customer,
                created_at: Utc::now(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_guarded_route_without_session_redirects_to_login() {
        let session = SliceState::default();
        assert_eq!(evaluate(Route::Dashboard, &session), RouteAccess::RedirectToLogin);
        assert_eq!(evaluate(Route::Chat, &session), RouteAccess::RedirectToLogin);
    }

    #[test]
    fn test_guarded_route_with_session_grants() {
        let session = signed_in();
        assert_eq!(evaluate(Route::Dashboard, &session), RouteAccess::Grant);
        assert_eq!(evaluate(Route::Bookings, &session), RouteAccess::Grant);
    }

    #[test]
    fn test_guarded_route_while_loading_is_pending() {
        let session = SliceState {
            is_loading: true,
            ..Default::default()
        };
        assert_eq!(evaluate(Route::Profile, &session), RouteAccess::Pending);
    }

    #[test]
    fn test_login_with_session_redirects_to_dashboard() {
        let session = signed_in();
        assert_eq!(
            evaluate(Route::Login, &session),
            RouteAccess::RedirectToDashboard
        );
        assert_eq!(
            evaluate(Route::Register, &session),
            RouteAccess::RedirectToDashboard
        );
    }

    #[test]
    fn test_public_routes_always_grant() {
        let anonymous = SliceState::default();
        for route in [Route::Home, Route::Services, Route::ServiceDetail] {
            assert_eq!(evaluate(route, &anonymous), RouteAccess::Grant);
        }
        let session = signed_in();
        assert_eq!(evaluate(Route::Services, &session), RouteAccess::Grant);
    }

    #[test]
    fn test_paths() {
        assert_eq!(Route::Home.path(), "/");
        assert_eq!(Route::ServiceDetail.path(), "/services/:id");
        assert!(Route::Dashboard.requires_session());
        assert!(!Route::Services.requires_session());
    }
}
