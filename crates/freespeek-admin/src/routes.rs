//! Console routes and the authentication guard in front of them

use std::fmt;

use crate::session::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    Users,
    LiveUsers,
    Chats,
    Support,
    Email,
    Tracking,
}

impl Route {
    pub const ALL: [Route; 8] = [
        Route::Login,
        Route::Dashboard,
        Route::Users,
        Route::LiveUsers,
        Route::Chats,
        Route::Support,
        Route::Email,
        Route::Tracking,
    ];

    /// Where authenticated users land
    pub const HOME: Route = Route::Dashboard;

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::Users => "/users",
            Route::LiveUsers => "/live-users",
            Route::Chats => "/chats",
            Route::Support => "/support",
            Route::Email => "/email",
            Route::Tracking => "/tracking",
        }
    }

    /// Match a request path. Query strings, fragments and a trailing slash
    /// are ignored.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim_end_matches('/');
        Route::ALL.into_iter().find(|route| route.path() == path)
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// What to show for a requested path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    Redirect(Route),
    /// Session restore still running; show nothing route-specific
    Loading,
    NotFound,
}

/// Decide what a request for `path` resolves to under `status`.
pub fn resolve(path: &str, status: &SessionStatus) -> Navigation {
    let bare = path.split(['?', '#']).next().unwrap_or_default();
    if bare.trim_end_matches('/').is_empty() {
        return Navigation::Redirect(Route::HOME);
    }

    let Some(route) = Route::from_path(path) else {
        return Navigation::NotFound;
    };

    if status.is_loading {
        return Navigation::Loading;
    }

    match (route.is_protected(), status.is_authenticated()) {
        (true, false) => Navigation::Redirect(Route::Login),
        (false, true) => Navigation::Redirect(Route::HOME),
        _ => Navigation::Render(route),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn signed_in() -> SessionStatus {
        SessionStatus::signed_in(User::from_email("a@b.com"))
    }

    #[test]
    fn test_path_round_trip() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/users/?page=2"), Some(Route::Users));
        assert_eq!(Route::from_path("/nope"), None);
    }

    #[test]
    fn test_loading_blocks_every_known_route() {
        let status = SessionStatus::loading();
        assert_eq!(resolve("/dashboard", &status), Navigation::Loading);
        assert_eq!(resolve("/login", &status), Navigation::Loading);
    }

    #[test]
    fn test_signed_out() {
        let status = SessionStatus::signed_out();
        assert_eq!(resolve("/tracking", &status), Navigation::Redirect(Route::Login));
        assert_eq!(resolve("/login", &status), Navigation::Render(Route::Login));
    }

    #[test]
    fn test_signed_in() {
        let status = signed_in();
        assert_eq!(resolve("/live-users", &status), Navigation::Render(Route::LiveUsers));
        assert_eq!(resolve("/login", &status), Navigation::Redirect(Route::Dashboard));
    }

    #[test]
    fn test_root_and_unknown() {
        assert_eq!(resolve("/", &SessionStatus::signed_out()), Navigation::Redirect(Route::Dashboard));
        assert_eq!(resolve("", &signed_in()), Navigation::Redirect(Route::Dashboard));
        assert_eq!(resolve("/settings", &signed_in()), Navigation::NotFound);
    }
}
