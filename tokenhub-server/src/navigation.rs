use axum::{extract::Query, routing::get, Json};
use serde::Deserialize;
use tokenhub_core::Capabilities;
use utoipa::IntoParams;

use crate::{auth::Session, serialized::Navigation, Router};

/// A page of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    TokenRequests,
    Profile,
    Admin,
    Transfer,
    Product,
    Fashion,
    Animals,
    Food,
    Modify,
}

impl Route {
    pub const ALL: [Route; 11] = [
        Self::Login,
        Self::Dashboard,
        Self::TokenRequests,
        Self::Profile,
        Self::Admin,
        Self::Transfer,
        Self::Product,
        Self::Fashion,
        Self::Animals,
        Self::Food,
        Self::Modify,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Dashboard => "/",
            Self::TokenRequests => "/token-requests",
            Self::Profile => "/profile",
            Self::Admin => "/admin",
            Self::Transfer => "/transfer",
            Self::Product => "/product",
            Self::Fashion => "/fashion",
            Self::Animals => "/animals",
            Self::Food => "/food",
            Self::Modify => "/modify",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.path() == path)
    }

    pub fn requires_auth(&self) -> bool {
        *self != Self::Login
    }

    pub fn requires_admin(&self) -> bool {
        *self == Self::Admin
    }

    /// Pages that exist but have no content yet
    pub fn is_placeholder(&self) -> bool {
        matches!(
            self,
            Self::Fashion | Self::Animals | Self::Food | Self::Modify
        )
    }
}

/// Where a navigation ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Allow(Route),
    Redirect(String),
}

/// Decides where a visit to `path` goes.
/// Unknown paths go back to the last visited path, or the dashboard if there is none.
pub fn resolve(
    path: &str,
    capabilities: Option<&Capabilities>,
    last_path: Option<&str>,
) -> Resolution {
    let Some(route) = Route::from_path(path) else {
        return Resolution::Redirect(last_path.unwrap_or(Route::Dashboard.path()).to_string());
    };

    let Some(capabilities) = capabilities else {
        if route.requires_auth() {
            return Resolution::Redirect(Route::Login.path().to_string());
        }

        return Resolution::Allow(route);
    };

    if route.requires_admin() && !capabilities.is_admin() {
        return Resolution::Redirect(Route::Dashboard.path().to_string());
    }

    Resolution::Allow(route)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NavigateQuery {
    /// The path the client wants to visit
    path: String,
}

#[utoipa::path(
    get,
    path = "/v1/navigate",
    tag = "navigation",
    params(NavigateQuery),
    responses(
        (status = 200, body = Navigation)
    )
)]
async fn navigate(
    session: Option<Session>,
    Query(query): Query<NavigateQuery>,
) -> Json<Navigation> {
    let capabilities = session.as_ref().and_then(|s| s.capabilities());
    let last_path = session.as_ref().and_then(|s| s.last_path());

    let resolution = resolve(&query.path, capabilities.as_ref(), last_path.as_deref());

    let navigation = match resolution {
        Resolution::Allow(route) => {
            if let Some(session) = &session {
                session.visit(route.path());
            }

            Navigation {
                path: route.path().to_string(),
                redirected: false,
                placeholder: route.is_placeholder(),
            }
        }
        Resolution::Redirect(path) => Navigation {
            path,
            redirected: true,
            placeholder: false,
        },
    };

    Json(navigation)
}

pub fn router() -> Router {
    Router::new().route("/navigate", get(navigate))
}

#[cfg(test)]
mod test {
    use tokenhub_core::{Role, User};
    use uuid::Uuid;

    use super::*;

    fn capabilities(role: Role) -> Capabilities {
        Capabilities::for_user(&User {
            id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            name: "Someone".to_string(),
            role,
            api_tokens: 0,
        })
    }

    fn redirect(path: &str) -> Resolution {
        Resolution::Redirect(path.to_string())
    }

    #[test]
    fn test_admin_guard() {
        let user = capabilities(Role::User);
        let admin = capabilities(Role::Admin);

        assert_eq!(resolve("/admin", None, None), redirect("/login"));
        assert_eq!(resolve("/admin", Some(&user), None), redirect("/"));
        assert_eq!(
            resolve("/admin", Some(&admin), None),
            Resolution::Allow(Route::Admin)
        );
    }

    #[test]
    fn test_protected_routes() {
        let user = capabilities(Role::User);

        for route in Route::ALL {
            if route.requires_auth() {
                assert_eq!(resolve(route.path(), None, None), redirect("/login"));
            }

            if !route.requires_admin() {
                assert_eq!(
                    resolve(route.path(), Some(&user), None),
                    Resolution::Allow(route)
                );
            }
        }

        assert_eq!(resolve("/login", None, None), Resolution::Allow(Route::Login));
    }

    #[test]
    fn test_unknown_paths() {
        let user = capabilities(Role::User);

        assert_eq!(resolve("/nope", Some(&user), None), redirect("/"));
        assert_eq!(
            resolve("/nope", Some(&user), Some("/transfer")),
            redirect("/transfer")
        );
        assert_eq!(resolve("/nope", None, None), redirect("/"));
    }
}
