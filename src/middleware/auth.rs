use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::PrivateCookieJar;
use std::convert::Infallible;
use tracing::{debug, error, info, warn};

use crate::backend::{AuthUser, Backend, Session};
use crate::config::{GuardConfig, GuardFailurePolicy};
use crate::db::Role;
use crate::error::DigsError;
use crate::router::DigsState;
use crate::session::{SessionTokens, clear_session, store_session};

/// Signed-in caller, attached to requests that passed the guard.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: AuthUser,
    pub role: Option<Role>,
    pub access_token: String,
}

impl AuthContext {
    pub fn is_landlord(&self) -> bool {
        self.role == Some(Role::Landlord)
    }
}

/// Path rules for the session guard.
pub struct RouteGuard<'a> {
    cfg: &'a GuardConfig,
}

#[derive(Debug)]
pub enum GuardOutcome {
    Allow {
        ctx: AuthContext,
        refreshed: Option<Session>,
    },
    Redirect {
        to: String,
        clear_session: bool,
        /// Session issued while checking; the client must keep it even
        /// when it is sent elsewhere.
        refreshed: Option<Session>,
    },
}

/// `true` for `prefix` itself and anything below it, segment-wise:
/// `/dashboard/new` is under `/dashboard`, `/dashboards` is not.
fn path_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl<'a> RouteGuard<'a> {
    pub fn new(cfg: &'a GuardConfig) -> Self {
        Self { cfg }
    }

    pub fn is_protected(&self, path: &str) -> bool {
        path_under(path, &self.cfg.protected_prefix)
    }

    pub fn requires_landlord(&self, path: &str) -> bool {
        path_under(path, &self.cfg.landlord_path)
    }

    fn redirect(&self, to: &str, clear_session: bool, refreshed: Option<Session>) -> GuardOutcome {
        GuardOutcome::Redirect {
            to: to.to_string(),
            clear_session,
            refreshed,
        }
    }

    /// Session, profile and role checks for a protected path.
    pub async fn check(
        &self,
        state: &DigsState,
        tokens: &SessionTokens,
        path: &str,
    ) -> Result<GuardOutcome, DigsError> {
        let resolved = resolve_user(state.backend.as_ref(), tokens).await?;
        let Some((user, access_token)) = resolved.user else {
            return Ok(self.redirect(&self.cfg.sign_in_path, !tokens.is_empty(), None));
        };

        let store = state.store(Some(access_token.clone()));
        let Some(profile) = store.profile(&user.id).await? else {
            debug!(user_id = %user.id, "no profile for user");
            return Ok(self.redirect(&self.cfg.sign_in_path, false, resolved.refreshed));
        };

        if self.requires_landlord(path) && profile.role != Some(Role::Landlord) {
            return Ok(self.redirect(&self.cfg.dashboard_path, false, resolved.refreshed));
        }

        Ok(GuardOutcome::Allow {
            ctx: AuthContext {
                user,
                role: profile.role,
                access_token,
            },
            refreshed: resolved.refreshed,
        })
    }
}

struct ResolvedUser {
    user: Option<(AuthUser, String)>,
    refreshed: Option<Session>,
}

/// Current user from the access token, refreshing the session when the
/// token is expired or rejected. A rejected refresh token means "signed out".
async fn resolve_user(
    backend: &dyn Backend,
    tokens: &SessionTokens,
) -> Result<ResolvedUser, DigsError> {
    if let Some(token) = tokens.usable_access_token()
        && let Some(user) = backend.get_user(token).await?
    {
        return Ok(ResolvedUser {
            user: Some((user, token.to_string())),
            refreshed: None,
        });
    }

    let Some(refresh_token) = tokens.refresh_token.as_deref() else {
        return Ok(ResolvedUser {
            user: None,
            refreshed: None,
        });
    };

    let session = match backend.refresh_session(refresh_token).await {
        Ok(session) => session,
        Err(e) if e.is_auth_rejection() => {
            debug!(error = %e, "refresh token rejected");
            return Ok(ResolvedUser {
                user: None,
                refreshed: None,
            });
        }
        Err(e) => return Err(e),
    };

    let user = match session.user.clone() {
        Some(user) => Some(user),
        None => backend.get_user(&session.access_token).await?,
    };
    debug!(found = user.is_some(), "session refreshed");
    Ok(ResolvedUser {
        user: user.map(|u| (u, session.access_token.clone())),
        refreshed: Some(session),
    })
}

/// Session guard for the protected prefix. Other paths pass through as-is.
pub async fn route_guard(
    State(state): State<DigsState>,
    jar: PrivateCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let guard = RouteGuard::new(&state.config.guard);
    let path = req.uri().path().to_string();
    if !guard.is_protected(&path) {
        return next.run(req).await;
    }

    let tokens = SessionTokens::from_jar(&jar);
    match guard.check(&state, &tokens, &path).await {
        Ok(GuardOutcome::Allow { ctx, refreshed }) => {
            req.extensions_mut().insert(ctx);
            let resp = next.run(req).await;
            match refreshed {
                Some(session) => {
                    (store_session(jar, &session, state.secure_cookies()), resp).into_response()
                }
                None => resp,
            }
        }
        Ok(GuardOutcome::Redirect {
            to,
            clear_session: clear,
            refreshed,
        }) => {
            info!(path = %path, to = %to, "guard redirect");
            let jar = match refreshed {
                Some(session) => store_session(jar, &session, state.secure_cookies()),
                None if clear => clear_session(jar),
                None => jar,
            };
            // 303 so a redirected form POST is retried as a GET.
            (jar, Redirect::to(&to)).into_response()
        }
        Err(err) => match state.config.guard.on_error {
            GuardFailurePolicy::Open => {
                warn!(path = %path, error = %err, "session check failed; letting request through");
                next.run(req).await
            }
            GuardFailurePolicy::Closed => {
                error!(path = %path, error = %err, "session check failed; rejecting request");
                DigsError::GuardUnavailable(err.to_string()).into_response()
            }
        },
    }
}

/// Access token of the caller: the one the guard validated (and possibly
/// refreshed), else whatever the session cookie holds.
#[derive(Debug, Clone)]
pub struct CallerToken(pub Option<String>);

impl FromRequestParts<DigsState> for CallerToken {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &DigsState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(Self(Some(ctx.access_token.clone())));
        }
        let jar = PrivateCookieJar::from_headers(&parts.headers, state.cookie_key().clone());
        Ok(Self(SessionTokens::from_jar(&jar).access_token))
    }
}

/// Requires the guard to have attached an [`AuthContext`].
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = DigsError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Self)
            .ok_or(DigsError::NotLoggedIn)
    }
}
