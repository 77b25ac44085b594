use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::backend::AuthUser;
use crate::db::Role;
use crate::error::DigsError;
use crate::middleware::RequireAuth;
use crate::router::DigsState;
use crate::session::{clear_session, store_session};

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignedIn {
    pub user: Option<AuthUser>,
}

/// GET /sign-in -> where the guard sends signed-out callers.
pub async fn sign_in_info() -> Json<Value> {
    Json(json!({
        "message": "Sign in to continue.",
        "method": "POST",
        "fields": ["email", "password"],
    }))
}

/// POST /sign-in -> password grant, session stored in encrypted cookies.
pub async fn sign_in(
    State(state): State<DigsState>,
    jar: PrivateCookieJar,
    Json(req): Json<SignInRequest>,
) -> Result<impl IntoResponse, DigsError> {
    let session = state
        .backend
        .sign_in_with_password(req.email.trim(), &req.password)
        .await
        .map_err(|e| {
            if e.is_auth_rejection() {
                DigsError::InvalidCredentials
            } else {
                e
            }
        })?;
    info!(user_id = ?session.user.as_ref().map(|u| u.id.to_string()), "signed in");
    let jar = store_session(jar, &session, state.secure_cookies());
    Ok((
        jar,
        Json(SignedIn {
            user: session.user,
        }),
    ))
}

/// POST /sign-out
pub async fn sign_out(jar: PrivateCookieJar) -> impl IntoResponse {
    (clear_session(jar), StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub user: AuthUser,
    pub role: Option<Role>,
    pub can_create_listings: bool,
}

/// GET /dashboard
pub async fn dashboard(RequireAuth(ctx): RequireAuth) -> Json<DashboardView> {
    Json(DashboardView {
        can_create_listings: ctx.is_landlord(),
        user: ctx.user,
        role: ctx.role,
    })
}
