use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use base64::Engine;
use chrono::Utc;
use serde_json::Value;
use time::Duration;

use crate::backend::Session;

const ACCESS_COOKIE: &str = "digs_access_token";
const REFRESH_COOKIE: &str = "digs_refresh_token";

/// Refresh slightly ahead of the real expiry.
const EXPIRY_LEEWAY_SECS: i64 = 10;

/// Tokens carried by the encrypted session cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    pub fn from_jar(jar: &PrivateCookieJar) -> Self {
        Self {
            access_token: jar.get(ACCESS_COOKIE).map(|c| c.value().to_owned()),
            refresh_token: jar.get(REFRESH_COOKIE).map(|c| c.value().to_owned()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// Access token present and not past its `exp` claim.
    pub fn usable_access_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|token| !access_token_expired(token, Utc::now().timestamp()))
    }
}

/// Read the `exp` claim of a JWT without verifying it; the backend verifies.
/// Tokens without a readable claim are treated as live.
pub fn access_token_expired(token: &str, now_unix: i64) -> bool {
    let Some(payload_b64) = token.split('.').nth(1) else {
        return false;
    };
    let Ok(decoded) = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload_b64) else {
        return false;
    };
    let Ok(claims) = serde_json::from_slice::<Value>(&decoded) else {
        return false;
    };
    let Some(exp) = claims.get("exp").and_then(Value::as_i64) else {
        return false;
    };
    exp <= now_unix + EXPIRY_LEEWAY_SECS
}

pub fn store_session(jar: PrivateCookieJar, session: &Session, secure: bool) -> PrivateCookieJar {
    let access_age = session.expires_in.unwrap_or(3600).max(0);
    jar.add(build_cookie(
        ACCESS_COOKIE,
        session.access_token.clone(),
        Duration::seconds(access_age),
        secure,
    ))
    .add(build_cookie(
        REFRESH_COOKIE,
        session.refresh_token.clone(),
        Duration::days(30),
        secure,
    ))
}

pub fn clear_session(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(ACCESS_COOKIE))
        .remove(clear_cookie(REFRESH_COOKIE))
}

fn build_cookie(name: &str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
