use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    middleware,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use std::sync::Arc;
use tracing::warn;

use crate::backend::Backend;
use crate::config::Config;
use crate::db::ListingStore;
use crate::handlers::{auth, listings};
use crate::middleware::auth::route_guard;

/// Shared application state. The backend client is built once and handed
/// in; stores are derived from it per request.
#[derive(Clone)]
pub struct DigsState {
    pub backend: Arc<dyn Backend>,
    pub config: Arc<Config>,
    cookie_key: Key,
}

impl DigsState {
    pub fn new(backend: Arc<dyn Backend>, config: Arc<Config>) -> Self {
        let cookie_key = match config.basic.cookie_secret.as_deref() {
            Some(secret) => Key::try_from(secret.as_bytes()).unwrap_or_else(|_| {
                warn!("cookie_secret shorter than 64 bytes; using a random session key");
                Key::generate()
            }),
            None => {
                warn!("cookie_secret not set; sessions will not survive a restart");
                Key::generate()
            }
        };
        Self {
            backend,
            config,
            cookie_key,
        }
    }

    /// Store acting on behalf of the caller holding `access_token`.
    pub fn store(&self, access_token: Option<String>) -> ListingStore {
        ListingStore::new(
            self.backend.clone(),
            self.config.backend.storage_bucket.clone(),
            access_token,
        )
    }

    pub fn secure_cookies(&self) -> bool {
        !self.config.basic.insecure_cookie
    }

    pub fn cookie_key(&self) -> &Key {
        &self.cookie_key
    }
}

impl FromRef<DigsState> for Key {
    fn from_ref(state: &DigsState) -> Self {
        state.cookie_key.clone()
    }
}

pub fn digs_router(state: DigsState) -> Router {
    let body_limit = state.config.basic.max_body_bytes;
    Router::new()
        .route("/", get(listings::home))
        .route("/properties", get(listings::browse))
        .route("/properties/{id}", get(listings::detail))
        .route("/amenities", get(listings::amenities))
        .route("/sign-in", get(auth::sign_in_info).post(auth::sign_in))
        .route("/sign-out", post(auth::sign_out))
        .route("/dashboard", get(auth::dashboard))
        .route(
            "/dashboard/new",
            get(listings::new_listing_form).post(listings::create),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), route_guard))
        .with_state(state)
}
