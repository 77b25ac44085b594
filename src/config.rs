use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

use crate::error::DigsError;

/// Runtime configuration for the binary. Layered as defaults, then
/// `config.toml`, then `DIGS_*` environment variables (`__` separates
/// nested keys, e.g. `DIGS_BACKEND__ANON_KEY`).
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().unwrap_or_else(|e| panic!("FATAL: invalid configuration: {e}"))
});

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub backend: BackendConfig,
    pub listings: ListingConfig,
    pub guard: GuardConfig,
}

impl Config {
    pub fn load() -> Result<Self, DigsError> {
        let cfg = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("DIGS_").split("__"))
            .extract()?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub loglevel: String,
    /// Key material for the encrypted session cookies (at least 64 bytes).
    /// A random key is generated at startup when unset, which signs
    /// everyone out on restart.
    pub cookie_secret: Option<String>,
    /// Drop the `Secure` attribute on session cookies (plain-HTTP development).
    pub insecure_cookie: bool,
    /// Upper bound for request bodies, multipart uploads included.
    pub max_body_bytes: usize,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            loglevel: "info".to_string(),
            cookie_secret: None,
            insecure_cookie: false,
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: Url,
    pub anon_key: String,
    pub storage_bucket: String,
    pub proxy: Option<Url>,
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://127.0.0.1:54321").expect("static URL is valid"),
            anon_key: String::new(),
            storage_bucket: "properties".to_string(),
            proxy: None,
            connect_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub max_image_bytes: u64,
    /// Card image used when a listing has no primary image.
    pub placeholder_image: String,
    /// Hero image used on the detail page when a listing has no primary image.
    pub detail_placeholder_image: String,
    pub currency: String,
    /// Map picker start position, `[latitude, longitude]`.
    pub default_center: [f64; 2],
    pub home_limit: usize,
    /// Undo already-written rows and blobs when a later creation step fails.
    pub rollback_partial_listings: bool,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: 5 * 1024 * 1024,
            placeholder_image: "/placeholder.svg".to_string(),
            detail_placeholder_image: "https://via.placeholder.com/800x400".to_string(),
            currency: "ZMW".to_string(),
            default_center: [-12.80532, 28.24403],
            home_limit: 6,
            rollback_partial_listings: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardFailurePolicy {
    /// Pass the request through unmodified when the session check errors.
    Open,
    /// Reject the request with 503 when the session check errors.
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub protected_prefix: String,
    pub landlord_path: String,
    pub sign_in_path: String,
    pub dashboard_path: String,
    pub on_error: GuardFailurePolicy,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            protected_prefix: "/dashboard".to_string(),
            landlord_path: "/dashboard/new".to_string(),
            sign_in_path: "/sign-in".to_string(),
            dashboard_path: "/dashboard".to_string(),
            on_error: GuardFailurePolicy::Closed,
        }
    }
}
