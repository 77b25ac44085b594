//! Client side of the hosted backend: rows, blobs and auth.
//!
//! Layout:
//! - `query.rs`: `RowQuery` filter builder rendered to PostgREST parameters
//! - `supabase.rs`: reqwest implementation of [`Backend`]

pub mod query;
pub mod supabase;

use async_trait::async_trait;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::RowId;
use crate::error::DigsError;

pub use query::{Filter, Order, RowQuery};
pub use supabase::SupabaseClient;

/// User record returned by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: RowId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Token pair issued by a sign-in or a refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

/// Object handed to blob storage.
#[derive(Debug, Clone)]
pub struct BlobUpload {
    pub bytes: Bytes,
    pub content_type: String,
    pub upsert: bool,
}

/// Operations the service needs from the hosted backend.
///
/// `auth` is the caller's access token; `None` issues the call with the
/// public key only, so row-level policies see an anonymous caller.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> Result<Session, DigsError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, DigsError>;

    /// `Ok(None)` when the token is rejected.
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, DigsError>;

    async fn select(&self, auth: Option<&str>, query: &RowQuery) -> Result<Vec<Value>, DigsError>;

    /// Inserts rows and returns them as stored (generated ids included).
    async fn insert(
        &self,
        auth: Option<&str>,
        table: &str,
        rows: Vec<Value>,
    ) -> Result<Vec<Value>, DigsError>;

    async fn delete(&self, auth: Option<&str>, query: &RowQuery) -> Result<(), DigsError>;

    async fn upload(
        &self,
        auth: Option<&str>,
        bucket: &str,
        path: &str,
        object: BlobUpload,
    ) -> Result<(), DigsError>;

    async fn remove(&self, auth: Option<&str>, bucket: &str, paths: &[String])
    -> Result<(), DigsError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}
