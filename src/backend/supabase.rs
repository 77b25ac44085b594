use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{AuthUser, Backend, BlobUpload, RowQuery, Session};
use crate::config::BackendConfig;
use crate::error::DigsError;

/// Backend client for a Supabase-style stack (PostgREST, storage, GoTrue).
///
/// Built once at startup and shared; the caller's token is passed per call.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(cfg: &BackendConfig) -> Result<Self, DigsError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("digs/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .default_headers(headers);
        if let Some(proxy_url) = cfg.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        let http = builder.build()?;
        info!(url = %cfg.url, "backend client ready");
        Ok(Self {
            http,
            base: cfg.url.clone(),
            anon_key: cfg.anon_key.clone(),
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn rest_url(&self, table: &str) -> Url {
        self.endpoint(["rest", "v1", table])
    }

    fn object_url(&self, bucket: &str, path: &str) -> Url {
        self.endpoint(
            ["storage", "v1", "object", bucket]
                .into_iter()
                .chain(path.split('/')),
        )
    }

    /// Attach the project key plus the caller's bearer (or the key itself).
    fn authed(&self, req: reqwest::RequestBuilder, auth: Option<&str>) -> reqwest::RequestBuilder {
        req.header("apikey", &self.anon_key)
            .bearer_auth(auth.unwrap_or(self.anon_key.as_str()))
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, DigsError> {
        let mut url = self.endpoint(["auth", "v1", "token"]);
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let session = ensure_success(resp).await?.json::<Session>().await?;
        debug!(grant_type, "session issued");
        Ok(session)
    }
}

#[async_trait]
impl Backend for SupabaseClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, DigsError> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, DigsError> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, DigsError> {
        let resp = self
            .http
            .get(self.endpoint(["auth", "v1", "user"]))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        if matches!(
            resp.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }
        let user = ensure_success(resp).await?.json::<AuthUser>().await?;
        Ok(Some(user))
    }

    async fn select(&self, auth: Option<&str>, query: &RowQuery) -> Result<Vec<Value>, DigsError> {
        let req = self
            .http
            .get(self.rest_url(query.table_name()))
            .query(&query.to_params());
        let resp = self.authed(req, auth).send().await?;
        Ok(ensure_success(resp).await?.json::<Vec<Value>>().await?)
    }

    async fn insert(
        &self,
        auth: Option<&str>,
        table: &str,
        rows: Vec<Value>,
    ) -> Result<Vec<Value>, DigsError> {
        let req = self
            .http
            .post(self.rest_url(table))
            .header("Prefer", "return=representation")
            .json(&rows);
        let resp = self.authed(req, auth).send().await?;
        Ok(ensure_success(resp).await?.json::<Vec<Value>>().await?)
    }

    async fn delete(&self, auth: Option<&str>, query: &RowQuery) -> Result<(), DigsError> {
        // `select` is meaningless on DELETE without a representation.
        let params: Vec<(String, String)> = query
            .to_params()
            .into_iter()
            .filter(|(k, _)| k != "select")
            .collect();
        let req = self
            .http
            .delete(self.rest_url(query.table_name()))
            .query(&params);
        let resp = self.authed(req, auth).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn upload(
        &self,
        auth: Option<&str>,
        bucket: &str,
        path: &str,
        object: BlobUpload,
    ) -> Result<(), DigsError> {
        let req = self
            .http
            .post(self.object_url(bucket, path))
            .header(CONTENT_TYPE, object.content_type)
            .header("x-upsert", if object.upsert { "true" } else { "false" })
            .body(object.bytes);
        let resp = self.authed(req, auth).send().await?;
        ensure_success(resp).await?;
        debug!(bucket, path, "blob uploaded");
        Ok(())
    }

    async fn remove(
        &self,
        auth: Option<&str>,
        bucket: &str,
        paths: &[String],
    ) -> Result<(), DigsError> {
        let req = self
            .http
            .delete(self.endpoint(["storage", "v1", "object", bucket]))
            .json(&json!({ "prefixes": paths }));
        let resp = self.authed(req, auth).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(
            ["storage", "v1", "object", "public", bucket]
                .into_iter()
                .chain(path.split('/')),
        )
        .to_string()
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, DigsError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = upstream_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("upstream error")
            .to_string()
    });
    Err(DigsError::Upstream { status, message })
}

/// REST, storage and auth each name their error text differently.
fn upstream_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
