#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use chrono::{DateTime, Duration, Utc};
use digs::backend::{AuthUser, Backend, BlobUpload, Filter, RowQuery, Session};
use digs::config::Config;
use digs::db::RowId;
use digs::{DigsError, DigsState, digs_router};
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// In-memory stand-in for the hosted backend.
#[derive(Default)]
pub struct FakeBackend {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Value>>,
    blobs: BTreeMap<String, usize>,
    users: Vec<FakeUser>,
    next_id: i64,
    clock: i64,
    writes: usize,
    token_generation: u32,
    fail_insert_into: Option<String>,
    fail_upload_at: Option<usize>,
    uploads: usize,
    auth_outage: bool,
}

struct FakeUser {
    id: String,
    email: String,
    password: String,
}

fn upstream(status: StatusCode, message: &str) -> DigsError {
    DigsError::Upstream {
        status,
        message: message.to_string(),
    }
}

fn text_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn compare(row_value: Option<&Value>, operand: &str) -> Option<Ordering> {
    let row_value = row_value?;
    match (row_value.as_f64(), operand.parse::<f64>()) {
        (Some(a), Ok(b)) => a.partial_cmp(&b),
        _ => Some(text_of(row_value).as_str().cmp(operand)),
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let field = row.get(filter.column());
    match filter {
        Filter::Eq(_, v) => field.map(text_of).as_deref() == Some(v.as_str()),
        Filter::Gte(_, v) => matches!(
            compare(field, v),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Filter::Lte(_, v) => matches!(compare(field, v), Some(Ordering::Less | Ordering::Equal)),
        Filter::In(_, values) => field.map(text_of).is_some_and(|t| values.contains(&t)),
    }
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// Registers an auth user with a profile row (when `role` is given).
    pub fn add_user(&self, id: &str, email: &str, password: &str, role: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        inner.users.push(FakeUser {
            id: id.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        });
        if let Some(role) = role {
            inner.tables.entry("profiles".to_string()).or_default().push(json!({
                "id": id,
                "name": format!("{role} {id}"),
                "email": email,
                "phone": "+260 97 000 0000",
                "role": role,
            }));
        }
    }

    /// Rows inserted without an id or created_at get increasing ones.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut inner = self.inner.lock().unwrap();
        for row in rows {
            let row = inner.stamp(row);
            inner.tables.entry(table.to_string()).or_default().push(row);
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        let inner = self.inner.lock().unwrap();
        inner.tables.get(table).cloned().unwrap_or_default()
    }

    pub fn blobs(&self) -> Vec<String> {
        self.inner.lock().unwrap().blobs.keys().cloned().collect()
    }

    /// Inserts, deletes, uploads and removals seen so far.
    pub fn writes(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    pub fn fail_insert_into(&self, table: &str) {
        self.inner.lock().unwrap().fail_insert_into = Some(table.to_string());
    }

    /// Fail the n-th upload (0-based).
    pub fn fail_upload_at(&self, n: usize) {
        self.inner.lock().unwrap().fail_upload_at = Some(n);
    }

    /// Auth lookups fail with a server error.
    pub fn set_auth_outage(&self, on: bool) {
        self.inner.lock().unwrap().auth_outage = on;
    }

    /// Invalidate every access token issued so far; refresh tokens stay valid.
    pub fn expire_access_tokens(&self) {
        self.inner.lock().unwrap().token_generation += 1;
    }
}

impl Inner {
    fn stamp(&mut self, mut row: Value) -> Value {
        if let Some(obj) = row.as_object_mut() {
            if !obj.contains_key("id") {
                self.next_id += 1;
                obj.insert("id".to_string(), json!(self.next_id));
            }
            if !obj.contains_key("created_at") {
                self.clock += 1;
                let at = FakeBackend::base_time() + Duration::seconds(self.clock);
                obj.insert("created_at".to_string(), json!(at.to_rfc3339()));
            }
        }
        row
    }

    fn session_for(&self, user_id: &str) -> Session {
        let user = self.users.iter().find(|u| u.id == user_id);
        Session {
            access_token: format!("access:{user_id}:{}", self.token_generation),
            refresh_token: format!("refresh:{user_id}"),
            expires_in: Some(3600),
            user: user.map(|u| AuthUser {
                id: RowId::Text(u.id.clone()),
                email: Some(u.email.clone()),
            }),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, DigsError> {
        let inner = self.inner.lock().unwrap();
        let user = inner
            .users
            .iter()
            .find(|u| u.email == email && u.password == password)
            .ok_or_else(|| upstream(StatusCode::BAD_REQUEST, "Invalid login credentials"))?;
        Ok(inner.session_for(&user.id))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, DigsError> {
        let inner = self.inner.lock().unwrap();
        if inner.auth_outage {
            return Err(upstream(StatusCode::SERVICE_UNAVAILABLE, "auth down"));
        }
        let user_id = refresh_token
            .strip_prefix("refresh:")
            .filter(|id| inner.users.iter().any(|u| u.id == *id))
            .ok_or_else(|| upstream(StatusCode::BAD_REQUEST, "Invalid Refresh Token"))?;
        Ok(inner.session_for(user_id))
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, DigsError> {
        let inner = self.inner.lock().unwrap();
        if inner.auth_outage {
            return Err(upstream(StatusCode::SERVICE_UNAVAILABLE, "auth down"));
        }
        let mut parts = access_token.split(':');
        let (Some("access"), Some(id), Some(generation)) = (parts.next(), parts.next(), parts.next())
        else {
            return Ok(None);
        };
        if generation != inner.token_generation.to_string() {
            return Ok(None);
        }
        Ok(inner.users.iter().find(|u| u.id == id).map(|u| AuthUser {
            id: RowId::Text(u.id.clone()),
            email: Some(u.email.clone()),
        }))
    }

    async fn select(&self, _auth: Option<&str>, query: &RowQuery) -> Result<Vec<Value>, DigsError> {
        let inner = self.inner.lock().unwrap();
        // Integer key columns reject text operands, like Postgres does.
        let rows_so_far = inner.tables.get(query.table_name());
        let integer_ids = rows_so_far
            .is_some_and(|rows| !rows.is_empty() && rows.iter().all(|r| r["id"].is_i64()));
        for filter in query.filters() {
            if let Filter::Eq(column, value) = filter
                && column == "id"
                && integer_ids
                && value.parse::<i64>().is_err()
            {
                return Err(upstream(
                    StatusCode::BAD_REQUEST,
                    &format!("invalid input syntax for type bigint: \"{value}\""),
                ));
            }
        }
        let mut rows: Vec<Value> = inner
            .tables
            .get(query.table_name())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|row| query.filters().iter().all(|f| matches(row, f)))
            .collect();
        if let Some(order) = query.order() {
            rows.sort_by(|a, b| {
                let ord = text_of(&a[&order.column]).cmp(&text_of(&b[&order.column]));
                if order.ascending { ord } else { ord.reverse() }
            });
        }
        if let Some(limit) = query.row_limit() {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(
        &self,
        _auth: Option<&str>,
        table: &str,
        rows: Vec<Value>,
    ) -> Result<Vec<Value>, DigsError> {
        let mut inner = self.inner.lock().unwrap();
        inner.writes += 1;
        if inner.fail_insert_into.as_deref() == Some(table) {
            return Err(upstream(StatusCode::CONFLICT, "violates foreign key constraint"));
        }
        let stored: Vec<Value> = rows.into_iter().map(|row| inner.stamp(row)).collect();
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn delete(&self, _auth: Option<&str>, query: &RowQuery) -> Result<(), DigsError> {
        let mut inner = self.inner.lock().unwrap();
        inner.writes += 1;
        if let Some(rows) = inner.tables.get_mut(query.table_name()) {
            rows.retain(|row| !query.filters().iter().all(|f| matches(row, f)));
        }
        Ok(())
    }

    async fn upload(
        &self,
        _auth: Option<&str>,
        _bucket: &str,
        path: &str,
        object: BlobUpload,
    ) -> Result<(), DigsError> {
        let mut inner = self.inner.lock().unwrap();
        inner.writes += 1;
        let attempt = inner.uploads;
        inner.uploads += 1;
        if inner.fail_upload_at == Some(attempt) {
            return Err(upstream(StatusCode::BAD_GATEWAY, "storage unavailable"));
        }
        inner.blobs.insert(path.to_string(), object.bytes.len());
        Ok(())
    }

    async fn remove(
        &self,
        _auth: Option<&str>,
        _bucket: &str,
        paths: &[String],
    ) -> Result<(), DigsError> {
        let mut inner = self.inner.lock().unwrap();
        inner.writes += 1;
        for path in paths {
            inner.blobs.remove(path);
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://storage.test/{bucket}/{path}")
    }
}

pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.basic.insecure_cookie = true;
    cfg.basic.cookie_secret = Some("k".repeat(64));
    cfg
}

pub fn app_with(backend: Arc<FakeBackend>, cfg: Config) -> Router {
    let state = DigsState::new(backend, Arc::new(cfg));
    digs_router(state)
}

pub fn app(backend: Arc<FakeBackend>) -> Router {
    app_with(backend, test_config())
}

/// `Cookie` header value built from a response's `Set-Cookie` headers.
pub fn cookies_from(resp: &Response<Body>) -> String {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn sign_in(app: &Router, email: &str, password: &str) -> String {
    let body = json!({ "email": email, "password": password }).to_string();
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sign-in")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK, "sign-in failed");
    cookies_from(&resp)
}

pub async fn get(app: &Router, uri: &str, cookies: Option<&str>) -> Response<Body> {
    let mut req = Request::builder().method("GET").uri(uri);
    if let Some(c) = cookies {
        req = req.header(header::COOKIE, c);
    }
    app.clone()
        .oneshot(req.body(Body::empty()).expect("failed to build request"))
        .await
        .expect("request failed")
}

pub async fn json_body(resp: Response<Body>) -> Value {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&body).expect("response body was not JSON")
}

pub fn location(resp: &Response<Body>) -> Option<String> {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Hand-rolled `multipart/form-data` body.
pub struct MultipartBody {
    boundary: String,
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "digs-test-boundary-7MA4YWxkTrZu0gW".to_string(),
            buf: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str, cookies: &str) -> Request<Body> {
        self.buf
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .header(header::COOKIE, cookies)
            .body(Body::from(Bytes::from(self.buf)))
            .expect("failed to build request")
    }
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.expect("request failed")
}
