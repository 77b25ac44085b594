pub mod auth;

pub use auth::{AuthContext, CallerToken, RequireAuth, RouteGuard, route_guard};
