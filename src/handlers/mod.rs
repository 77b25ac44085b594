pub mod auth;
pub mod listings;
