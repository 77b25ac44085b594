pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod middleware;
pub mod router;
pub mod session;
pub mod views;

pub use error::DigsError;
pub use router::{DigsState, digs_router};
