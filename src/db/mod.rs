//! Typed access to the hosted store.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring backend rows
//! - `schema.rs`: table and column names
//! - `store.rs`: request-scoped `ListingStore` validating rows at the boundary

pub mod models;
pub mod schema;
pub mod store;

pub use models::{
    Amenity, NewProperty, Profile, Property, PropertyAmenity, PropertyImage, PropertyType, Role,
    RowId,
};
pub use store::ListingStore;
