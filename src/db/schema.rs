//! Table and column names of the hosted store.
//! The schema itself (and its row-level policies) lives with the backend.

pub const PROPERTIES: &str = "properties";
pub const AMENITIES: &str = "amenities";
pub const PROPERTY_AMENITIES: &str = "property_amenities";
pub const PROPERTY_IMAGES: &str = "property_images";
pub const PROFILES: &str = "profiles";

pub const COL_ID: &str = "id";
pub const COL_PROPERTY_ID: &str = "property_id";
pub const COL_IS_PRIMARY: &str = "is_primary";
pub const COL_CREATED_AT: &str = "created_at";
pub const COL_PRICE: &str = "price";
pub const COL_LOCATION: &str = "location";
pub const COL_TYPE: &str = "type";
