//! Listing workflows: creation, browsing and the detail page.

pub mod browse;
pub mod create;
pub mod detail;
pub mod images;

pub use browse::{ListingFilters, ListingSummary, browse_listings, latest_listings};
pub use create::{CreatedListing, ListingDraft, ListingForm, create_listing};
pub use detail::{ListingDetail, listing_detail};
pub use images::ImageFile;
