//! JSON view models for the pages. Formatting only.

use serde::Serialize;

use crate::config::ListingConfig;
use crate::db::{Amenity, RowId};
use crate::listing::{CreatedListing, ListingDetail, ListingForm, ListingSummary};

/// `ZMW 1500/month`; whole amounts drop the decimals.
pub fn price_label(price: f64, currency: &str) -> String {
    if price.fract() == 0.0 {
        format!("{currency} {price:.0}/month")
    } else {
        format!("{currency} {price:.2}/month")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyCard {
    pub id: RowId,
    pub title: String,
    pub location: Option<String>,
    pub price: f64,
    pub price_label: String,
    pub image_url: String,
    pub href: String,
}

impl PropertyCard {
    pub fn from_summary(summary: ListingSummary, currency: &str) -> Self {
        let ListingSummary {
            property,
            image_url,
        } = summary;
        Self {
            href: format!("/properties/{}", property.id),
            price_label: price_label(property.price, currency),
            id: property.id,
            title: property.title,
            location: property.location,
            price: property.price,
            image_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingsPage {
    pub properties: Vec<PropertyCard>,
    /// Shown when nothing matched.
    pub empty_message: Option<&'static str>,
}

impl ListingsPage {
    pub fn new(summaries: Vec<ListingSummary>, currency: &str) -> Self {
        let properties: Vec<PropertyCard> = summaries
            .into_iter()
            .map(|s| PropertyCard::from_summary(s, currency))
            .collect();
        let empty_message = properties.is_empty().then_some("No properties found.");
        Self {
            properties,
            empty_message,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LandlordContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub contact_href: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyDetailView {
    pub id: RowId,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub amenities: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub price_label: String,
    pub landlord: LandlordContact,
    pub back_href: &'static str,
}

impl PropertyDetailView {
    pub fn new(detail: ListingDetail, currency: &str) -> Self {
        let ListingDetail {
            property,
            landlord,
            image_url,
            amenities,
            ..
        } = detail;
        let landlord = landlord.unwrap_or_else(|| crate::db::Profile {
            id: property.landlord_id.clone(),
            name: None,
            email: None,
            phone: None,
            role: None,
        });
        Self {
            price_label: price_label(property.price, currency),
            description: property
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| "No description available".to_string()),
            address: property
                .address
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| "Location set on map".to_string()),
            landlord: LandlordContact {
                name: landlord.name.unwrap_or_else(|| "Unknown".to_string()),
                contact_href: landlord.email.as_ref().map(|e| format!("mailto:{e}")),
                email: landlord.email,
                phone: landlord.phone,
            },
            id: property.id,
            title: property.title,
            image_url,
            amenities,
            latitude: property.latitude,
            longitude: property.longitude,
            back_href: "/properties",
        }
    }
}

/// Everything the creation form needs to render, in its initial state.
#[derive(Debug, Clone, Serialize)]
pub struct ListingFormView {
    pub form: ListingForm,
    pub default_center: [f64; 2],
    pub amenities: Vec<Amenity>,
    pub accept: &'static str,
    pub max_image_bytes: u64,
}

impl ListingFormView {
    pub fn new(cfg: &ListingConfig, amenities: Vec<Amenity>) -> Self {
        Self {
            form: ListingForm::default(),
            default_center: cfg.default_center,
            amenities,
            accept: "image/*",
            max_image_bytes: cfg.max_image_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingCreatedView {
    pub message: &'static str,
    pub progress: u8,
    pub progress_steps: Vec<u8>,
    pub listing: CreatedListing,
    pub href: String,
    /// Cleared form to render next.
    pub form: ListingForm,
}

impl ListingCreatedView {
    pub fn new(listing: CreatedListing, progress_steps: Vec<u8>) -> Self {
        Self {
            message: "Property added successfully!",
            progress: progress_steps.last().copied().unwrap_or(100),
            href: format!("/properties/{}", listing.property.id),
            progress_steps,
            listing,
            form: ListingForm::default(),
        }
    }
}
