use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::RowQuery;
use crate::db::schema::{COL_CREATED_AT, COL_LOCATION, COL_PRICE, COL_TYPE, PROPERTIES};
use crate::db::{ListingStore, Property, PropertyImage, PropertyType, RowId};
use crate::error::{DigsError, ValidationError};

/// Browser filter fields. Every field is optional and blanks are ignored,
/// so the default value is the "reset" state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingFilters {
    pub location: Option<String>,
    /// `all` behaves like no type filter.
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    #[serde(alias = "priceMin")]
    pub price_min: Option<String>,
    #[serde(alias = "priceMax")]
    pub price_max: Option<String>,
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_price(raw: &str) -> Result<f64, ValidationError> {
    raw.parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .ok_or_else(|| ValidationError::InvalidPriceFilter(raw.to_string()))
}

impl ListingFilters {
    /// Newest-first `properties` query with only the filters that are set.
    pub fn to_query(&self) -> Result<RowQuery, ValidationError> {
        let mut query = RowQuery::table(PROPERTIES).order_by(COL_CREATED_AT, false);

        if let Some(location) = non_empty(&self.location) {
            query = query.eq(COL_LOCATION, location);
        }
        if let Some(kind) = non_empty(&self.property_type)
            && !kind.eq_ignore_ascii_case("all")
        {
            let kind = kind
                .parse::<PropertyType>()
                .map_err(|_| ValidationError::InvalidPropertyType(kind.to_string()))?;
            query = query.eq(COL_TYPE, kind.as_str());
        }
        if let Some(min) = non_empty(&self.price_min) {
            query = query.gte(COL_PRICE, parse_price(min)?);
        }
        if let Some(max) = non_empty(&self.price_max) {
            query = query.lte(COL_PRICE, parse_price(max)?);
        }
        Ok(query)
    }
}

/// A property with the URL of its card image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingSummary {
    pub property: Property,
    pub image_url: String,
}

/// Filtered listings, newest first, each with its primary image or the
/// placeholder.
pub async fn browse_listings(
    store: &ListingStore,
    filters: &ListingFilters,
    placeholder: &str,
) -> Result<Vec<ListingSummary>, DigsError> {
    let query = filters.to_query()?;
    let properties = store.properties(&query).await?;
    debug!(count = properties.len(), "listings fetched");
    Ok(attach_primary_images(store, properties, placeholder).await)
}

/// Newest listings for the landing page.
pub async fn latest_listings(
    store: &ListingStore,
    limit: usize,
    placeholder: &str,
) -> Result<Vec<ListingSummary>, DigsError> {
    let query = ListingFilters::default().to_query()?.limit(limit);
    let properties = store.properties(&query).await?;
    Ok(attach_primary_images(store, properties, placeholder).await)
}

/// Second round-trip for primary images, joined in memory. A failed image
/// lookup degrades to placeholders instead of failing the page.
async fn attach_primary_images(
    store: &ListingStore,
    properties: Vec<Property>,
    placeholder: &str,
) -> Vec<ListingSummary> {
    if properties.is_empty() {
        return Vec::new();
    }
    let ids: Vec<RowId> = properties.iter().map(|p| p.id.clone()).collect();
    let images = match store.primary_images(&ids).await {
        Ok(images) => images,
        Err(e) => {
            warn!(error = %e, "failed to fetch primary images");
            Vec::new()
        }
    };
    join_primary_images(properties, &images, |path| store.public_url(path), placeholder)
}

pub fn join_primary_images<F>(
    properties: Vec<Property>,
    images: &[PropertyImage],
    public_url: F,
    placeholder: &str,
) -> Vec<ListingSummary>
where
    F: Fn(&str) -> String,
{
    properties
        .into_iter()
        .map(|property| {
            let image_url = images
                .iter()
                .find(|img| img.property_id == property.id)
                .map(|img| public_url(&img.storage_path))
                .unwrap_or_else(|| placeholder.to_string());
            ListingSummary {
                property,
                image_url,
            }
        })
        .collect()
}
