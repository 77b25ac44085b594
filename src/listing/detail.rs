use serde::Serialize;
use tracing::debug;

use crate::db::{ListingStore, Profile, Property, PropertyImage, RowId};
use crate::error::DigsError;

#[derive(Debug, Clone, Serialize)]
pub struct ListingDetail {
    pub property: Property,
    pub landlord: Option<Profile>,
    pub images: Vec<PropertyImage>,
    /// Primary image URL, or the detail placeholder.
    pub image_url: String,
    pub amenities: Vec<String>,
}

/// Property with landlord contact, images and amenity names.
pub async fn listing_detail(
    store: &ListingStore,
    id: &RowId,
    placeholder: &str,
) -> Result<ListingDetail, DigsError> {
    // An id the table cannot even compare against is just a missing listing.
    let property = match store.property(id).await {
        Ok(Some(property)) => property,
        Ok(None) => return Err(DigsError::NotFound),
        Err(DigsError::Upstream { status, message }) if status.is_client_error() => {
            debug!(%id, %status, %message, "property lookup rejected");
            return Err(DigsError::NotFound);
        }
        Err(e) => return Err(e),
    };
    let landlord = store.profile(&property.landlord_id).await?;
    let images = store.property_images(&property.id).await?;

    let links = store.property_amenity_links(&property.id).await?;
    let amenity_ids: Vec<RowId> = links.into_iter().map(|l| l.amenity_id).collect();
    let catalog = store.amenities_by_ids(&amenity_ids).await?;
    let amenities = amenity_ids
        .iter()
        .filter_map(|id| catalog.iter().find(|a| &a.id == id))
        .map(|a| a.name.clone())
        .collect();

    let image_url = images
        .iter()
        .find(|img| img.is_primary)
        .map(|img| {
            img.public_url
                .clone()
                .unwrap_or_else(|| store.public_url(&img.storage_path))
        })
        .unwrap_or_else(|| placeholder.to_string());

    Ok(ListingDetail {
        property,
        landlord,
        images,
        image_url,
        amenities,
    })
}
