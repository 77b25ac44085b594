use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument, warn};

use super::images::{
    ImageFile, UploadPhase, sanitize_file_name, storage_key, upload_progress, validate_images,
};
use crate::config::ListingConfig;
use crate::db::{
    ListingStore, NewProperty, Property, PropertyAmenity, PropertyImage, PropertyType, RowId,
};
use crate::error::{DigsError, ValidationError, WriteStep};

/// Raw listing form fields as submitted. Empty strings mean "not provided".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingForm {
    pub title: String,
    pub description: String,
    pub price: String,
    pub address: String,
    pub latitude: String,
    pub longitude: String,
    /// Free-text area the browser filters on.
    pub location: String,
    #[serde(rename = "type")]
    pub property_type: String,
    pub amenities: Vec<String>,
}

/// A form that passed local validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDraft {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub location: Option<String>,
    pub property_type: Option<PropertyType>,
    pub amenity_ids: Vec<RowId>,
}

impl ListingForm {
    /// Local checks only; nothing here touches the backend.
    /// Coordinates left blank fall back to the map picker's start position.
    pub fn validate(&self, default_center: [f64; 2]) -> Result<ListingDraft, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingTitle);
        }

        let price = self
            .price
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or(ValidationError::InvalidPrice)?;

        let latitude = parse_coordinate(&self.latitude, default_center[0], 90.0)?;
        let longitude = parse_coordinate(&self.longitude, default_center[1], 180.0)?;

        let property_type = match non_empty(&self.property_type) {
            None => None,
            Some(t) => Some(
                t.parse::<PropertyType>()
                    .map_err(|_| ValidationError::InvalidPropertyType(t.to_string()))?,
            ),
        };

        // Amenity ids are integer keys of the catalogue.
        let mut seen = HashSet::new();
        let mut amenity_ids = Vec::new();
        for raw in self.amenities.iter().filter_map(|raw| non_empty(raw)) {
            let id = raw
                .parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| ValidationError::InvalidAmenity(raw.to_string()))?;
            if seen.insert(id) {
                amenity_ids.push(RowId::Int(id));
            }
        }

        Ok(ListingDraft {
            title: title.to_string(),
            description: non_empty(&self.description).map(str::to_string),
            price,
            latitude,
            longitude,
            address: non_empty(&self.address).map(str::to_string),
            location: non_empty(&self.location).map(str::to_string),
            property_type,
            amenity_ids,
        })
    }
}

impl ListingDraft {
    pub fn into_new_property(self, landlord_id: RowId) -> (NewProperty, Vec<RowId>) {
        let property = NewProperty {
            title: self.title,
            description: self.description,
            price: self.price,
            latitude: self.latitude,
            longitude: self.longitude,
            address: self.address,
            location: self.location,
            property_type: self.property_type,
            landlord_id,
        };
        (property, self.amenity_ids)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

fn parse_coordinate(raw: &str, fallback: f64, bound: f64) -> Result<f64, ValidationError> {
    let value = match non_empty(raw) {
        None => fallback,
        Some(v) => v.parse::<f64>().map_err(|_| ValidationError::InvalidLocation)?,
    };
    if !value.is_finite() || value.abs() > bound {
        return Err(ValidationError::InvalidLocation);
    }
    Ok(value)
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedListing {
    pub property: Property,
    pub amenities: Vec<PropertyAmenity>,
    pub images: Vec<PropertyImage>,
}

/// Rows and blobs written so far for one submission.
struct PartialListing<'a> {
    store: &'a ListingStore,
    property_id: RowId,
    uploaded: Vec<String>,
    rollback: bool,
}

impl PartialListing<'_> {
    /// Undo what was written, then hand back the original error.
    async fn abort(self, err: DigsError) -> DigsError {
        warn!(property_id = %self.property_id, error = %err, "listing creation aborted");
        if !self.rollback {
            return err;
        }
        if let Err(e) = self.store.remove_images(&self.uploaded).await {
            warn!(property_id = %self.property_id, error = %e, "rollback: failed to remove blobs");
        }
        if let Err(e) = self.store.delete_property_images(&self.property_id).await {
            warn!(property_id = %self.property_id, error = %e, "rollback: failed to delete image rows");
        }
        if let Err(e) = self.store.delete_property_amenities(&self.property_id).await {
            warn!(property_id = %self.property_id, error = %e, "rollback: failed to delete amenity rows");
        }
        match self.store.delete_property(&self.property_id).await {
            Ok(()) => info!(property_id = %self.property_id, "rollback: property removed"),
            Err(e) => {
                warn!(property_id = %self.property_id, error = %e, "rollback: failed to delete property")
            }
        }
        err
    }
}

/// Create a property with its amenities and images.
///
/// Order: resolve the caller, validate the form and every image, insert the
/// property, insert amenity links, then upload images one at a time, each
/// followed by its metadata row. The first image stored is the primary one.
/// `progress` receives the overall percentage as images advance.
#[instrument(skip_all, fields(images = images.len()))]
pub async fn create_listing<P>(
    store: &ListingStore,
    cfg: &ListingConfig,
    form: &ListingForm,
    images: Vec<ImageFile>,
    mut progress: P,
) -> Result<CreatedListing, DigsError>
where
    P: FnMut(u8) + Send,
{
    let user = store.current_user().await?.ok_or(DigsError::NotLoggedIn)?;

    let draft = form.validate(cfg.default_center)?;
    validate_images(&images, cfg.max_image_bytes)?;

    let (new_property, amenity_ids) = draft.into_new_property(user.id.clone());
    let property = store
        .insert_property(&new_property)
        .await
        .map_err(|e| e.during(WriteStep::Property))?;
    info!(property_id = %property.id, landlord_id = %user.id, "property created");

    let mut partial = PartialListing {
        store,
        property_id: property.id.clone(),
        uploaded: Vec::new(),
        rollback: cfg.rollback_partial_listings,
    };

    let mut amenities = Vec::new();
    if !amenity_ids.is_empty() {
        let links: Vec<PropertyAmenity> = amenity_ids
            .into_iter()
            .map(|amenity_id| PropertyAmenity {
                property_id: property.id.clone(),
                amenity_id,
            })
            .collect();
        match store.insert_property_amenities(&links).await {
            Ok(stored) => amenities = stored,
            Err(e) => return Err(partial.abort(e.during(WriteStep::Amenities)).await),
        }
    }

    let total = images.len();
    let mut stored_images: Vec<PropertyImage> = Vec::with_capacity(total);
    for (index, image) in images.into_iter().enumerate() {
        let name = sanitize_file_name(&image.file_name);
        let path = storage_key(
            &user.id,
            &property.id,
            Utc::now().timestamp_millis(),
            index,
            &name,
        );
        progress(upload_progress(index, total, UploadPhase::Prepared));

        if let Err(e) = store
            .upload_image(&path, image.bytes, &image.content_type)
            .await
        {
            return Err(partial.abort(e.during(WriteStep::ImageUpload)).await);
        }
        partial.uploaded.push(path.clone());

        let row = PropertyImage {
            property_id: property.id.clone(),
            public_url: Some(store.public_url(&path)),
            storage_path: path,
            is_primary: stored_images.is_empty(),
        };
        match store.insert_property_image(&row).await {
            Ok(saved) => stored_images.push(saved),
            Err(e) => return Err(partial.abort(e.during(WriteStep::ImageMetadata)).await),
        }
        progress(upload_progress(index, total, UploadPhase::Persisted));
    }

    info!(
        property_id = %property.id,
        images = stored_images.len(),
        amenities = amenities.len(),
        "listing created"
    );
    Ok(CreatedListing {
        property,
        amenities,
        images: stored_images,
    })
}
