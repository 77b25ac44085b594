use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, warn};

use crate::db::{Amenity, RowId};
use crate::error::DigsError;
use crate::listing::{
    self, ImageFile, ListingFilters, ListingForm, browse_listings, latest_listings, listing_detail,
};
use crate::middleware::{CallerToken, RequireAuth};
use crate::router::DigsState;
use crate::views::{ListingCreatedView, ListingFormView, ListingsPage, PropertyDetailView};

/// GET / -> latest listings.
pub async fn home(
    State(state): State<DigsState>,
    CallerToken(token): CallerToken,
) -> Result<Json<ListingsPage>, DigsError> {
    let cfg = &state.config.listings;
    let store = state.store(token);
    let summaries = latest_listings(&store, cfg.home_limit, &cfg.placeholder_image).await?;
    Ok(Json(ListingsPage::new(summaries, &cfg.currency)))
}

/// GET /properties -> filtered listings. No query string is the reset state.
pub async fn browse(
    State(state): State<DigsState>,
    CallerToken(token): CallerToken,
    Query(filters): Query<ListingFilters>,
) -> Result<Json<ListingsPage>, DigsError> {
    let cfg = &state.config.listings;
    let store = state.store(token);
    let summaries = browse_listings(&store, &filters, &cfg.placeholder_image)
        .await
        .inspect_err(|e| warn!(error = %e, ?filters, "failed to fetch listings"))?;
    Ok(Json(ListingsPage::new(summaries, &cfg.currency)))
}

/// GET /properties/{id}
pub async fn detail(
    State(state): State<DigsState>,
    CallerToken(token): CallerToken,
    Path(id): Path<String>,
) -> Result<Json<PropertyDetailView>, DigsError> {
    let cfg = &state.config.listings;
    let store = state.store(token);
    let Ok(id) = id.parse::<RowId>();
    let detail = listing_detail(&store, &id, &cfg.detail_placeholder_image).await?;
    Ok(Json(PropertyDetailView::new(detail, &cfg.currency)))
}

/// GET /amenities
pub async fn amenities(
    State(state): State<DigsState>,
    CallerToken(token): CallerToken,
) -> Result<Json<Vec<Amenity>>, DigsError> {
    Ok(Json(state.store(token).amenities().await?))
}

/// GET /dashboard/new -> blank form with the amenity checklist.
pub async fn new_listing_form(
    State(state): State<DigsState>,
    RequireAuth(ctx): RequireAuth,
) -> Result<Json<ListingFormView>, DigsError> {
    let store = state.store(Some(ctx.access_token));
    let amenities = store.amenities().await?;
    Ok(Json(ListingFormView::new(&state.config.listings, amenities)))
}

/// POST /dashboard/new (multipart) -> create a listing.
pub async fn create(
    State(state): State<DigsState>,
    CallerToken(token): CallerToken,
    multipart: Multipart,
) -> Result<impl IntoResponse, DigsError> {
    let (form, images) = read_listing_form(multipart).await?;
    let store = state.store(token);

    let mut steps = Vec::new();
    let created = listing::create_listing(
        &store,
        &state.config.listings,
        &form,
        images,
        |percent| {
            debug!(percent, "upload progress");
            steps.push(percent);
        },
    )
    .await
    .inspect_err(|e| warn!(error = %e, "listing submission failed"))?;

    Ok((
        StatusCode::CREATED,
        Json(ListingCreatedView::new(created, steps)),
    ))
}

/// Split the multipart body into form fields and image files. Amenities may
/// repeat or arrive comma-separated; empty file inputs are skipped.
pub async fn read_listing_form(
    mut multipart: Multipart,
) -> Result<(ListingForm, Vec<ImageFile>), DigsError> {
    let mut form = ListingForm::default();
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" | "images[]" | "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                images.push(ImageFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "amenities" | "amenities[]" => {
                let text = field.text().await?;
                form.amenities
                    .extend(text.split(',').map(|s| s.trim().to_string()));
            }
            "title" => form.title = field.text().await?,
            "description" => form.description = field.text().await?,
            "price" => form.price = field.text().await?,
            "address" => form.address = field.text().await?,
            "latitude" => form.latitude = field.text().await?,
            "longitude" => form.longitude = field.text().await?,
            "location" => form.location = field.text().await?,
            "type" => form.property_type = field.text().await?,
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }
    Ok((form, images))
}
