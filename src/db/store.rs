use axum::body::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use super::models::{
    Amenity, NewProperty, Profile, Property, PropertyAmenity, PropertyImage, RowId,
};
use super::schema::*;
use crate::backend::{AuthUser, Backend, BlobUpload, RowQuery};
use crate::error::DigsError;

/// Typed view of the backend for one caller.
///
/// Created per request with the caller's access token so row-level policies
/// apply to every call made through it.
#[derive(Clone)]
pub struct ListingStore {
    backend: Arc<dyn Backend>,
    bucket: String,
    access_token: Option<String>,
}

impl ListingStore {
    pub fn new(backend: Arc<dyn Backend>, bucket: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
            access_token,
        }
    }

    fn auth(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// The signed-in caller, or `None` without a token or with a rejected one.
    pub async fn current_user(&self) -> Result<Option<AuthUser>, DigsError> {
        match self.auth() {
            Some(token) => self.backend.get_user(token).await,
            None => Ok(None),
        }
    }

    pub async fn profile(&self, user_id: &RowId) -> Result<Option<Profile>, DigsError> {
        let query = RowQuery::table(PROFILES).eq(COL_ID, user_id).limit(1);
        Ok(self.fetch::<Profile>(&query).await?.into_iter().next())
    }

    pub async fn amenities(&self) -> Result<Vec<Amenity>, DigsError> {
        let query = RowQuery::table(AMENITIES).order_by(COL_ID, true);
        self.fetch(&query).await
    }

    pub async fn amenities_by_ids(&self, ids: &[RowId]) -> Result<Vec<Amenity>, DigsError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = RowQuery::table(AMENITIES).is_in(COL_ID, ids);
        self.fetch(&query).await
    }

    /// Runs a `properties` query built by the caller.
    pub async fn properties(&self, query: &RowQuery) -> Result<Vec<Property>, DigsError> {
        self.fetch(query).await
    }

    pub async fn property(&self, id: &RowId) -> Result<Option<Property>, DigsError> {
        let query = RowQuery::table(PROPERTIES).eq(COL_ID, id).limit(1);
        Ok(self.fetch::<Property>(&query).await?.into_iter().next())
    }

    pub async fn insert_property(&self, property: &NewProperty) -> Result<Property, DigsError> {
        let mut rows: Vec<Property> = self.insert(PROPERTIES, std::slice::from_ref(property)).await?;
        rows.pop().ok_or_else(|| DigsError::Upstream {
            status: axum::http::StatusCode::BAD_GATEWAY,
            message: "insert returned no row".to_string(),
        })
    }

    pub async fn insert_property_amenities(
        &self,
        links: &[PropertyAmenity],
    ) -> Result<Vec<PropertyAmenity>, DigsError> {
        self.insert(PROPERTY_AMENITIES, links).await
    }

    pub async fn insert_property_image(
        &self,
        image: &PropertyImage,
    ) -> Result<PropertyImage, DigsError> {
        let mut rows: Vec<PropertyImage> =
            self.insert(PROPERTY_IMAGES, std::slice::from_ref(image)).await?;
        Ok(rows.pop().unwrap_or_else(|| image.clone()))
    }

    /// Primary image rows for the given properties.
    pub async fn primary_images(&self, property_ids: &[RowId]) -> Result<Vec<PropertyImage>, DigsError> {
        let query = RowQuery::table(PROPERTY_IMAGES)
            .select("property_id,storage_path")
            .is_in(COL_PROPERTY_ID, property_ids)
            .eq(COL_IS_PRIMARY, true);
        let mut images: Vec<PropertyImage> = self.fetch(&query).await?;
        // Only primaries were requested; the projection omits the flag.
        images.iter_mut().for_each(|img| img.is_primary = true);
        Ok(images)
    }

    pub async fn property_images(&self, property_id: &RowId) -> Result<Vec<PropertyImage>, DigsError> {
        let query = RowQuery::table(PROPERTY_IMAGES).eq(COL_PROPERTY_ID, property_id);
        self.fetch(&query).await
    }

    pub async fn property_amenity_links(
        &self,
        property_id: &RowId,
    ) -> Result<Vec<PropertyAmenity>, DigsError> {
        let query = RowQuery::table(PROPERTY_AMENITIES).eq(COL_PROPERTY_ID, property_id);
        self.fetch(&query).await
    }

    pub async fn upload_image(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), DigsError> {
        let object = BlobUpload {
            bytes,
            content_type: content_type.to_string(),
            upsert: true,
        };
        self.backend
            .upload(self.auth(), &self.bucket, path, object)
            .await
    }

    pub async fn remove_images(&self, paths: &[String]) -> Result<(), DigsError> {
        if paths.is_empty() {
            return Ok(());
        }
        self.backend.remove(self.auth(), &self.bucket, paths).await
    }

    pub async fn delete_property_images(&self, property_id: &RowId) -> Result<(), DigsError> {
        let query = RowQuery::table(PROPERTY_IMAGES).eq(COL_PROPERTY_ID, property_id);
        self.backend.delete(self.auth(), &query).await
    }

    pub async fn delete_property_amenities(&self, property_id: &RowId) -> Result<(), DigsError> {
        let query = RowQuery::table(PROPERTY_AMENITIES).eq(COL_PROPERTY_ID, property_id);
        self.backend.delete(self.auth(), &query).await
    }

    pub async fn delete_property(&self, property_id: &RowId) -> Result<(), DigsError> {
        let query = RowQuery::table(PROPERTIES).eq(COL_ID, property_id);
        self.backend.delete(self.auth(), &query).await
    }

    pub fn public_url(&self, storage_path: &str) -> String {
        self.backend.public_url(&self.bucket, storage_path)
    }

    async fn fetch<T: DeserializeOwned>(&self, query: &RowQuery) -> Result<Vec<T>, DigsError> {
        let rows = self.backend.select(self.auth(), query).await?;
        decode_rows(table_label(query.table_name()), rows)
    }

    async fn insert<I, T>(&self, table: &'static str, items: &[I]) -> Result<Vec<T>, DigsError>
    where
        I: Serialize,
        T: DeserializeOwned,
    {
        let rows = items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;
        let stored = self.backend.insert(self.auth(), table, rows).await?;
        decode_rows(table, stored)
    }
}

fn decode_rows<T: DeserializeOwned>(table: &'static str, rows: Vec<Value>) -> Result<Vec<T>, DigsError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|source| DigsError::InvalidRow { table, source }))
        .collect()
}

fn table_label(name: &str) -> &'static str {
    [PROPERTIES, AMENITIES, PROPERTY_AMENITIES, PROPERTY_IMAGES, PROFILES]
        .into_iter()
        .find(|t| *t == name)
        .unwrap_or("unknown")
}
