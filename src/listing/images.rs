use axum::body::Bytes;

use crate::db::RowId;
use crate::error::ValidationError;

const MIB: u64 = 1024 * 1024;

/// An uploaded file as received from the listing form.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Checks the declared type and the size. Contents are not decoded.
pub fn validate_image(image: &ImageFile, max_bytes: u64) -> Result<(), ValidationError> {
    if !image.content_type.starts_with("image/") {
        return Err(ValidationError::NotAnImage {
            name: image.file_name.clone(),
        });
    }
    if image.size() > max_bytes {
        return Err(ValidationError::ImageTooLarge {
            name: image.file_name.clone(),
            limit_mib: max_bytes.div_ceil(MIB),
        });
    }
    Ok(())
}

/// At least one image, every one of them valid.
pub fn validate_images(images: &[ImageFile], max_bytes: u64) -> Result<(), ValidationError> {
    if images.is_empty() {
        return Err(ValidationError::NoImages);
    }
    images
        .iter()
        .try_for_each(|image| validate_image(image, max_bytes))
}

/// Restrict a client file name to `[a-z0-9._-]`: anything outside
/// `[a-zA-Z0-9.-]` becomes `_`, runs of `_` collapse, then lowercase.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        let ch = if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
            ch.to_ascii_lowercase()
        } else {
            '_'
        };
        if ch == '_' && out.ends_with('_') {
            continue;
        }
        out.push(ch);
    }
    if out.is_empty() || out.chars().all(|c| c == '_') {
        return "image".to_string();
    }
    out
}

/// `{landlord}/{property}/{millis}-{index}-{name}`. The index keeps two
/// same-named files from the same submission apart.
pub fn storage_key(
    landlord_id: &RowId,
    property_id: &RowId,
    unix_millis: i64,
    index: usize,
    sanitized_name: &str,
) -> String {
    format!("{landlord_id}/{property_id}/{unix_millis}-{index}-{sanitized_name}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    /// Validated and keyed, not yet stored.
    Prepared,
    /// Blob uploaded and metadata row written.
    Persisted,
}

/// Overall percentage after `index` reached `phase`. Every image owns an
/// equal share; each phase is half of it.
pub fn upload_progress(index: usize, total: usize, phase: UploadPhase) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = match phase {
        UploadPhase::Prepared => index as f64 + 0.5,
        UploadPhase::Persisted => index as f64 + 1.0,
    };
    ((done / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}
