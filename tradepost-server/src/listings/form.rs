//! Multipart listing form decoding.
//!
//! The editor submits text fields (`title`, `description`, `sum`,
//! `categoryId`, `condition`, `attr_<id>`), new image files under `images`,
//! and the storage keys of images to keep under `imageId`. Decoding stops at
//! transport problems; field-level issues accumulate so the client gets the
//! full picture in one round trip.

use std::collections::BTreeMap;

use axum::extract::Multipart;
use tradepost_model::{MAX_IMAGE_BYTES, ValidationErrors};

use crate::infra::errors::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
pub struct ListingForm {
    /// All plain text fields, including `attr_<id>` values.
    pub fields: BTreeMap<String, String>,
    /// Newly uploaded image bodies, in submission order.
    pub uploads: Vec<Vec<u8>>,
    /// Storage keys of already-uploaded images the client kept.
    pub kept_images: Vec<String>,
}

impl ListingForm {
    pub fn image_count(&self) -> usize {
        self.kept_images.len() + self.uploads.len()
    }
}

pub async fn parse_listing_form(mut multipart: Multipart) -> AppResult<ListingForm> {
    let mut form = ListingForm::default();
    let mut errors = ValidationErrors::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "images" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request(format!("Failed to read upload: {e}")))?;
                // An empty file input still submits a zero-length part.
                if data.is_empty() {
                    continue;
                }
                if data.len() > MAX_IMAGE_BYTES {
                    errors.push("images", "Image size must be less than 700KB");
                    continue;
                }
                form.uploads.push(data.to_vec());
            }
            "imageId" => {
                let key = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(format!("Failed to read field: {e}")))?;
                if !key.is_empty() {
                    form.kept_images.push(key);
                }
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(format!("Failed to read field: {e}")))?;
                form.fields.insert(name, value);
            }
        }
    }

    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    Ok(form)
}
