//! Listing mutation service.
//!
//! Create, update, and delete run through here so every path gets the same
//! treatment: permission check, per-category schema validation, image uploads
//! before any row is written, and one transaction for the row writes.

use tracing::{info, warn};

use tradepost_model::rbac::AuthContext;
use tradepost_model::{
    CategoryId, ListingDraft, ListingId, ListingSchema, User, ValidationErrors,
};

use crate::AppState;
use crate::auth::gate::require_permission;
use crate::infra::errors::{AppError, AppResult};
use crate::listings::form::ListingForm;

pub struct ListingMutationService<'a> {
    state: &'a AppState,
}

impl<'a> ListingMutationService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn create(
        &self,
        user: &User,
        context: &AuthContext,
        form: ListingForm,
    ) -> AppResult<ListingId> {
        require_permission(context, "create:listing:own")?;

        let draft = self.validate_form(&form).await?;
        let images = self.upload_images(&form).await?;

        let listing_id = self
            .state
            .db
            .listings
            .create_listing(&draft, user.id, &images)
            .await?;

        info!(
            "Listing {} created in category {} by {}",
            listing_id, draft.category_id, user.id
        );

        Ok(listing_id)
    }

    pub async fn update(
        &self,
        user: &User,
        context: &AuthContext,
        listing_id: ListingId,
        form: ListingForm,
    ) -> AppResult<ListingId> {
        let existing = self
            .state
            .db
            .listings
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| AppError::not_found("Listing not found"))?;

        if existing.owner_id == user.id {
            require_permission(context, "update:listing:own")?;
        } else {
            require_permission(context, "update:listing:any")?;
        }

        let draft = self.validate_form(&form).await?;
        let images = self.upload_images(&form).await?;

        self.state
            .db
            .listings
            .update_listing(listing_id, &draft, &images)
            .await?;

        // Keys dropped from the submission are dead now; losing one only
        // leaks a file, so a failed delete is logged and nothing more.
        for key in existing.images.iter().filter(|k| !images.contains(k)) {
            if let Err(e) = self.state.images.remove(key).await {
                warn!("Failed to delete image {key} for listing {listing_id}: {e}");
            }
        }

        info!("Listing {} updated by {}", listing_id, user.id);

        Ok(listing_id)
    }

    pub async fn delete(
        &self,
        user: &User,
        context: &AuthContext,
        listing_id: ListingId,
    ) -> AppResult<()> {
        let existing = self
            .state
            .db
            .listings
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| AppError::not_found("Listing not found"))?;

        if existing.owner_id == user.id {
            require_permission(context, "delete:listing:own")?;
        } else {
            require_permission(context, "delete:listing:any")?;
        }

        let deleted = self.state.db.listings.delete_listing(listing_id).await?;
        if !deleted {
            return Err(AppError::not_found("Listing not found"));
        }

        for key in &existing.images {
            if let Err(e) = self.state.images.remove(key).await {
                warn!("Failed to delete image {key} for listing {listing_id}: {e}");
            }
        }

        info!("Listing {} deleted by {}", listing_id, user.id);

        Ok(())
    }

    /// Resolve the submitted category's attributes, derive the schema, and
    /// validate the whole submission. Nothing is written when this fails.
    async fn validate_form(&self, form: &ListingForm) -> AppResult<ListingDraft> {
        // The category decides which attribute fields exist, so it is read
        // before validation; an unknown id resolves to an empty attribute
        // set and is rejected below.
        let category_id = form
            .fields
            .get("categoryId")
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0);

        let attributes = self
            .state
            .db
            .categories
            .attributes_for_category(CategoryId(category_id))
            .await?;

        let schema = ListingSchema::for_attributes(&attributes);
        let draft = schema.validate(&form.fields, form.image_count())?;

        let category = self
            .state
            .db
            .categories
            .get_category(draft.category_id)
            .await?;

        match category {
            None => {
                let mut errors = ValidationErrors::default();
                errors.push("categoryId", "Must be a valid category");
                Err(AppError::validation(errors))
            }
            Some(category) if !category.is_child() => {
                let mut errors = ValidationErrors::default();
                errors.push("categoryId", "Must be a child category");
                Err(AppError::validation(errors))
            }
            Some(_) => Ok(draft),
        }
    }

    /// Push new uploads into the image store. Runs before the database
    /// transaction; any failure aborts the whole operation.
    async fn upload_images(&self, form: &ListingForm) -> AppResult<Vec<String>> {
        let mut keys = form.kept_images.clone();
        for bytes in &form.uploads {
            let key = self
                .state
                .images
                .put(bytes.clone())
                .await
                .map_err(|e| AppError::internal(format!("Failed to store image: {e}")))?;
            keys.push(key);
        }
        Ok(keys)
    }
}
