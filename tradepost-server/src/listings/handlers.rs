use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde::Serialize;

use tradepost_model::rbac::AuthContext;
use tradepost_model::{Listing, ListingId, User};

use crate::AppState;
use crate::db::ListingDetail;
use crate::infra::errors::{AppError, AppResult};
use crate::listings::form::parse_listing_form;
use crate::listings::service::ListingMutationService;

#[derive(Debug, Serialize)]
pub struct MutatedListing {
    pub id: ListingId,
}

pub async fn my_listings_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> AppResult<Json<Vec<Listing>>> {
    Ok(Json(state.db.listings.listings_for_owner(user.id).await?))
}

/// A single listing of the caller's. 404 covers both "absent" and "not
/// yours", like the rest of the owner-scoped surface.
pub async fn my_listing_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(listing_id): Path<i64>,
) -> AppResult<Json<ListingDetail>> {
    let detail = state
        .db
        .listings
        .get_listing_detail(ListingId(listing_id))
        .await?
        .filter(|detail| detail.listing.owner_id == user.id)
        .ok_or_else(|| AppError::not_found("Listing not found"))?;

    Ok(Json(detail))
}

pub async fn create_listing_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(context): Extension<AuthContext>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<MutatedListing>)> {
    let form = parse_listing_form(multipart).await?;
    let id = ListingMutationService::new(&state)
        .create(&user, &context, form)
        .await?;
    Ok((StatusCode::CREATED, Json(MutatedListing { id })))
}

pub async fn update_listing_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(context): Extension<AuthContext>,
    Path(listing_id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Json<MutatedListing>> {
    let form = parse_listing_form(multipart).await?;
    let id = ListingMutationService::new(&state)
        .update(&user, &context, ListingId(listing_id), form)
        .await?;
    Ok(Json(MutatedListing { id }))
}

pub async fn delete_listing_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(context): Extension<AuthContext>,
    Path(listing_id): Path<i64>,
) -> AppResult<StatusCode> {
    ListingMutationService::new(&state)
        .delete(&user, &context, ListingId(listing_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
