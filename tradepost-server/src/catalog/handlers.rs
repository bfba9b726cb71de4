use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Serialize;

use tradepost_model::{
    CategoriesWithChildren, Category, CategoryAttribute, CategoryId, Comment, Listing, ListingId,
    ListingQuery, PAGE_SIZE, filter_sort_page, grouped_categories,
};

use crate::AppState;
use crate::db::ListingDetail;
use crate::infra::errors::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub categories: Vec<CategoriesWithChildren>,
    pub latest: Vec<Listing>,
}

#[derive(Debug, Serialize)]
pub struct CategoryListingsResponse {
    pub category: String,
    /// Full filtered count, independent of the returned page.
    pub count: usize,
    pub attributes: Vec<CategoryAttribute>,
    pub listings: Vec<Listing>,
}

#[derive(Debug, Serialize)]
pub struct ListingDetailResponse {
    #[serde(flatten)]
    pub detail: ListingDetail,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub q: String,
    pub listings: Vec<Listing>,
}

pub async fn home_handler(State(state): State<AppState>) -> AppResult<Json<HomeResponse>> {
    let categories = state.db.categories.list_categories().await?;
    let latest = state.db.listings.latest_listings(PAGE_SIZE as i64).await?;

    Ok(Json(HomeResponse {
        categories: grouped_categories(categories),
        latest,
    }))
}

pub async fn list_categories_handler(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.db.categories.list_categories().await?))
}

/// One page of a category's listings, filtered and sorted per the query
/// string (`page`, `condition`, `sortBy`, `attr_<id>`).
pub async fn category_listings_handler(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<CategoryListingsResponse>> {
    let category = state
        .db
        .categories
        .get_category(CategoryId(category_id))
        .await?
        .ok_or_else(|| AppError::not_found("Category not found"))?;

    let query = parse_listing_query(&params)?;
    let attributes = state
        .db
        .categories
        .attributes_for_category(category.id)
        .await?;

    let listings = state.db.listings.listings_for_category(category.id).await?;
    let listing_ids: Vec<ListingId> = listings.iter().map(|l| l.id).collect();
    let values = state
        .db
        .listings
        .attribute_values_for_listings(&listing_ids)
        .await?;

    let page = filter_sort_page(listings, &values, &attributes, &query);

    Ok(Json(CategoryListingsResponse {
        category: category.name,
        count: page.count,
        attributes,
        listings: page.listings,
    }))
}

pub async fn listing_detail_handler(
    State(state): State<AppState>,
    Path(listing_id): Path<i64>,
) -> AppResult<Json<ListingDetailResponse>> {
    let detail = state
        .db
        .listings
        .get_listing_detail(ListingId(listing_id))
        .await?
        .ok_or_else(|| AppError::not_found("Listing not found"))?;

    let comments = state
        .db
        .comments
        .comments_for_listing(detail.listing.id)
        .await?;

    Ok(Json(ListingDetailResponse { detail, comments }))
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<SearchResponse>> {
    let q = params
        .get("q")
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing search query"))?;

    let listings = state.db.listings.search_listings(&q).await?;
    Ok(Json(SearchResponse { q, listings }))
}

/// Parse the category listing query string. Unknown parameters are ignored;
/// recognized ones with out-of-domain values are rejected.
fn parse_listing_query(params: &HashMap<String, String>) -> Result<ListingQuery, AppError> {
    let mut query = ListingQuery {
        page: 1,
        ..Default::default()
    };

    if let Some(raw) = params.get("page") {
        query.page = raw
            .parse::<u32>()
            .ok()
            .filter(|page| *page >= 1)
            .ok_or_else(|| AppError::bad_request("page must be a positive integer"))?;
    }

    if let Some(raw) = params.get("condition") {
        query.condition = raw.parse().map_err(AppError::bad_request)?;
    }

    if let Some(raw) = params.get("sortBy") {
        query.sort = raw.parse().map_err(AppError::bad_request)?;
    }

    for (key, value) in params {
        let Some(id) = key
            .strip_prefix("attr_")
            .and_then(|raw| raw.parse::<i64>().ok())
        else {
            continue;
        };
        query
            .attribute_filters
            .insert(tradepost_model::AttributeId(id), value.clone());
    }

    Ok(query)
}
