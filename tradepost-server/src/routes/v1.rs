use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};

use crate::{
    AppState,
    auth::{self, middleware::auth_middleware},
    catalog::handlers::{
        category_listings_handler, home_handler, list_categories_handler, listing_detail_handler,
        search_handler,
    },
    images::handlers as image_handlers,
    listings::handlers as listing_handlers,
};

/// Five images at 700KB each, plus form fields and multipart overhead.
const LISTING_FORM_BODY_LIMIT: usize = 8 * 1024 * 1024;

/// Create all v1 API routes
pub fn create_v1_router(state: AppState) -> Router<AppState> {
    // Combine all routes
    Router::new()
        // Public authentication endpoints
        .route("/auth/register", post(auth::handlers::register))
        .route("/auth/login", post(auth::handlers::login))
        // Public catalog endpoints
        .route("/home", get(home_handler))
        .route("/categories", get(list_categories_handler))
        .route("/categories/{id}/listings", get(category_listings_handler))
        .route("/listings/{id}", get(listing_detail_handler))
        .route("/search", get(search_handler))
        // Stored images
        .route("/images/{key}", get(image_handlers::serve_image_handler))
        // Merge protected routes
        .merge(create_protected_routes(state))
}

/// Create protected routes that require authentication
fn create_protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Auth endpoints
        .route("/auth/logout", post(auth::handlers::logout))
        .route("/users/me", get(auth::handlers::me))
        // Owner-scoped listing reads
        .route("/my/listings", get(listing_handlers::my_listings_handler))
        .route("/my/listings/{id}", get(listing_handlers::my_listing_handler))
        // Listing mutations
        .route("/listings", post(listing_handlers::create_listing_handler))
        .route("/listings/{id}", put(listing_handlers::update_listing_handler))
        .route(
            "/listings/{id}",
            axum::routing::delete(listing_handlers::delete_listing_handler),
        )
        .layer(DefaultBodyLimit::max(LISTING_FORM_BODY_LIMIT))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
