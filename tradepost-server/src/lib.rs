//! # Tradepost Server
//!
//! Classifieds marketplace server.
//!
//! ## Overview
//!
//! Tradepost exposes a JSON API for browsing and selling:
//!
//! - **Catalog browsing**: category tree, per-category listing pages with
//!   dynamic attribute filters, sorting, and pagination
//! - **Listings**: create/update/delete with per-category attribute
//!   validation and image uploads
//! - **User management**: opaque session tokens carried in a cookie or
//!   bearer header, argon2 credentials
//! - **Authorization**: role/permission grants checked per request
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - PostgreSQL for persistent storage
//! - A content-addressed on-disk store for listing images

pub mod auth;
pub mod catalog;
pub mod db;
pub mod images;
pub mod infra;
pub mod listings;
pub mod routes;

pub use infra::app_state::AppState;

#[cfg(test)]
mod tests;
