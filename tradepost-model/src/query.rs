//! Category listing query core.
//!
//! The repository fetches a category's listings and their realized attribute
//! values; everything after that (condition and attribute filters, sort,
//! pagination) is this pure function, so the contract is testable without a
//! store.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::catalog::CategoryAttribute;
use crate::ids::{AttributeId, ListingId};
use crate::listing::{ConditionFilter, Listing, SortKey};

/// Fixed page size for category listing pages.
pub const PAGE_SIZE: usize = 8;

/// Parsed query parameters for one category listing request.
#[derive(Debug, Clone, Default)]
pub struct ListingQuery {
    pub condition: ConditionFilter,
    pub sort: SortKey,
    /// 1-based; 0 is normalized to 1.
    pub page: u32,
    /// Values keyed by attribute id, from `attr_<id>` query parameters.
    /// Empty values are ignored.
    pub attribute_filters: BTreeMap<AttributeId, String>,
}

/// One page of a filtered, sorted category listing view.
#[derive(Debug, Clone, Serialize)]
pub struct PagedListings {
    /// Size of the full filtered set, independent of the requested page.
    pub count: usize,
    pub listings: Vec<Listing>,
}

/// Filter, sort, and slice a category's listings.
///
/// A listing survives when its condition passes the filter and, for every
/// category attribute with a non-empty supplied filter value, its stored
/// value equals the filter exactly. Attributes without a supplied filter are
/// unconstrained. Filter values unknown to a select attribute simply match
/// nothing; there is no read-time domain check.
pub fn filter_sort_page(
    listings: Vec<Listing>,
    attribute_values: &HashMap<ListingId, BTreeMap<AttributeId, String>>,
    category_attributes: &[CategoryAttribute],
    query: &ListingQuery,
) -> PagedListings {
    let active_filters: Vec<(AttributeId, &str)> = category_attributes
        .iter()
        .filter_map(|ca| {
            let value = query.attribute_filters.get(&ca.attribute.id)?;
            let value = value.trim();
            (!value.is_empty()).then_some((ca.attribute.id, value))
        })
        .collect();

    let mut filtered: Vec<Listing> = listings
        .into_iter()
        .filter(|listing| query.condition.matches(listing.condition))
        .filter(|listing| {
            active_filters.iter().all(|(attribute_id, wanted)| {
                attribute_values
                    .get(&listing.id)
                    .and_then(|values| values.get(attribute_id))
                    .is_some_and(|stored| stored == wanted)
            })
        })
        .collect();

    // Stable sorts keep the store's natural order on ties.
    match query.sort {
        SortKey::Price => filtered.sort_by_key(|l| l.sum),
        SortKey::CreatedAt => filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }

    let count = filtered.len();
    let page = query.page.max(1) as usize;
    let listings = filtered
        .into_iter()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .collect();

    PagedListings { count, listings }
}
