use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AttributeId, CommentId, ListingId, UserId};

/// Physical condition of a listed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Used,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::Used => "used",
        }
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Condition::New),
            "used" => Ok(Condition::Used),
            other => Err(format!("unknown condition: {other}")),
        }
    }
}

/// Condition constraint on a category listing query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionFilter {
    #[default]
    All,
    New,
    Used,
}

impl ConditionFilter {
    pub fn matches(&self, condition: Condition) -> bool {
        match self {
            ConditionFilter::All => true,
            ConditionFilter::New => condition == Condition::New,
            ConditionFilter::Used => condition == Condition::Used,
        }
    }
}

impl FromStr for ConditionFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ConditionFilter::All),
            "new" => Ok(ConditionFilter::New),
            "used" => Ok(ConditionFilter::Used),
            other => Err(format!("unknown condition filter: {other}")),
        }
    }
}

/// Sort order of a category listing query.
///
/// Wire names match the query-string contract (`sortBy=createdAt|price`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    /// Newest first.
    #[default]
    #[serde(rename = "createdAt")]
    CreatedAt,
    /// Cheapest first.
    #[serde(rename = "price")]
    Price,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" => Ok(SortKey::CreatedAt),
            "price" => Ok(SortKey::Price),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

/// A sellable item.
///
/// `images` holds opaque storage keys served via `GET /images/{key}`; a
/// listing always has exactly one category association (see
/// `ListingRepository`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub description: String,
    /// Integer price, never negative.
    pub sum: i64,
    pub condition: Condition,
    pub images: Vec<String>,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Realized value of an attribute on one listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingAttribute {
    pub attribute_id: AttributeId,
    /// Stored as text; numeric attributes are validated at the form boundary.
    pub value: String,
}

/// Free-text feedback on a listing. Readable only; there is no comment
/// mutation surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub text: String,
    pub user_id: UserId,
    pub listing_id: ListingId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
