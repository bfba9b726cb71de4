use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Strongly typed ID for users
    UserId
);
entity_id!(
    /// Strongly typed ID for listings
    ListingId
);
entity_id!(
    /// Strongly typed ID for categories
    CategoryId
);
entity_id!(
    /// Strongly typed ID for attributes
    AttributeId
);
entity_id!(
    /// Strongly typed ID for allowed attribute values
    AttributeValueId
);
entity_id!(
    /// Strongly typed ID for comments
    CommentId
);
