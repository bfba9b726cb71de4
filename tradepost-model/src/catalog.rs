use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ids::{AttributeId, AttributeValueId, CategoryId};

/// A category node. Top-level categories have no parent; listings attach to
/// child categories only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub parent_id: Option<CategoryId>,
}

impl Category {
    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// How an attribute is entered and validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeInput {
    Number,
    Select,
    Text,
}

impl FromStr for AttributeInput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(AttributeInput::Number),
            "select" => Ok(AttributeInput::Select),
            "text" => Ok(AttributeInput::Text),
            other => Err(format!("unknown attribute input type: {other}")),
        }
    }
}

/// A filterable/enterable property, independent of any single category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,
    pub slug: String,
    pub input_type: AttributeInput,
    pub unit: Option<String>,
}

/// An allowed value string for a select-type attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeValue {
    pub id: AttributeValueId,
    pub attribute_id: AttributeId,
    pub value: String,
}

/// An attribute as it applies to one category, with its allowed values
/// (empty unless select-type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryAttribute {
    pub attribute: Attribute,
    pub values: Vec<AttributeValue>,
}

impl CategoryAttribute {
    pub fn allowed_values(&self) -> Vec<String> {
        self.values.iter().map(|v| v.value.clone()).collect()
    }
}

/// A top-level category with its children, for navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesWithChildren {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<Category>,
}

/// Group a flat category list into the two-level tree.
pub fn grouped_categories(categories: Vec<Category>) -> Vec<CategoriesWithChildren> {
    let (parents, children): (Vec<_>, Vec<_>) =
        categories.into_iter().partition(|c| c.parent_id.is_none());

    parents
        .into_iter()
        .map(|parent| {
            let children = children
                .iter()
                .filter(|c| c.parent_id == Some(parent.id))
                .cloned()
                .collect();
            CategoriesWithChildren {
                category: parent,
                children,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, name: &str, parent_id: Option<i64>) -> Category {
        Category {
            id: CategoryId(id),
            name: name.to_string(),
            parent_id: parent_id.map(CategoryId),
        }
    }

    #[test]
    fn test_grouped_categories() {
        let groups = grouped_categories(vec![
            category(1, "Electronics", None),
            category(2, "Home", None),
            category(3, "Laptops", Some(1)),
            category(4, "Phones", Some(1)),
            category(5, "Furniture", Some(2)),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].category.name, "Electronics");
        assert_eq!(groups[0].children.len(), 2);
        assert_eq!(groups[1].children.len(), 1);
        assert_eq!(groups[1].children[0].name, "Furniture");
    }

    #[test]
    fn test_grouped_categories_orphans_dropped() {
        // A child pointing at a missing parent is not surfaced.
        let groups = grouped_categories(vec![category(3, "Laptops", Some(9))]);
        assert!(groups.is_empty());
    }
}
