//! Dynamic listing form schema.
//!
//! A listing form is not fixed: the category chosen by the user decides which
//! attribute fields exist and how each one validates. [`ListingSchema`] is the
//! pure `attributes -> validator` derivation; it knows nothing about storage
//! or HTTP and is exercised directly by tests.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::catalog::CategoryAttribute;
use crate::ids::{AttributeId, CategoryId};
use crate::listing::{Condition, ListingAttribute};

pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 500;
/// A listing carries at most this many images.
pub const MAX_IMAGES: usize = 5;
/// Upload cap per newly submitted image file.
pub const MAX_IMAGE_BYTES: usize = 700 * 1024;

/// Validation rule for one dynamic attribute field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldRule {
    /// Must parse as a number.
    Number,
    /// Must equal one of the allowed strings.
    Enum { allowed: Vec<String> },
    /// Must be a non-empty string.
    Text,
}

/// Field-level validation failures, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationErrors {
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// A fully validated listing submission, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub sum: i64,
    pub category_id: CategoryId,
    pub condition: Condition,
    pub attributes: Vec<ListingAttribute>,
}

/// Validator for one category's listing form: the fixed core fields plus one
/// rule per category attribute, keyed `attr_<attributeId>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSchema {
    fields: Vec<(AttributeId, FieldRule)>,
}

impl ListingSchema {
    /// Derive the validator from a category's applicable attributes.
    pub fn for_attributes(attrs: &[CategoryAttribute]) -> Self {
        let fields = attrs
            .iter()
            .map(|ca| {
                let rule = match ca.attribute.input_type {
                    crate::catalog::AttributeInput::Number => FieldRule::Number,
                    crate::catalog::AttributeInput::Select => FieldRule::Enum {
                        allowed: ca.allowed_values(),
                    },
                    crate::catalog::AttributeInput::Text => FieldRule::Text,
                };
                (ca.attribute.id, rule)
            })
            .collect();
        Self { fields }
    }

    /// Namespaced form key for an attribute, avoiding collisions with the
    /// core listing fields.
    pub fn field_key(id: AttributeId) -> String {
        format!("attr_{id}")
    }

    pub fn rules(&self) -> &[(AttributeId, FieldRule)] {
        &self.fields
    }

    /// Validate a flat form submission. Failures accumulate per field; on
    /// success every category attribute has exactly one validated value.
    /// `attr_*` keys outside the schema are dropped, not rejected.
    pub fn validate(
        &self,
        fields: &BTreeMap<String, String>,
        image_count: usize,
    ) -> Result<ListingDraft, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let title = required_text(fields, "title", TITLE_MAX, &mut errors);
        let description = required_text(fields, "description", DESCRIPTION_MAX, &mut errors);

        let sum = match fields.get("sum").map(String::as_str).unwrap_or("") {
            "" => {
                errors.push("sum", "Required");
                0
            }
            raw => match raw.parse::<i64>() {
                Ok(sum) if sum >= 0 => sum,
                Ok(_) => {
                    errors.push("sum", "Must be 0 or greater");
                    0
                }
                Err(_) => {
                    errors.push("sum", "Must be a number");
                    0
                }
            },
        };

        let category_id = match fields.get("categoryId").map(String::as_str).unwrap_or("") {
            "" => {
                errors.push("categoryId", "Required");
                CategoryId(0)
            }
            raw => match raw.parse::<i64>() {
                Ok(id) if id >= 1 => CategoryId(id),
                _ => {
                    errors.push("categoryId", "Must be a valid category");
                    CategoryId(0)
                }
            },
        };

        let condition = match fields.get("condition").map(String::as_str).unwrap_or("") {
            "" => {
                errors.push("condition", "Required");
                Condition::New
            }
            raw => raw.parse().unwrap_or_else(|_| {
                errors.push("condition", "Must be new or used");
                Condition::New
            }),
        };

        if image_count > MAX_IMAGES {
            errors.push("images", format!("At most {MAX_IMAGES} images allowed"));
        }

        let mut attributes = Vec::with_capacity(self.fields.len());
        for (id, rule) in &self.fields {
            let key = Self::field_key(*id);
            let raw = fields.get(&key).map(String::as_str).unwrap_or("");
            match validate_field(rule, raw) {
                Ok(value) => attributes.push(ListingAttribute {
                    attribute_id: *id,
                    value,
                }),
                Err(message) => errors.push(&key, message),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ListingDraft {
            title,
            description,
            sum,
            category_id,
            condition,
            attributes,
        })
    }
}

fn required_text(
    fields: &BTreeMap<String, String>,
    key: &str,
    max: usize,
    errors: &mut ValidationErrors,
) -> String {
    let value = fields.get(key).map(String::as_str).unwrap_or("").trim();
    if value.is_empty() {
        errors.push(key, "Required");
    } else if value.chars().count() > max {
        errors.push(key, format!("Cannot exceed {max} characters"));
    }
    value.to_string()
}

fn validate_field(rule: &FieldRule, raw: &str) -> Result<String, String> {
    if raw.is_empty() {
        return Err("Required".to_string());
    }

    match rule {
        FieldRule::Number => {
            if raw.parse::<f64>().is_ok() {
                Ok(raw.to_string())
            } else {
                Err("Must be a number".to_string())
            }
        }
        FieldRule::Enum { allowed } => {
            if allowed.iter().any(|a| a == raw) {
                Ok(raw.to_string())
            } else {
                Err("Must be one of the allowed values".to_string())
            }
        }
        FieldRule::Text => Ok(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Attribute, AttributeInput, AttributeValue};
    use crate::ids::AttributeValueId;

    fn number_attr(id: i64, name: &str) -> CategoryAttribute {
        CategoryAttribute {
            attribute: Attribute {
                id: AttributeId(id),
                name: name.to_string(),
                slug: name.to_lowercase(),
                input_type: AttributeInput::Number,
                unit: Some("GB".to_string()),
            },
            values: vec![],
        }
    }

    fn select_attr(id: i64, name: &str, allowed: &[&str]) -> CategoryAttribute {
        CategoryAttribute {
            attribute: Attribute {
                id: AttributeId(id),
                name: name.to_string(),
                slug: name.to_lowercase(),
                input_type: AttributeInput::Select,
                unit: None,
            },
            values: allowed
                .iter()
                .enumerate()
                .map(|(i, v)| AttributeValue {
                    id: AttributeValueId(i as i64 + 1),
                    attribute_id: AttributeId(id),
                    value: v.to_string(),
                })
                .collect(),
        }
    }

    fn text_attr(id: i64, name: &str) -> CategoryAttribute {
        CategoryAttribute {
            attribute: Attribute {
                id: AttributeId(id),
                name: name.to_string(),
                slug: name.to_lowercase(),
                input_type: AttributeInput::Text,
                unit: None,
            },
            values: vec![],
        }
    }

    fn base_fields() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("title".to_string(), "ThinkPad X1".to_string()),
            ("description".to_string(), "Lightly used".to_string()),
            ("sum".to_string(), "500".to_string()),
            ("categoryId".to_string(), "5".to_string()),
            ("condition".to_string(), "used".to_string()),
        ])
    }

    #[test]
    fn test_rule_derivation() {
        let schema = ListingSchema::for_attributes(&[
            number_attr(3, "RAM"),
            select_attr(4, "Color", &["black", "white"]),
            text_attr(5, "Brand"),
        ]);

        assert_eq!(schema.rules().len(), 3);
        assert_eq!(schema.rules()[0].1, FieldRule::Number);
        assert_eq!(
            schema.rules()[1].1,
            FieldRule::Enum {
                allowed: vec!["black".to_string(), "white".to_string()]
            }
        );
        assert_eq!(schema.rules()[2].1, FieldRule::Text);
        assert_eq!(ListingSchema::field_key(AttributeId(3)), "attr_3");
    }

    #[test]
    fn test_valid_submission() {
        let schema = ListingSchema::for_attributes(&[
            number_attr(3, "RAM"),
            select_attr(4, "Color", &["black", "white"]),
        ]);

        let mut fields = base_fields();
        fields.insert("attr_3".to_string(), "16".to_string());
        fields.insert("attr_4".to_string(), "black".to_string());

        let draft = schema.validate(&fields, 2).unwrap();
        assert_eq!(draft.title, "ThinkPad X1");
        assert_eq!(draft.sum, 500);
        assert_eq!(draft.category_id, CategoryId(5));
        assert_eq!(draft.condition, Condition::Used);
        assert_eq!(draft.attributes.len(), 2);
        assert_eq!(draft.attributes[0].value, "16");
        assert_eq!(draft.attributes[1].value, "black");
    }

    #[test]
    fn test_unknown_attr_keys_dropped() {
        let schema = ListingSchema::for_attributes(&[number_attr(3, "RAM")]);

        let mut fields = base_fields();
        fields.insert("attr_3".to_string(), "8".to_string());
        fields.insert("attr_99".to_string(), "sneaky".to_string());

        let draft = schema.validate(&fields, 0).unwrap();
        assert_eq!(draft.attributes.len(), 1);
        assert_eq!(draft.attributes[0].attribute_id, AttributeId(3));
    }

    #[test]
    fn test_failures_accumulate() {
        let schema = ListingSchema::for_attributes(&[
            number_attr(3, "RAM"),
            select_attr(4, "Color", &["black"]),
        ]);

        let fields = BTreeMap::from([
            ("title".to_string(), "x".repeat(101)),
            ("description".to_string(), String::new()),
            ("sum".to_string(), "-1".to_string()),
            ("categoryId".to_string(), "0".to_string()),
            ("condition".to_string(), "mint".to_string()),
            ("attr_3".to_string(), "a lot".to_string()),
            ("attr_4".to_string(), "green".to_string()),
        ]);

        let errors = schema.validate(&fields, 6).unwrap_err();
        assert_eq!(errors.fields.len(), 7);
        assert_eq!(errors.fields["sum"], vec!["Must be 0 or greater"]);
        assert_eq!(errors.fields["attr_3"], vec!["Must be a number"]);
        assert_eq!(
            errors.fields["attr_4"],
            vec!["Must be one of the allowed values"]
        );
        assert_eq!(errors.fields["images"], vec!["At most 5 images allowed"]);
    }

    #[test]
    fn test_missing_attribute_is_required() {
        let schema = ListingSchema::for_attributes(&[number_attr(3, "RAM")]);
        let errors = schema.validate(&base_fields(), 0).unwrap_err();
        assert_eq!(errors.fields["attr_3"], vec!["Required"]);
    }

    #[test]
    fn test_no_attributes_core_only() {
        let schema = ListingSchema::for_attributes(&[]);
        let draft = schema.validate(&base_fields(), 0).unwrap();
        assert!(draft.attributes.is_empty());
    }
}
