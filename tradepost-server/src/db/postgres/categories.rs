use async_trait::async_trait;
use sqlx::PgPool;

use tradepost_model::{
    Attribute, AttributeId, AttributeValue, AttributeValueId, Category, CategoryAttribute,
    CategoryId,
};

use crate::db::{CategoryRepository, DbError};

#[derive(Clone, Debug)]
pub struct PostgresCategoryRepository {
    pool: PgPool,
}

impl PostgresCategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    parent_id: Option<i64>,
}

fn map_category_row(r: CategoryRow) -> Category {
    Category {
        id: CategoryId(r.id),
        name: r.name,
        parent_id: r.parent_id.map(CategoryId),
    }
}

#[derive(sqlx::FromRow)]
struct AttributeRow {
    id: i64,
    name: String,
    slug: String,
    input_type: String,
    unit: Option<String>,
}

fn map_attribute_row(r: AttributeRow) -> Result<Attribute, DbError> {
    Ok(Attribute {
        id: AttributeId(r.id),
        name: r.name,
        slug: r.slug,
        input_type: r
            .input_type
            .parse()
            .map_err(|e: String| DbError::Decode(e))?,
        unit: r.unit,
    })
}

#[derive(sqlx::FromRow)]
struct AttributeValueRow {
    id: i64,
    attribute_id: i64,
    value: String,
}

#[async_trait]
impl CategoryRepository for PostgresCategoryRepository {
    async fn list_categories(&self) -> Result<Vec<Category>, DbError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, parent_id FROM categories ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(map_category_row).collect())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, DbError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, parent_id FROM categories WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(map_category_row))
    }

    async fn attributes_for_category(
        &self,
        id: CategoryId,
    ) -> Result<Vec<CategoryAttribute>, DbError> {
        let attribute_rows = sqlx::query_as::<_, AttributeRow>(
            r#"
            SELECT a.id, a.name, a.slug, a.input_type, a.unit
            FROM category_attributes ca
            JOIN attributes a ON a.id = ca.attribute_id
            WHERE ca.category_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        if attribute_rows.is_empty() {
            return Ok(Vec::new());
        }

        let attribute_ids: Vec<i64> = attribute_rows.iter().map(|r| r.id).collect();
        let value_rows = sqlx::query_as::<_, AttributeValueRow>(
            r#"
            SELECT id, attribute_id, value
            FROM attribute_values
            WHERE attribute_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&attribute_ids)
        .fetch_all(&self.pool)
        .await?;

        attribute_rows
            .into_iter()
            .map(|row| {
                let attribute = map_attribute_row(row)?;
                let values = value_rows
                    .iter()
                    .filter(|v| v.attribute_id == attribute.id.as_i64())
                    .map(|v| AttributeValue {
                        id: AttributeValueId(v.id),
                        attribute_id: AttributeId(v.attribute_id),
                        value: v.value.clone(),
                    })
                    .collect();
                Ok(CategoryAttribute { attribute, values })
            })
            .collect()
    }
}
