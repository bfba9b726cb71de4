use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use tradepost_model::{
    Attribute, AttributeId, Category, CategoryId, Listing, ListingDraft, ListingId, UserId,
};

use crate::db::{DbError, ListingAttributeDetail, ListingDetail, ListingRepository};

#[derive(Clone, Debug)]
pub struct PostgresListingRepository {
    pool: PgPool,
}

impl PostgresListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ListingRow {
    id: i64,
    title: String,
    description: String,
    sum: i64,
    condition: String,
    images: Json<Vec<String>>,
    owner_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn map_listing_row(r: ListingRow) -> Result<Listing, DbError> {
    Ok(Listing {
        id: ListingId(r.id),
        title: r.title,
        description: r.description,
        sum: r.sum,
        condition: r.condition.parse().map_err(|e: String| DbError::Decode(e))?,
        images: r.images.0,
        owner_id: UserId(r.owner_id),
        created_at: r.created_at,
        updated_at: r.updated_at,
    })
}

fn map_listing_rows(rows: Vec<ListingRow>) -> Result<Vec<Listing>, DbError> {
    rows.into_iter().map(map_listing_row).collect()
}

/// Escape LIKE wildcards in user-supplied search input.
fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

const SELECT_LISTING: &str = "SELECT id, title, description, sum, condition, images, \
     owner_id, created_at, updated_at FROM listings";

#[derive(sqlx::FromRow)]
struct ListingAttributeRow {
    listing_id: i64,
    attribute_id: i64,
    value: String,
}

#[derive(sqlx::FromRow)]
struct AttributeDetailRow {
    id: i64,
    name: String,
    slug: String,
    input_type: String,
    unit: Option<String>,
    value: String,
}

#[async_trait]
impl ListingRepository for PostgresListingRepository {
    async fn listings_for_category(&self, id: CategoryId) -> Result<Vec<Listing>, DbError> {
        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT l.id, l.title, l.description, l.sum, l.condition, l.images,
                   l.owner_id, l.created_at, l.updated_at
            FROM listings l
            JOIN listing_categories lc ON lc.listing_id = l.id
            WHERE lc.category_id = $1
            ORDER BY l.id
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;
        map_listing_rows(rows)
    }

    async fn attribute_values_for_listings(
        &self,
        ids: &[ListingId],
    ) -> Result<HashMap<ListingId, BTreeMap<AttributeId, String>>, DbError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let raw_ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        let rows = sqlx::query_as::<_, ListingAttributeRow>(
            r#"
            SELECT listing_id, attribute_id, value
            FROM listing_attributes
            WHERE listing_id = ANY($1)
            "#,
        )
        .bind(&raw_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut values: HashMap<ListingId, BTreeMap<AttributeId, String>> = HashMap::new();
        for row in rows {
            values
                .entry(ListingId(row.listing_id))
                .or_default()
                .insert(AttributeId(row.attribute_id), row.value);
        }
        Ok(values)
    }

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, DbError> {
        let row = sqlx::query_as::<_, ListingRow>(&format!("{SELECT_LISTING} WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        row.map(map_listing_row).transpose()
    }

    async fn get_listing_detail(&self, id: ListingId) -> Result<Option<ListingDetail>, DbError> {
        let Some(listing) = self.get_listing(id).await? else {
            return Ok(None);
        };

        let category = sqlx::query_as::<_, (i64, String, Option<i64>)>(
            r#"
            SELECT c.id, c.name, c.parent_id
            FROM categories c
            JOIN listing_categories lc ON lc.category_id = c.id
            WHERE lc.listing_id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?
        .map(|(id, name, parent_id)| Category {
            id: CategoryId(id),
            name,
            parent_id: parent_id.map(CategoryId),
        })
        .ok_or_else(|| DbError::Decode(format!("listing {id} has no category")))?;

        let attribute_rows = sqlx::query_as::<_, AttributeDetailRow>(
            r#"
            SELECT a.id, a.name, a.slug, a.input_type, a.unit, la.value
            FROM listing_attributes la
            JOIN attributes a ON a.id = la.attribute_id
            WHERE la.listing_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let attributes = attribute_rows
            .into_iter()
            .map(|r| {
                Ok(ListingAttributeDetail {
                    attribute: Attribute {
                        id: AttributeId(r.id),
                        name: r.name,
                        slug: r.slug,
                        input_type: r
                            .input_type
                            .parse()
                            .map_err(|e: String| DbError::Decode(e))?,
                        unit: r.unit,
                    },
                    value: r.value,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(Some(ListingDetail {
            listing,
            category,
            attributes,
        }))
    }

    async fn listings_for_owner(&self, owner_id: UserId) -> Result<Vec<Listing>, DbError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "{SELECT_LISTING} WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id.as_i64())
        .fetch_all(&self.pool)
        .await?;
        map_listing_rows(rows)
    }

    async fn latest_listings(&self, limit: i64) -> Result<Vec<Listing>, DbError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "{SELECT_LISTING} ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        map_listing_rows(rows)
    }

    async fn search_listings(&self, query: &str) -> Result<Vec<Listing>, DbError> {
        let pattern = format!("%{}%", escape_like(query));
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "{SELECT_LISTING} WHERE title ILIKE $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        map_listing_rows(rows)
    }

    async fn create_listing(
        &self,
        draft: &ListingDraft,
        owner_id: UserId,
        images: &[String],
    ) -> Result<ListingId, DbError> {
        let mut tx = self.pool.begin().await?;

        let listing_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO listings (title, description, sum, condition, images, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.sum)
        .bind(draft.condition.as_str())
        .bind(Json(images))
        .bind(owner_id.as_i64())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO listing_categories (listing_id, category_id) VALUES ($1, $2)")
            .bind(listing_id)
            .bind(draft.category_id.as_i64())
            .execute(&mut *tx)
            .await?;

        for attribute in &draft.attributes {
            sqlx::query(
                "INSERT INTO listing_attributes (listing_id, attribute_id, value) \
                 VALUES ($1, $2, $3)",
            )
            .bind(listing_id)
            .bind(attribute.attribute_id.as_i64())
            .bind(&attribute.value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(ListingId(listing_id))
    }

    async fn update_listing(
        &self,
        id: ListingId,
        draft: &ListingDraft,
        images: &[String],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE listings
            SET title = $2, description = $3, sum = $4, condition = $5, images = $6,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.sum)
        .bind(draft.condition.as_str())
        .bind(Json(images))
        .execute(&mut *tx)
        .await?;

        let recategorized =
            sqlx::query("UPDATE listing_categories SET category_id = $2 WHERE listing_id = $1")
                .bind(id.as_i64())
                .bind(draft.category_id.as_i64())
                .execute(&mut *tx)
                .await?;
        if recategorized.rows_affected() == 0 {
            sqlx::query("INSERT INTO listing_categories (listing_id, category_id) VALUES ($1, $2)")
                .bind(id.as_i64())
                .bind(draft.category_id.as_i64())
                .execute(&mut *tx)
                .await?;
        }

        // Diff the attribute set against the stored rows so attributes never
        // disappear mid-request.
        let current = sqlx::query_as::<_, (i64, String)>(
            "SELECT attribute_id, value FROM listing_attributes WHERE listing_id = $1",
        )
        .bind(id.as_i64())
        .fetch_all(&mut *tx)
        .await?;
        let current: BTreeMap<i64, String> = current.into_iter().collect();

        let stale: Vec<i64> = current
            .keys()
            .filter(|attribute_id| {
                !draft
                    .attributes
                    .iter()
                    .any(|a| a.attribute_id.as_i64() == **attribute_id)
            })
            .copied()
            .collect();
        if !stale.is_empty() {
            sqlx::query(
                "DELETE FROM listing_attributes WHERE listing_id = $1 AND attribute_id = ANY($2)",
            )
            .bind(id.as_i64())
            .bind(&stale)
            .execute(&mut *tx)
            .await?;
        }

        for attribute in &draft.attributes {
            if current.get(&attribute.attribute_id.as_i64()) == Some(&attribute.value) {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO listing_attributes (listing_id, attribute_id, value)
                VALUES ($1, $2, $3)
                ON CONFLICT (listing_id, attribute_id) DO UPDATE SET value = EXCLUDED.value
                "#,
            )
            .bind(id.as_i64())
            .bind(attribute.attribute_id.as_i64())
            .bind(&attribute.value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_listing(&self, id: ListingId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }
}
