use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::db::DBClient;
use super::DbError;
use crate::models::categorymodel::{Category, CategoryUpdate};

const CATEGORY_COLUMNS: &str = "id, name, description, is_active, created_at, updated_at";

#[async_trait]
pub trait CategoryExt {
    /// Fails with `UniqueViolation(CATEGORY_NAME_UNIQUE)` when the name exists in any letter case.
    async fn create_category(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<Category, DbError>;

    async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>, DbError>;

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, DbError>;

    async fn update_category(
        &self,
        category_id: Uuid,
        update: CategoryUpdate,
        at: DateTime<Utc>,
    ) -> Result<Option<Category>, DbError>;

    async fn list_active_categories(&self) -> Result<Vec<Category>, DbError>;

    async fn get_categories_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Category>, DbError>;
}

#[async_trait]
impl CategoryExt for DBClient {
    async fn create_category(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<Category, DbError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories (id, name, description)
            VALUES ($1, $2, $3)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>, DbError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, DbError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE LOWER(name) = LOWER($1)"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn update_category(
        &self,
        category_id: Uuid,
        update: CategoryUpdate,
        at: DateTime<Utc>,
    ) -> Result<Option<Category>, DbError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_active = COALESCE($4, is_active),
                updated_at = $5
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(category_id)
        .bind(update.name)
        .bind(update.description)
        .bind(update.is_active)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn list_active_categories(&self) -> Result<Vec<Category>, DbError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active = TRUE ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn get_categories_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Category>, DbError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ANY($1) ORDER BY name"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }
}
