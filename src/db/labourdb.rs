use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::db::DBClient;
use super::DbError;
use crate::{
    models::{
        clientmodel::Client,
        labourmodel::{ApprovalStatus, City, Labour, LabourFilter, LabourWithUser},
    },
    utils::pagination::{Page, PageRequest},
};

pub(crate) const LABOUR_COLUMNS: &str = "id, user_id, name, category_ids, hourly_rate, city, \
     approval_status, is_approved, total_rating, rating_count, average_rating, created_at, updated_at";

const LABOUR_WITH_USER_SELECT: &str = r#"
    SELECT l.id, l.user_id, l.name, l.category_ids, l.hourly_rate, l.city,
           l.approval_status, l.is_approved, l.total_rating, l.rating_count, l.average_rating,
           l.created_at, l.updated_at,
           u.phone,
           ARRAY(
               SELECT c.name FROM categories c
               WHERE c.id = ANY(l.category_ids)
               ORDER BY c.name
           ) AS category_names
    FROM labours l
    JOIN users u ON u.id = l.user_id
"#;

#[async_trait]
pub trait LabourExt {
    async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>, DbError>;

    async fn get_client_by_user(&self, user_id: Uuid) -> Result<Option<Client>, DbError>;

    async fn get_labour(&self, labour_id: Uuid) -> Result<Option<Labour>, DbError>;

    async fn get_labour_by_user(&self, user_id: Uuid) -> Result<Option<Labour>, DbError>;

    async fn get_labour_with_user(&self, labour_id: Uuid)
        -> Result<Option<LabourWithUser>, DbError>;

    /// Hourly rates of every approved worker serving `category_id` in `city`.
    async fn approved_labour_rates(
        &self,
        category_id: Uuid,
        city: City,
    ) -> Result<Vec<f64>, DbError>;

    /// One-shot approval gate: moves a pending profile to `decision`.
    /// Returns `None` when the profile is no longer pending at commit time.
    async fn decide_labour_approval(
        &self,
        labour_id: Uuid,
        decision: ApprovalStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Labour>, DbError>;

    /// Approved workers only, best rated first.
    async fn list_approved_labour(
        &self,
        filter: &LabourFilter,
        page: PageRequest,
    ) -> Result<Page<LabourWithUser>, DbError>;

    async fn list_pending_labour(&self) -> Result<Vec<LabourWithUser>, DbError>;
}

#[async_trait]
impl LabourExt for DBClient {
    async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>, DbError> {
        let client = sqlx::query_as::<_, Client>(
            "SELECT id, user_id, name, company, created_at, updated_at FROM clients WHERE id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    async fn get_client_by_user(&self, user_id: Uuid) -> Result<Option<Client>, DbError> {
        let client = sqlx::query_as::<_, Client>(
            "SELECT id, user_id, name, company, created_at, updated_at FROM clients WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    async fn get_labour(&self, labour_id: Uuid) -> Result<Option<Labour>, DbError> {
        let labour = sqlx::query_as::<_, Labour>(&format!(
            "SELECT {LABOUR_COLUMNS} FROM labours WHERE id = $1"
        ))
        .bind(labour_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(labour)
    }

    async fn get_labour_by_user(&self, user_id: Uuid) -> Result<Option<Labour>, DbError> {
        let labour = sqlx::query_as::<_, Labour>(&format!(
            "SELECT {LABOUR_COLUMNS} FROM labours WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(labour)
    }

    async fn get_labour_with_user(
        &self,
        labour_id: Uuid,
    ) -> Result<Option<LabourWithUser>, DbError> {
        let labour = sqlx::query_as::<_, LabourWithUser>(&format!(
            "{LABOUR_WITH_USER_SELECT} WHERE l.id = $1"
        ))
        .bind(labour_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(labour)
    }

    async fn approved_labour_rates(
        &self,
        category_id: Uuid,
        city: City,
    ) -> Result<Vec<f64>, DbError> {
        let rates = sqlx::query_scalar::<_, f64>(
            r#"
            SELECT hourly_rate FROM labours
            WHERE $1 = ANY(category_ids) AND city = $2 AND is_approved = TRUE
            "#,
        )
        .bind(category_id)
        .bind(city)
        .fetch_all(&self.pool)
        .await?;

        Ok(rates)
    }

    async fn decide_labour_approval(
        &self,
        labour_id: Uuid,
        decision: ApprovalStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Labour>, DbError> {
        if decision == ApprovalStatus::Pending {
            return Ok(None);
        }

        let labour = sqlx::query_as::<_, Labour>(&format!(
            r#"
            UPDATE labours
            SET approval_status = $2,
                is_approved = ($2 = 'approved'::approval_status),
                updated_at = $3
            WHERE id = $1 AND approval_status = 'pending'::approval_status
            RETURNING {LABOUR_COLUMNS}
            "#
        ))
        .bind(labour_id)
        .bind(decision)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(labour)
    }

    async fn list_approved_labour(
        &self,
        filter: &LabourFilter,
        page: PageRequest,
    ) -> Result<Page<LabourWithUser>, DbError> {
        let items = sqlx::query_as::<_, LabourWithUser>(&format!(
            r#"
            {LABOUR_WITH_USER_SELECT}
            WHERE l.is_approved = TRUE
              AND ($1::uuid IS NULL OR $1 = ANY(l.category_ids))
              AND ($2::city IS NULL OR l.city = $2)
            ORDER BY l.average_rating DESC, l.created_at DESC, l.id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.category_id)
        .bind(filter.city)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM labours l
            WHERE l.is_approved = TRUE
              AND ($1::uuid IS NULL OR $1 = ANY(l.category_ids))
              AND ($2::city IS NULL OR l.city = $2)
            "#,
        )
        .bind(filter.category_id)
        .bind(filter.city)
        .fetch_one(&self.pool)
        .await?;

        Ok(Page::new(items, total, page))
    }

    async fn list_pending_labour(&self) -> Result<Vec<LabourWithUser>, DbError> {
        let items = sqlx::query_as::<_, LabourWithUser>(&format!(
            r#"
            {LABOUR_WITH_USER_SELECT}
            WHERE l.approval_status = 'pending'::approval_status
            ORDER BY l.created_at DESC, l.id
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}
