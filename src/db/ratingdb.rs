use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::db::DBClient;
use super::labourdb::LABOUR_COLUMNS;
use super::DbError;
use crate::{
    models::{
        labourmodel::Labour,
        ratingmodel::{NewRating, Rating, RatingDistribution, RatingWithNames, RecentComment},
    },
    utils::pagination::{Page, PageRequest},
};

const RATING_COLUMNS: &str = "id, job_id, client_id, labour_id, rating, comment, created_at";

const RATING_WITH_NAMES_SELECT: &str = r#"
    SELECT r.id, r.job_id, r.client_id, r.labour_id, r.rating, r.comment, r.created_at,
           c.name AS client_name,
           l.name AS labour_name,
           j.title AS job_title
    FROM ratings r
    JOIN clients c ON c.id = r.client_id
    JOIN labours l ON l.id = r.labour_id
    JOIN jobs j ON j.id = r.job_id
"#;

#[async_trait]
pub trait RatingExt {
    /// Stores the rating and folds it into the worker's aggregate as one unit.
    /// `None` when the job is not `completed`; a second rating for the job fails
    /// with `UniqueViolation(RATING_JOB_UNIQUE)` and leaves the aggregate untouched.
    async fn rate_job(
        &self,
        rating: NewRating,
        at: DateTime<Utc>,
    ) -> Result<Option<(Rating, Labour)>, DbError>;

    async fn get_rating_by_job(&self, job_id: Uuid) -> Result<Option<RatingWithNames>, DbError>;

    async fn list_labour_ratings(
        &self,
        labour_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<RatingWithNames>, DbError>;

    async fn list_client_ratings(
        &self,
        client_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<RatingWithNames>, DbError>;

    /// The newest ratings that carry a non-empty comment.
    async fn recent_comments(
        &self,
        labour_id: Uuid,
        limit: i64,
    ) -> Result<Vec<RecentComment>, DbError>;

    async fn rating_distribution(&self, labour_id: Uuid) -> Result<RatingDistribution, DbError>;
}

#[async_trait]
impl RatingExt for DBClient {
    async fn rate_job(
        &self,
        rating: NewRating,
        at: DateTime<Utc>,
    ) -> Result<Option<(Rating, Labour)>, DbError> {
        let mut tx = self.pool.begin().await?;

        let completed = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM jobs WHERE id = $1 AND status = 'completed'::job_status FOR UPDATE",
        )
        .bind(rating.job_id)
        .fetch_optional(&mut *tx)
        .await?;

        if completed.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let stored = sqlx::query_as::<_, Rating>(&format!(
            r#"
            INSERT INTO ratings (id, job_id, client_id, labour_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {RATING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(rating.job_id)
        .bind(rating.client_id)
        .bind(rating.labour_id)
        .bind(rating.rating)
        .bind(rating.comment)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        // Incremental fold on the stored pair; SET expressions see the pre-update row.
        let labour = sqlx::query_as::<_, Labour>(&format!(
            r#"
            UPDATE labours
            SET total_rating = total_rating + $2,
                rating_count = rating_count + 1,
                average_rating = (total_rating + $2)::float8 / (rating_count + 1),
                updated_at = $3
            WHERE id = $1
            RETURNING {LABOUR_COLUMNS}
            "#
        ))
        .bind(stored.labour_id)
        .bind(i64::from(stored.rating))
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(labour) = labour else {
            tx.rollback().await?;
            return Err(DbError::InvalidRecord(format!(
                "rated labour {} does not exist",
                stored.labour_id
            )));
        };

        tx.commit().await?;
        Ok(Some((stored, labour)))
    }

    async fn get_rating_by_job(&self, job_id: Uuid) -> Result<Option<RatingWithNames>, DbError> {
        let rating = sqlx::query_as::<_, RatingWithNames>(&format!(
            "{RATING_WITH_NAMES_SELECT} WHERE r.job_id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rating)
    }

    async fn list_labour_ratings(
        &self,
        labour_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<RatingWithNames>, DbError> {
        let items = sqlx::query_as::<_, RatingWithNames>(&format!(
            r#"
            {RATING_WITH_NAMES_SELECT}
            WHERE r.labour_id = $1
            ORDER BY r.created_at DESC, r.id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(labour_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ratings WHERE labour_id = $1")
            .bind(labour_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Page::new(items, total, page))
    }

    async fn list_client_ratings(
        &self,
        client_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<RatingWithNames>, DbError> {
        let items = sqlx::query_as::<_, RatingWithNames>(&format!(
            r#"
            {RATING_WITH_NAMES_SELECT}
            WHERE r.client_id = $1
            ORDER BY r.created_at DESC, r.id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(client_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ratings WHERE client_id = $1")
            .bind(client_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Page::new(items, total, page))
    }

    async fn recent_comments(
        &self,
        labour_id: Uuid,
        limit: i64,
    ) -> Result<Vec<RecentComment>, DbError> {
        let comments = sqlx::query_as::<_, RecentComment>(
            r#"
            SELECT r.rating, r.comment, r.created_at, c.name AS client_name
            FROM ratings r
            JOIN clients c ON c.id = r.client_id
            WHERE r.labour_id = $1 AND r.comment IS NOT NULL AND r.comment <> ''
            ORDER BY r.created_at DESC, r.id
            LIMIT $2
            "#,
        )
        .bind(labour_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn rating_distribution(&self, labour_id: Uuid) -> Result<RatingDistribution, DbError> {
        let rows = sqlx::query_as::<_, (i16, i64)>(
            "SELECT rating, COUNT(*) FROM ratings WHERE labour_id = $1 GROUP BY rating",
        )
        .bind(labour_id)
        .fetch_all(&self.pool)
        .await?;

        let mut distribution = RatingDistribution::default();
        for (rating, count) in rows {
            distribution.record(rating, count);
        }
        Ok(distribution)
    }
}
