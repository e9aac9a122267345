use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::db::DBClient;
use super::DbError;
use crate::{
    models::jobmodel::{
        AcceptedApplication, ApplicationStatus, ApplicationWithJob, ApplicationWithLabourAndUser,
        Job, JobApplication, JobFilter, JobStatus, JobWithClient, NewJob,
    },
    utils::pagination::{Page, PageRequest},
};

const JOB_COLUMNS: &str = "id, client_id, labour_id, category_id, title, description, city, \
     hourly_rate, estimated_hours, status, accepted_at, work_completed_at, payment_received_at, \
     completed_at, cancelled_at, created_at, updated_at";

const APPLICATION_COLUMNS: &str =
    "id, job_id, labour_id, status, message, responded_at, created_at, updated_at";

const JOB_WITH_CLIENT_SELECT: &str = r#"
    SELECT j.id, j.client_id, j.labour_id, j.category_id, j.title, j.description, j.city,
           j.hourly_rate, j.estimated_hours, j.status, j.accepted_at, j.work_completed_at,
           j.payment_received_at, j.completed_at, j.cancelled_at, j.created_at, j.updated_at,
           cat.name AS category_name,
           c.name AS client_name,
           c.company AS client_company,
           l.name AS labour_name
    FROM jobs j
    JOIN categories cat ON cat.id = j.category_id
    JOIN clients c ON c.id = j.client_id
    LEFT JOIN labours l ON l.id = j.labour_id
"#;

const JOB_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR j.client_id = $1)
      AND ($2::uuid IS NULL OR j.labour_id = $2)
      AND ($3::job_status IS NULL OR j.status = $3)
      AND ($4::job_status IS NULL OR j.status <> $4)
      AND ($5::uuid[] IS NULL OR j.category_id = ANY($5))
      AND ($6::city IS NULL OR j.city = $6)
"#;

const APPLICATION_WITH_LABOUR_SELECT: &str = r#"
    SELECT a.id, a.job_id, a.labour_id, a.status, a.message, a.responded_at,
           a.created_at, a.updated_at,
           l.name AS labour_name,
           l.hourly_rate AS labour_hourly_rate,
           l.city AS labour_city,
           l.average_rating AS labour_average_rating,
           l.rating_count AS labour_rating_count,
           u.phone AS labour_phone
    FROM job_applications a
    JOIN labours l ON l.id = a.labour_id
    JOIN users u ON u.id = l.user_id
"#;

const APPLICATION_WITH_JOB_SELECT: &str = r#"
    SELECT a.id, a.job_id, a.labour_id, a.status, a.message, a.responded_at,
           a.created_at, a.updated_at,
           j.title AS job_title,
           j.status AS job_status,
           j.city AS job_city,
           j.hourly_rate AS job_hourly_rate,
           cat.name AS category_name,
           c.name AS client_name,
           c.company AS client_company
    FROM job_applications a
    JOIN jobs j ON j.id = a.job_id
    JOIN categories cat ON cat.id = j.category_id
    JOIN clients c ON c.id = j.client_id
"#;

#[async_trait]
pub trait JobExt {
    async fn create_job(&self, job: NewJob) -> Result<Job, DbError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, DbError>;

    async fn get_job_with_client(&self, job_id: Uuid) -> Result<Option<JobWithClient>, DbError>;

    /// Newest first.
    async fn list_jobs(
        &self,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<Page<JobWithClient>, DbError>;

    /// Inserts a pending application while the job is still `open`.
    /// `None` means the job left `open` first; a repeat bid fails with
    /// `UniqueViolation(APPLICATION_UNIQUE)`.
    async fn create_application(
        &self,
        job_id: Uuid,
        labour_id: Uuid,
        message: Option<String>,
    ) -> Result<Option<JobApplication>, DbError>;

    async fn get_application(&self, application_id: Uuid)
        -> Result<Option<JobApplication>, DbError>;

    async fn list_job_applications(
        &self,
        job_id: Uuid,
        status: Option<ApplicationStatus>,
        page: PageRequest,
    ) -> Result<Page<ApplicationWithLabourAndUser>, DbError>;

    async fn list_labour_applications(
        &self,
        labour_id: Uuid,
        status: Option<ApplicationStatus>,
        page: PageRequest,
    ) -> Result<Page<ApplicationWithJob>, DbError>;

    /// Binds the applicant to the job, accepts the application and rejects every
    /// other pending sibling as one unit. `None` when either the job is no longer
    /// `open` or the application is no longer `pending`; nothing is written then.
    async fn accept_application(
        &self,
        application_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<AcceptedApplication>, DbError>;

    async fn reject_application(
        &self,
        application_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<JobApplication>, DbError>;

    /// Compare-and-swap on the job status. `None` when the job no longer reads `from`.
    async fn transition_job(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Job>, DbError>;

    /// `open -> cancelled`, rejecting every pending application in the same unit.
    async fn cancel_job(&self, job_id: Uuid, at: DateTime<Utc>) -> Result<Option<Job>, DbError>;
}

#[async_trait]
impl JobExt for DBClient {
    async fn create_job(&self, job: NewJob) -> Result<Job, DbError> {
        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            INSERT INTO jobs (id, client_id, category_id, title, description, city, hourly_rate, estimated_hours)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(job.client_id)
        .bind(job.category_id)
        .bind(job.title)
        .bind(job.description)
        .bind(job.city)
        .bind(job.hourly_rate)
        .bind(job.estimated_hours)
        .fetch_one(&self.pool)
        .await?;

        Ok(job)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, DbError> {
        let job = sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    async fn get_job_with_client(&self, job_id: Uuid) -> Result<Option<JobWithClient>, DbError> {
        let job = sqlx::query_as::<_, JobWithClient>(&format!(
            "{JOB_WITH_CLIENT_SELECT} WHERE j.id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn list_jobs(
        &self,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<Page<JobWithClient>, DbError> {
        let items = sqlx::query_as::<_, JobWithClient>(&format!(
            r#"
            {JOB_WITH_CLIENT_SELECT}
            {JOB_FILTER}
            ORDER BY j.created_at DESC, j.id
            LIMIT $7 OFFSET $8
            "#
        ))
        .bind(filter.client_id)
        .bind(filter.labour_id)
        .bind(filter.status)
        .bind(filter.exclude_status)
        .bind(filter.category_ids.clone())
        .bind(filter.city)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM jobs j {JOB_FILTER}"))
            .bind(filter.client_id)
            .bind(filter.labour_id)
            .bind(filter.status)
            .bind(filter.exclude_status)
            .bind(filter.category_ids.clone())
            .bind(filter.city)
            .fetch_one(&self.pool)
            .await?;

        Ok(Page::new(items, total, page))
    }

    async fn create_application(
        &self,
        job_id: Uuid,
        labour_id: Uuid,
        message: Option<String>,
    ) -> Result<Option<JobApplication>, DbError> {
        let mut tx = self.pool.begin().await?;

        // Shared lock: an accept or cancel on this job waits for us, so the new
        // bid is visible to its sibling rejection.
        let status = sqlx::query_scalar::<_, JobStatus>(
            "SELECT status FROM jobs WHERE id = $1 FOR SHARE",
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        if status != Some(JobStatus::Open) {
            tx.rollback().await?;
            return Ok(None);
        }

        let application = sqlx::query_as::<_, JobApplication>(&format!(
            r#"
            INSERT INTO job_applications (id, job_id, labour_id, message)
            VALUES ($1, $2, $3, $4)
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(labour_id)
        .bind(message)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(application))
    }

    async fn get_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<JobApplication>, DbError> {
        let application = sqlx::query_as::<_, JobApplication>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM job_applications WHERE id = $1"
        ))
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(application)
    }

    async fn list_job_applications(
        &self,
        job_id: Uuid,
        status: Option<ApplicationStatus>,
        page: PageRequest,
    ) -> Result<Page<ApplicationWithLabourAndUser>, DbError> {
        let items = sqlx::query_as::<_, ApplicationWithLabourAndUser>(&format!(
            r#"
            {APPLICATION_WITH_LABOUR_SELECT}
            WHERE a.job_id = $1 AND ($2::application_status IS NULL OR a.status = $2)
            ORDER BY a.created_at DESC, a.id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(job_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM job_applications a
            WHERE a.job_id = $1 AND ($2::application_status IS NULL OR a.status = $2)
            "#,
        )
        .bind(job_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(Page::new(items, total, page))
    }

    async fn list_labour_applications(
        &self,
        labour_id: Uuid,
        status: Option<ApplicationStatus>,
        page: PageRequest,
    ) -> Result<Page<ApplicationWithJob>, DbError> {
        let items = sqlx::query_as::<_, ApplicationWithJob>(&format!(
            r#"
            {APPLICATION_WITH_JOB_SELECT}
            WHERE a.labour_id = $1 AND ($2::application_status IS NULL OR a.status = $2)
            ORDER BY a.created_at DESC, a.id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(labour_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM job_applications a
            WHERE a.labour_id = $1 AND ($2::application_status IS NULL OR a.status = $2)
            "#,
        )
        .bind(labour_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(Page::new(items, total, page))
    }

    async fn accept_application(
        &self,
        application_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<AcceptedApplication>, DbError> {
        let mut tx = self.pool.begin().await?;

        let pending = sqlx::query_as::<_, JobApplication>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM job_applications WHERE id = $1"
        ))
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(pending) = pending else {
            tx.rollback().await?;
            return Ok(None);
        };

        // Lock the job row before touching any application row. Only one accept
        // can move it off `open`; racing accepts re-check and find it taken.
        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = 'in_progress'::job_status,
                labour_id = $2,
                accepted_at = $3,
                updated_at = $3
            WHERE id = $1 AND status = 'open'::job_status
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(pending.job_id)
        .bind(pending.labour_id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            tx.rollback().await?;
            return Ok(None);
        };

        let application = sqlx::query_as::<_, JobApplication>(&format!(
            r#"
            UPDATE job_applications
            SET status = 'accepted'::application_status,
                responded_at = $2,
                updated_at = $2
            WHERE id = $1 AND status = 'pending'::application_status
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(application_id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(application) = application else {
            tx.rollback().await?;
            return Ok(None);
        };

        let rejected_application_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE job_applications
            SET status = 'rejected'::application_status,
                responded_at = $3,
                updated_at = $3
            WHERE job_id = $1 AND id <> $2 AND status = 'pending'::application_status
            RETURNING id
            "#,
        )
        .bind(job.id)
        .bind(application.id)
        .bind(at)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(AcceptedApplication {
            application,
            job,
            rejected_application_ids,
        }))
    }

    async fn reject_application(
        &self,
        application_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<JobApplication>, DbError> {
        let application = sqlx::query_as::<_, JobApplication>(&format!(
            r#"
            UPDATE job_applications
            SET status = 'rejected'::application_status,
                responded_at = $2,
                updated_at = $2
            WHERE id = $1 AND status = 'pending'::application_status
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(application_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(application)
    }

    async fn transition_job(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Job>, DbError> {
        if !from.can_transition_to(to) {
            return Ok(None);
        }

        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = $3,
                accepted_at = CASE WHEN $3 = 'in_progress'::job_status THEN $4 ELSE accepted_at END,
                work_completed_at = CASE WHEN $3 = 'awaiting_completion'::job_status THEN $4 ELSE work_completed_at END,
                payment_received_at = CASE WHEN $3 = 'completed'::job_status THEN $4 ELSE payment_received_at END,
                completed_at = CASE WHEN $3 = 'completed'::job_status THEN $4 ELSE completed_at END,
                cancelled_at = CASE WHEN $3 = 'cancelled'::job_status THEN $4 ELSE cancelled_at END,
                updated_at = $4
            WHERE id = $1 AND status = $2
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job_id)
        .bind(from)
        .bind(to)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn cancel_job(&self, job_id: Uuid, at: DateTime<Utc>) -> Result<Option<Job>, DbError> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = 'cancelled'::job_status,
                cancelled_at = $2,
                updated_at = $2
            WHERE id = $1 AND status = 'open'::job_status
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job_id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE job_applications
            SET status = 'rejected'::application_status,
                responded_at = $2,
                updated_at = $2
            WHERE job_id = $1 AND status = 'pending'::application_status
            "#,
        )
        .bind(job.id)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(job))
    }
}
