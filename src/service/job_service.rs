use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::{MarketStore, APPLICATION_UNIQUE, RATING_JOB_UNIQUE},
    dtos::jobdtos::{ApplyJobDto, CreateJobDto, RateJobDto},
    models::{
        clientmodel::Client,
        jobmodel::{
            AcceptedApplication, ApplicationStatus, ApplicationWithJob,
            ApplicationWithLabourAndUser, Job, JobApplication, JobFilter, JobStatus,
            JobWithClient, NewJob,
        },
        labourmodel::Labour,
        ratingmodel::{NewRating, Rating},
        usermodel::{User, UserRole},
    },
    service::{error::ServiceError, notification_service::NotificationService},
    utils::{
        pagination::{Page, PageRequest},
        phone::format_phone_display,
    },
};

/// Mean of the given rates rounded to the nearest whole currency unit.
/// `None` when there is nothing to average.
pub fn snapshot_rate(rates: &[f64]) -> Option<i32> {
    if rates.is_empty() {
        return None;
    }
    let mean = rates.iter().sum::<f64>() / rates.len() as f64;
    Some(mean.round() as i32)
}

#[derive(Debug)]
pub struct RatedJob {
    pub job: Job,
    pub rating: Rating,
    pub labour: Labour,
}

/// Drives jobs and applications through their lifecycle. Every transition is
/// checked against a fresh read, then committed with a conditional write so a
/// racing request observes the new state and fails instead of double-applying.
#[derive(Debug, Clone)]
pub struct JobService {
    db_client: Arc<dyn MarketStore>,
    notification_service: Arc<NotificationService>,
}

impl JobService {
    pub fn new(
        db_client: Arc<dyn MarketStore>,
        notification_service: Arc<NotificationService>,
    ) -> Self {
        Self {
            db_client,
            notification_service,
        }
    }

    async fn client_for(&self, user: &User) -> Result<Client, ServiceError> {
        self.db_client
            .get_client_by_user(user.id)
            .await?
            .ok_or(ServiceError::ClientProfileNotFound(user.id))
    }

    async fn labour_for(&self, user: &User) -> Result<Labour, ServiceError> {
        self.db_client
            .get_labour_by_user(user.id)
            .await?
            .ok_or(ServiceError::LabourProfileNotFound(user.id))
    }

    async fn load_job(&self, job_id: Uuid) -> Result<Job, ServiceError> {
        self.db_client
            .get_job(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))
    }

    /// Loads the job and checks that `user` is the client who posted it.
    async fn owned_job(&self, user: &User, job_id: Uuid) -> Result<(Job, Client), ServiceError> {
        let job = self.load_job(job_id).await?;
        let client = self
            .db_client
            .get_client_by_user(user.id)
            .await?
            .filter(|c| c.id == job.client_id)
            .ok_or(ServiceError::NotJobOwner(user.id, job_id))?;
        Ok((job, client))
    }

    fn expect_status(job: &Job, expected: JobStatus) -> Result<(), ServiceError> {
        if job.status != expected {
            return Err(ServiceError::InvalidJobStatus {
                job_id: job.id,
                expected,
                actual: job.status,
            });
        }
        Ok(())
    }

    /// Reports why a conditional job write matched nothing.
    async fn job_conflict(&self, job_id: Uuid, expected: JobStatus) -> ServiceError {
        match self.db_client.get_job(job_id).await {
            Ok(Some(job)) => ServiceError::InvalidJobStatus {
                job_id,
                expected,
                actual: job.status,
            },
            Ok(None) => ServiceError::JobNotFound(job_id),
            Err(e) => e.into(),
        }
    }

    async fn advance(
        &self,
        job: &Job,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Job, ServiceError> {
        Self::expect_status(job, from)?;
        match self
            .db_client
            .transition_job(job.id, from, to, Utc::now())
            .await?
        {
            Some(updated) => Ok(updated),
            None => Err(self.job_conflict(job.id, from).await),
        }
    }

    pub async fn create_job(&self, user: &User, body: CreateJobDto) -> Result<Job, ServiceError> {
        let client = self.client_for(user).await?;

        let category = self
            .db_client
            .get_category(body.category)
            .await?
            .filter(|c| c.is_active)
            .ok_or(ServiceError::CategoryNotFound(body.category))?;

        let rates = self
            .db_client
            .approved_labour_rates(category.id, body.city)
            .await?;
        let hourly_rate = snapshot_rate(&rates)
            .ok_or_else(|| ServiceError::NoEligibleLabour(body.city.to_str().to_string()))?;

        let job = self
            .db_client
            .create_job(NewJob {
                client_id: client.id,
                category_id: category.id,
                title: body.title.trim().to_string(),
                description: body.description.trim().to_string(),
                city: body.city,
                hourly_rate,
                estimated_hours: body.estimated_hours,
            })
            .await?;

        tracing::info!(
            "Job {} created by client {} at ₹{}/h from {} approved labour",
            job.id,
            client.id,
            hourly_rate,
            rates.len()
        );
        Ok(job)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<JobWithClient, ServiceError> {
        self.db_client
            .get_job_with_client(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))
    }

    pub async fn submit_application(
        &self,
        user: &User,
        job_id: Uuid,
        body: ApplyJobDto,
    ) -> Result<JobApplication, ServiceError> {
        let labour = self.labour_for(user).await?;
        if !labour.is_approved {
            return Err(ServiceError::LabourNotApproved(labour.id));
        }

        let job = self.load_job(job_id).await?;
        Self::expect_status(&job, JobStatus::Open)?;

        let message = body
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        let application = match self
            .db_client
            .create_application(job.id, labour.id, message)
            .await
        {
            Ok(Some(application)) => application,
            Ok(None) => return Err(self.job_conflict(job.id, JobStatus::Open).await),
            Err(e) if e.is_unique_violation(APPLICATION_UNIQUE) => {
                return Err(ServiceError::AlreadyApplied(job.id))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            "Labour {} applied to job {} (application {})",
            labour.id,
            job.id,
            application.id
        );

        self.notification_service.application_submitted(
            job.client_id,
            &job.title,
            &labour.name,
            user.phone.as_deref(),
        );

        Ok(application)
    }

    async fn owned_application(
        &self,
        user: &User,
        application_id: Uuid,
    ) -> Result<(JobApplication, Job), ServiceError> {
        let application = self
            .db_client
            .get_application(application_id)
            .await?
            .ok_or(ServiceError::ApplicationNotFound(application_id))?;
        let (job, _) = self.owned_job(user, application.job_id).await?;
        Ok((application, job))
    }

    async fn application_conflict(&self, application_id: Uuid, job_id: Uuid) -> ServiceError {
        match self.db_client.get_application(application_id).await {
            Ok(Some(app)) if app.status != ApplicationStatus::Pending => {
                ServiceError::ApplicationAlreadyProcessed(application_id)
            }
            Ok(Some(_)) => self.job_conflict(job_id, JobStatus::Open).await,
            Ok(None) => ServiceError::ApplicationNotFound(application_id),
            Err(e) => e.into(),
        }
    }

    pub async fn accept_application(
        &self,
        user: &User,
        application_id: Uuid,
    ) -> Result<AcceptedApplication, ServiceError> {
        let (application, job) = self.owned_application(user, application_id).await?;

        if application.status != ApplicationStatus::Pending {
            return Err(ServiceError::ApplicationAlreadyProcessed(application_id));
        }
        Self::expect_status(&job, JobStatus::Open)?;

        let accepted = match self
            .db_client
            .accept_application(application_id, Utc::now())
            .await?
        {
            Some(accepted) => accepted,
            None => return Err(self.application_conflict(application_id, job.id).await),
        };

        tracing::info!(
            "Application {} accepted: job {} now in_progress with labour {}, {} sibling(s) rejected",
            accepted.application.id,
            accepted.job.id,
            accepted.application.labour_id,
            accepted.rejected_application_ids.len()
        );

        self.notification_service
            .application_accepted(accepted.application.labour_id, &accepted.job.title);

        Ok(accepted)
    }

    pub async fn reject_application(
        &self,
        user: &User,
        application_id: Uuid,
    ) -> Result<JobApplication, ServiceError> {
        let (application, job) = self.owned_application(user, application_id).await?;

        if application.status != ApplicationStatus::Pending {
            return Err(ServiceError::ApplicationAlreadyProcessed(application_id));
        }

        let rejected = self
            .db_client
            .reject_application(application_id, Utc::now())
            .await?
            .ok_or(ServiceError::ApplicationAlreadyProcessed(application_id))?;

        tracing::info!("Application {} for job {} rejected", rejected.id, job.id);
        Ok(rejected)
    }

    pub async fn mark_work_done(&self, user: &User, job_id: Uuid) -> Result<Job, ServiceError> {
        let (job, _) = self.owned_job(user, job_id).await?;
        let job = self
            .advance(&job, JobStatus::InProgress, JobStatus::AwaitingCompletion)
            .await?;

        tracing::info!("Job {} marked done, awaiting payment confirmation", job.id);

        if let Some(labour_id) = job.labour_id {
            self.notification_service.work_done(labour_id, &job.title);
        }

        Ok(job)
    }

    pub async fn confirm_payment(&self, user: &User, job_id: Uuid) -> Result<Job, ServiceError> {
        let job = self.load_job(job_id).await?;
        let labour = self
            .db_client
            .get_labour_by_user(user.id)
            .await?
            .filter(|l| job.labour_id == Some(l.id))
            .ok_or(ServiceError::NotAssignedLabour(user.id, job_id))?;

        let job = self
            .advance(&job, JobStatus::AwaitingCompletion, JobStatus::Completed)
            .await?;

        tracing::info!("Job {} completed: labour {} confirmed payment", job.id, labour.id);

        self.notification_service
            .payment_confirmed(job.client_id, &job.title, job.settlement_amount());

        Ok(job)
    }

    pub async fn rate_job(
        &self,
        user: &User,
        job_id: Uuid,
        body: RateJobDto,
    ) -> Result<RatedJob, ServiceError> {
        let (job, client) = self.owned_job(user, job_id).await?;
        Self::expect_status(&job, JobStatus::Completed)?;

        if self.db_client.get_rating_by_job(job.id).await?.is_some() {
            return Err(ServiceError::AlreadyRated(job.id));
        }

        let labour_id = job.labour_id.ok_or_else(|| {
            ServiceError::Other(format!("completed job {} has no assigned labour", job.id))
        })?;

        let rating = NewRating {
            job_id: job.id,
            client_id: client.id,
            labour_id,
            rating: body.rating,
            comment: body
                .comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        };

        let (rating, labour) = match self.db_client.rate_job(rating, Utc::now()).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return Err(self.job_conflict(job.id, JobStatus::Completed).await),
            Err(e) if e.is_unique_violation(RATING_JOB_UNIQUE) => {
                return Err(ServiceError::AlreadyRated(job.id))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            "Job {} rated {} by client {}; labour {} now {:.2} over {} rating(s)",
            job.id,
            rating.rating,
            client.id,
            labour.id,
            labour.average_rating,
            labour.rating_count
        );

        Ok(RatedJob { job, rating, labour })
    }

    pub async fn cancel_job(&self, user: &User, job_id: Uuid) -> Result<Job, ServiceError> {
        let (job, _) = self.owned_job(user, job_id).await?;
        Self::expect_status(&job, JobStatus::Open)?;

        let job = match self.db_client.cancel_job(job.id, Utc::now()).await? {
            Some(job) => job,
            None => return Err(self.job_conflict(job.id, JobStatus::Open).await),
        };

        tracing::info!("Job {} cancelled by its client", job.id);
        Ok(job)
    }

    /// Clients see what they posted, labour sees what they were hired for
    /// (never `open` unless asked), admins see everything.
    pub async fn list_my_jobs(
        &self,
        user: &User,
        status: Option<JobStatus>,
        page: PageRequest,
    ) -> Result<Page<JobWithClient>, ServiceError> {
        let mut filter = JobFilter {
            status,
            ..Default::default()
        };

        match user.role {
            UserRole::Client => filter.client_id = Some(self.client_for(user).await?.id),
            UserRole::Labour => {
                filter.labour_id = Some(self.labour_for(user).await?.id);
                if status.is_none() {
                    filter.exclude_status = Some(JobStatus::Open);
                }
            }
            UserRole::Admin => {}
        }

        Ok(self.db_client.list_jobs(&filter, page).await?)
    }

    /// Open jobs in the caller's categories and city.
    pub async fn list_available_jobs(
        &self,
        user: &User,
        page: PageRequest,
    ) -> Result<Page<JobWithClient>, ServiceError> {
        let labour = self.labour_for(user).await?;
        let filter = JobFilter {
            status: Some(JobStatus::Open),
            category_ids: Some(labour.category_ids.clone()),
            city: Some(labour.city),
            ..Default::default()
        };
        Ok(self.db_client.list_jobs(&filter, page).await?)
    }

    pub async fn list_job_applications(
        &self,
        user: &User,
        job_id: Uuid,
        status: Option<ApplicationStatus>,
        page: PageRequest,
    ) -> Result<Page<ApplicationWithLabourAndUser>, ServiceError> {
        let (job, _) = self.owned_job(user, job_id).await?;
        let applications = self
            .db_client
            .list_job_applications(job.id, status, page)
            .await?;
        Ok(applications.map(|mut item| {
            item.labour_phone = item.labour_phone.as_deref().map(format_phone_display);
            item
        }))
    }

    pub async fn list_my_applications(
        &self,
        user: &User,
        status: Option<ApplicationStatus>,
        page: PageRequest,
    ) -> Result<Page<ApplicationWithJob>, ServiceError> {
        let labour = self.labour_for(user).await?;
        Ok(self
            .db_client
            .list_labour_applications(labour.id, status, page)
            .await?)
    }
}
