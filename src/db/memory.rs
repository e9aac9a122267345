use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CategoryExt, DbError, JobExt, LabourExt, MarketStore, OtpExt, RatingExt, UserExt,
    APPLICATION_UNIQUE, CATEGORY_NAME_UNIQUE, RATING_JOB_UNIQUE, USER_EMAIL_UNIQUE,
    USER_PHONE_UNIQUE,
};
use crate::{
    models::{
        categorymodel::{Category, CategoryUpdate},
        clientmodel::Client,
        jobmodel::{
            AcceptedApplication, ApplicationStatus, ApplicationWithJob,
            ApplicationWithLabourAndUser, Job, JobApplication, JobFilter, JobStatus,
            JobWithClient, NewJob,
        },
        labourmodel::{ApprovalStatus, City, Labour, LabourFilter, LabourWithUser, NewLabour},
        otpmodel::Otp,
        ratingmodel::{NewRating, Rating, RatingDistribution, RatingWithNames, RecentComment},
        usermodel::{NewUser, User},
    },
    utils::pagination::{Page, PageRequest},
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    clients: HashMap<Uuid, Client>,
    labours: HashMap<Uuid, Labour>,
    categories: HashMap<Uuid, Category>,
    jobs: HashMap<Uuid, Job>,
    applications: HashMap<Uuid, JobApplication>,
    ratings: HashMap<Uuid, Rating>,
    otps: Vec<Otp>,
    last_stamp: Option<DateTime<Utc>>,
}

/// Process-local store. Every operation takes the table lock once, so each
/// multi-row mutation is applied entirely or not at all.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    #[cfg(test)]
    profile_reads_fail: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `get_client` and `get_labour` error from now on.
    #[cfg(test)]
    pub fn fail_profile_reads(&self) {
        self.profile_reads_fail
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_profile_read(&self) -> Result<(), DbError> {
        #[cfg(test)]
        if self
            .profile_reads_fail
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

impl MarketStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

fn newest_first(a: &DateTime<Utc>, a_id: &Uuid, b: &DateTime<Utc>, b_id: &Uuid) -> Ordering {
    b.cmp(a).then_with(|| a_id.cmp(b_id))
}

fn paginate<T: Clone>(items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as i64;
    Page::new(page.slice(&items), total, page)
}

impl Tables {
    /// Strictly increasing timestamps so newest-first orderings are total.
    fn stamp(&mut self, at: DateTime<Utc>) -> DateTime<Utc> {
        let next = match self.last_stamp {
            Some(last) if at <= last => last + Duration::microseconds(1),
            _ => at,
        };
        self.last_stamp = Some(next);
        next
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.stamp(Utc::now())
    }

    fn insert_user(&mut self, user: NewUser) -> Result<User, DbError> {
        if !user.has_contact() {
            return Err(DbError::InvalidRecord(
                "either email or phone must be provided".to_string(),
            ));
        }
        for existing in self.users.values() {
            if user.email.is_some() && existing.email == user.email {
                return Err(DbError::UniqueViolation(USER_EMAIL_UNIQUE.to_string()));
            }
            if user.phone.is_some() && existing.phone == user.phone {
                return Err(DbError::UniqueViolation(USER_PHONE_UNIQUE.to_string()));
            }
        }
        let now = self.tick();
        let user = user.into_user(Uuid::new_v4(), now);
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn category_name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        let name = name.to_lowercase();
        self.categories
            .values()
            .any(|c| Some(c.id) != except && c.name.to_lowercase() == name)
    }

    fn labour_with_user(&self, labour: &Labour) -> LabourWithUser {
        let mut category_names: Vec<String> = self
            .categories
            .values()
            .filter(|c| labour.category_ids.contains(&c.id))
            .map(|c| c.name.clone())
            .collect();
        category_names.sort();

        LabourWithUser {
            labour: labour.clone(),
            phone: self.users.get(&labour.user_id).and_then(|u| u.phone.clone()),
            category_names,
        }
    }

    fn job_with_client(&self, job: &Job) -> Option<JobWithClient> {
        let category = self.categories.get(&job.category_id)?;
        let client = self.clients.get(&job.client_id)?;
        Some(JobWithClient {
            job: job.clone(),
            category_name: category.name.clone(),
            client_name: client.name.clone(),
            client_company: client.company.clone(),
            labour_name: job
                .labour_id
                .and_then(|id| self.labours.get(&id))
                .map(|l| l.name.clone()),
        })
    }

    fn application_with_labour(
        &self,
        application: &JobApplication,
    ) -> Option<ApplicationWithLabourAndUser> {
        let labour = self.labours.get(&application.labour_id)?;
        let user = self.users.get(&labour.user_id)?;
        Some(ApplicationWithLabourAndUser {
            application: application.clone(),
            labour_name: labour.name.clone(),
            labour_hourly_rate: labour.hourly_rate,
            labour_city: labour.city,
            labour_average_rating: labour.average_rating,
            labour_rating_count: labour.rating_count,
            labour_phone: user.phone.clone(),
        })
    }

    fn application_with_job(&self, application: &JobApplication) -> Option<ApplicationWithJob> {
        let job = self.jobs.get(&application.job_id)?;
        let category = self.categories.get(&job.category_id)?;
        let client = self.clients.get(&job.client_id)?;
        Some(ApplicationWithJob {
            application: application.clone(),
            job_title: job.title.clone(),
            job_status: job.status,
            job_city: job.city,
            job_hourly_rate: job.hourly_rate,
            category_name: category.name.clone(),
            client_name: client.name.clone(),
            client_company: client.company.clone(),
        })
    }

    fn rating_with_names(&self, rating: &Rating) -> Option<RatingWithNames> {
        Some(RatingWithNames {
            rating: rating.clone(),
            client_name: self.clients.get(&rating.client_id)?.name.clone(),
            labour_name: self.labours.get(&rating.labour_id)?.name.clone(),
            job_title: self.jobs.get(&rating.job_id)?.title.clone(),
        })
    }

    fn sorted_ratings(&self, keep: impl Fn(&Rating) -> bool) -> Vec<&Rating> {
        let mut ratings: Vec<&Rating> = self.ratings.values().filter(|r| keep(r)).collect();
        ratings.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id));
        ratings
    }

    fn sorted_applications(&self, keep: impl Fn(&JobApplication) -> bool) -> Vec<&JobApplication> {
        let mut apps: Vec<&JobApplication> =
            self.applications.values().filter(|a| keep(a)).collect();
        apps.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id));
        apps
    }

    fn reject_pending_siblings(
        &mut self,
        job_id: Uuid,
        except: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Vec<Uuid> {
        let mut rejected = Vec::new();
        for app in self.applications.values_mut() {
            if app.job_id == job_id
                && Some(app.id) != except
                && app.respond(ApplicationStatus::Rejected, at)
            {
                rejected.push(app.id);
            }
        }
        rejected.sort();
        rejected
    }
}

#[async_trait]
impl UserExt for MemoryStore {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, DbError> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<User>, DbError> {
        let tables = self.tables.read().await;
        let mut matches: Vec<&User> = tables
            .users
            .values()
            .filter(|u| {
                (email.is_some() && u.email.as_deref() == email)
                    || (phone.is_some() && u.phone.as_deref() == phone)
            })
            .collect();
        matches.sort_by_key(|u| u.created_at);
        Ok(matches.first().map(|u| (*u).clone()))
    }

    async fn save_user(&self, user: NewUser) -> Result<User, DbError> {
        self.tables.write().await.insert_user(user)
    }

    async fn create_client_account(
        &self,
        user: NewUser,
        name: String,
        company: Option<String>,
    ) -> Result<(User, Client), DbError> {
        let mut tables = self.tables.write().await;
        let user = tables.insert_user(user)?;
        let client = Client {
            id: Uuid::new_v4(),
            user_id: user.id,
            name,
            company,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        tables.clients.insert(client.id, client.clone());
        Ok((user, client))
    }

    async fn create_labour_account(
        &self,
        user: NewUser,
        profile: NewLabour,
    ) -> Result<(User, Labour), DbError> {
        if profile.category_ids.is_empty() {
            return Err(DbError::InvalidRecord(
                "labour must offer at least one category".to_string(),
            ));
        }
        let mut tables = self.tables.write().await;
        let user = tables.insert_user(user)?;
        let labour = profile.into_labour(Uuid::new_v4(), user.id, user.created_at);
        tables.labours.insert(labour.id, labour.clone());
        Ok((user, labour))
    }
}

#[async_trait]
impl LabourExt for MemoryStore {
    async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>, DbError> {
        self.check_profile_read()?;
        Ok(self.tables.read().await.clients.get(&client_id).cloned())
    }

    async fn get_client_by_user(&self, user_id: Uuid) -> Result<Option<Client>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables.clients.values().find(|c| c.user_id == user_id).cloned())
    }

    async fn get_labour(&self, labour_id: Uuid) -> Result<Option<Labour>, DbError> {
        self.check_profile_read()?;
        Ok(self.tables.read().await.labours.get(&labour_id).cloned())
    }

    async fn get_labour_by_user(&self, user_id: Uuid) -> Result<Option<Labour>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables.labours.values().find(|l| l.user_id == user_id).cloned())
    }

    async fn get_labour_with_user(
        &self,
        labour_id: Uuid,
    ) -> Result<Option<LabourWithUser>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .labours
            .get(&labour_id)
            .map(|l| tables.labour_with_user(l)))
    }

    async fn approved_labour_rates(
        &self,
        category_id: Uuid,
        city: City,
    ) -> Result<Vec<f64>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .labours
            .values()
            .filter(|l| l.is_approved && l.serves(category_id, city))
            .map(|l| l.hourly_rate)
            .collect())
    }

    async fn decide_labour_approval(
        &self,
        labour_id: Uuid,
        decision: ApprovalStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Labour>, DbError> {
        let mut tables = self.tables.write().await;
        let at = tables.stamp(at);
        let Some(labour) = tables.labours.get_mut(&labour_id) else {
            return Ok(None);
        };
        if !labour.decide(decision, at) {
            return Ok(None);
        }
        Ok(Some(labour.clone()))
    }

    async fn list_approved_labour(
        &self,
        filter: &LabourFilter,
        page: PageRequest,
    ) -> Result<Page<LabourWithUser>, DbError> {
        let tables = self.tables.read().await;
        let mut labours: Vec<&Labour> = tables
            .labours
            .values()
            .filter(|l| l.is_approved)
            .filter(|l| filter.category_id.map_or(true, |c| l.category_ids.contains(&c)))
            .filter(|l| filter.city.map_or(true, |city| l.city == city))
            .collect();
        labours.sort_by(|a, b| {
            b.average_rating
                .partial_cmp(&a.average_rating)
                .unwrap_or(Ordering::Equal)
                .then_with(|| newest_first(&a.created_at, &a.id, &b.created_at, &b.id))
        });
        let items: Vec<LabourWithUser> =
            labours.into_iter().map(|l| tables.labour_with_user(l)).collect();
        Ok(paginate(items, page))
    }

    async fn list_pending_labour(&self) -> Result<Vec<LabourWithUser>, DbError> {
        let tables = self.tables.read().await;
        let mut labours: Vec<&Labour> = tables
            .labours
            .values()
            .filter(|l| l.approval_status == ApprovalStatus::Pending)
            .collect();
        labours.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id));
        Ok(labours.into_iter().map(|l| tables.labour_with_user(l)).collect())
    }
}

#[async_trait]
impl CategoryExt for MemoryStore {
    async fn create_category(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<Category, DbError> {
        let mut tables = self.tables.write().await;
        if tables.category_name_taken(&name, None) {
            return Err(DbError::UniqueViolation(CATEGORY_NAME_UNIQUE.to_string()));
        }
        let now = tables.tick();
        let category = Category {
            id: Uuid::new_v4(),
            name,
            description,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>, DbError> {
        Ok(self.tables.read().await.categories.get(&category_id).cloned())
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, DbError> {
        let name = name.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .values()
            .find(|c| c.name.to_lowercase() == name)
            .cloned())
    }

    async fn update_category(
        &self,
        category_id: Uuid,
        update: CategoryUpdate,
        at: DateTime<Utc>,
    ) -> Result<Option<Category>, DbError> {
        let mut tables = self.tables.write().await;
        if let Some(name) = &update.name {
            if tables.category_name_taken(name, Some(category_id)) {
                return Err(DbError::UniqueViolation(CATEGORY_NAME_UNIQUE.to_string()));
            }
        }
        let at = tables.stamp(at);
        let Some(category) = tables.categories.get_mut(&category_id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            category.name = name;
        }
        if let Some(description) = update.description {
            category.description = Some(description);
        }
        if let Some(is_active) = update.is_active {
            category.is_active = is_active;
        }
        category.updated_at = at;
        Ok(Some(category.clone()))
    }

    async fn list_active_categories(&self) -> Result<Vec<Category>, DbError> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = tables
            .categories
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_categories_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Category>, DbError> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = ids
            .iter()
            .filter_map(|id| tables.categories.get(id).cloned())
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        categories.dedup_by_key(|c| c.id);
        Ok(categories)
    }
}

#[async_trait]
impl JobExt for MemoryStore {
    async fn create_job(&self, job: NewJob) -> Result<Job, DbError> {
        let mut tables = self.tables.write().await;
        let now = tables.tick();
        let job = job.into_job(Uuid::new_v4(), now);
        tables.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, DbError> {
        Ok(self.tables.read().await.jobs.get(&job_id).cloned())
    }

    async fn get_job_with_client(&self, job_id: Uuid) -> Result<Option<JobWithClient>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables.jobs.get(&job_id).and_then(|j| tables.job_with_client(j)))
    }

    async fn list_jobs(
        &self,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<Page<JobWithClient>, DbError> {
        let tables = self.tables.read().await;
        let mut jobs: Vec<&Job> = tables
            .jobs
            .values()
            .filter(|j| filter.client_id.map_or(true, |id| j.client_id == id))
            .filter(|j| filter.labour_id.map_or(true, |id| j.labour_id == Some(id)))
            .filter(|j| filter.status.map_or(true, |s| j.status == s))
            .filter(|j| filter.exclude_status.map_or(true, |s| j.status != s))
            .filter(|j| {
                filter
                    .category_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&j.category_id))
            })
            .filter(|j| filter.city.map_or(true, |city| j.city == city))
            .collect();
        jobs.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id));
        let items: Vec<JobWithClient> = jobs
            .into_iter()
            .filter_map(|j| tables.job_with_client(j))
            .collect();
        Ok(paginate(items, page))
    }

    async fn create_application(
        &self,
        job_id: Uuid,
        labour_id: Uuid,
        message: Option<String>,
    ) -> Result<Option<JobApplication>, DbError> {
        let mut tables = self.tables.write().await;
        if tables.jobs.get(&job_id).map(|j| j.status) != Some(JobStatus::Open) {
            return Ok(None);
        }
        if tables
            .applications
            .values()
            .any(|a| a.job_id == job_id && a.labour_id == labour_id)
        {
            return Err(DbError::UniqueViolation(APPLICATION_UNIQUE.to_string()));
        }
        let now = tables.tick();
        let application = JobApplication {
            id: Uuid::new_v4(),
            job_id,
            labour_id,
            status: ApplicationStatus::Pending,
            message,
            responded_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.applications.insert(application.id, application.clone());
        Ok(Some(application))
    }

    async fn get_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<JobApplication>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .applications
            .get(&application_id)
            .cloned())
    }

    async fn list_job_applications(
        &self,
        job_id: Uuid,
        status: Option<ApplicationStatus>,
        page: PageRequest,
    ) -> Result<Page<ApplicationWithLabourAndUser>, DbError> {
        let tables = self.tables.read().await;
        let items: Vec<ApplicationWithLabourAndUser> = tables
            .sorted_applications(|a| a.job_id == job_id && status.map_or(true, |s| a.status == s))
            .into_iter()
            .filter_map(|a| tables.application_with_labour(a))
            .collect();
        Ok(paginate(items, page))
    }

    async fn list_labour_applications(
        &self,
        labour_id: Uuid,
        status: Option<ApplicationStatus>,
        page: PageRequest,
    ) -> Result<Page<ApplicationWithJob>, DbError> {
        let tables = self.tables.read().await;
        let items: Vec<ApplicationWithJob> = tables
            .sorted_applications(|a| {
                a.labour_id == labour_id && status.map_or(true, |s| a.status == s)
            })
            .into_iter()
            .filter_map(|a| tables.application_with_job(a))
            .collect();
        Ok(paginate(items, page))
    }

    async fn accept_application(
        &self,
        application_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<AcceptedApplication>, DbError> {
        let mut tables = self.tables.write().await;
        let Some(pending) = tables.applications.get(&application_id).cloned() else {
            return Ok(None);
        };
        let Some(mut job) = tables.jobs.get(&pending.job_id).cloned() else {
            return Ok(None);
        };
        if pending.status != ApplicationStatus::Pending || job.status != JobStatus::Open {
            return Ok(None);
        }

        // Both preconditions hold under the write lock, so nothing below can fail halfway.
        let at = tables.stamp(at);
        job.advance(JobStatus::InProgress, at);
        job.labour_id = Some(pending.labour_id);
        tables.jobs.insert(job.id, job.clone());

        let mut application = pending;
        application.respond(ApplicationStatus::Accepted, at);
        tables.applications.insert(application.id, application.clone());

        let rejected_application_ids =
            tables.reject_pending_siblings(job.id, Some(application.id), at);

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
        let mut tables = self.tables.write().await;
        let at = tables.stamp(at);
        let Some(application) = tables.applications.get_mut(&application_id) else {
            return Ok(None);
        };
        if !application.respond(ApplicationStatus::Rejected, at) {
            return Ok(None);
        }
        Ok(Some(application.clone()))
    }

    async fn transition_job(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Job>, DbError> {
        let mut tables = self.tables.write().await;
        let at = tables.stamp(at);
        let Some(job) = tables.jobs.get_mut(&job_id) else {
            return Ok(None);
        };
        if job.status != from || !job.advance(to, at) {
            return Ok(None);
        }
        Ok(Some(job.clone()))
    }

    async fn cancel_job(&self, job_id: Uuid, at: DateTime<Utc>) -> Result<Option<Job>, DbError> {
        let mut tables = self.tables.write().await;
        let at = tables.stamp(at);
        let Some(job) = tables.jobs.get_mut(&job_id) else {
            return Ok(None);
        };
        if job.status != JobStatus::Open || !job.advance(JobStatus::Cancelled, at) {
            return Ok(None);
        }
        let job = job.clone();
        tables.reject_pending_siblings(job.id, None, at);
        Ok(Some(job))
    }
}

#[async_trait]
impl RatingExt for MemoryStore {
    async fn rate_job(
        &self,
        rating: NewRating,
        at: DateTime<Utc>,
    ) -> Result<Option<(Rating, Labour)>, DbError> {
        let mut tables = self.tables.write().await;
        if tables.jobs.get(&rating.job_id).map(|j| j.status) != Some(JobStatus::Completed) {
            return Ok(None);
        }
        if tables.ratings.values().any(|r| r.job_id == rating.job_id) {
            return Err(DbError::UniqueViolation(RATING_JOB_UNIQUE.to_string()));
        }

        let at = tables.stamp(at);
        let stored = rating.into_rating(Uuid::new_v4(), at);
        let Some(labour) = tables.labours.get_mut(&stored.labour_id) else {
            return Err(DbError::InvalidRecord(format!(
                "rated labour {} does not exist",
                stored.labour_id
            )));
        };
        labour.apply_rating(stored.rating, at);
        let labour = labour.clone();
        tables.ratings.insert(stored.id, stored.clone());
        Ok(Some((stored, labour)))
    }

    async fn get_rating_by_job(&self, job_id: Uuid) -> Result<Option<RatingWithNames>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .ratings
            .values()
            .find(|r| r.job_id == job_id)
            .and_then(|r| tables.rating_with_names(r)))
    }

    async fn list_labour_ratings(
        &self,
        labour_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<RatingWithNames>, DbError> {
        let tables = self.tables.read().await;
        let items: Vec<RatingWithNames> = tables
            .sorted_ratings(|r| r.labour_id == labour_id)
            .into_iter()
            .filter_map(|r| tables.rating_with_names(r))
            .collect();
        Ok(paginate(items, page))
    }

    async fn list_client_ratings(
        &self,
        client_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<RatingWithNames>, DbError> {
        let tables = self.tables.read().await;
        let items: Vec<RatingWithNames> = tables
            .sorted_ratings(|r| r.client_id == client_id)
            .into_iter()
            .filter_map(|r| tables.rating_with_names(r))
            .collect();
        Ok(paginate(items, page))
    }

    async fn recent_comments(
        &self,
        labour_id: Uuid,
        limit: i64,
    ) -> Result<Vec<RecentComment>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .sorted_ratings(|r| {
                r.labour_id == labour_id && r.comment.as_deref().map_or(false, |c| !c.is_empty())
            })
            .into_iter()
            .filter_map(|r| {
                Some(RecentComment {
                    rating: r.rating,
                    comment: r.comment.clone()?,
                    created_at: r.created_at,
                    client_name: tables.clients.get(&r.client_id)?.name.clone(),
                })
            })
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn rating_distribution(&self, labour_id: Uuid) -> Result<RatingDistribution, DbError> {
        let tables = self.tables.read().await;
        let mut distribution = RatingDistribution::default();
        for rating in tables.ratings.values().filter(|r| r.labour_id == labour_id) {
            distribution.record(rating.rating, 1);
        }
        Ok(distribution)
    }
}

#[async_trait]
impl OtpExt for MemoryStore {
    async fn replace_otp(
        &self,
        phone: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Otp, DbError> {
        let mut tables = self.tables.write().await;
        for otp in tables.otps.iter_mut().filter(|o| o.phone == phone) {
            otp.is_used = true;
        }
        let now = tables.tick();
        let otp = Otp {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            code: code.to_string(),
            expires_at,
            is_used: false,
            created_at: now,
        };
        tables.otps.push(otp.clone());
        Ok(otp)
    }

    async fn consume_otp(
        &self,
        phone: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let mut tables = self.tables.write().await;
        match tables
            .otps
            .iter_mut()
            .find(|o| o.phone == phone && o.is_redeemable(code, now))
        {
            Some(otp) => {
                otp.is_used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_expired_otps(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let mut tables = self.tables.write().await;
        let before = tables.otps.len();
        tables.otps.retain(|o| !o.is_used && o.expires_at > now);
        Ok((before - tables.otps.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::usermodel::UserRole;

    fn new_user(phone: &str, role: UserRole) -> NewUser {
        NewUser {
            email: None,
            phone: Some(phone.to_string()),
            password_hash: "hash".to_string(),
            role,
            verified: true,
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        job: Job,
        labours: Vec<Labour>,
    }

    async fn open_job_with_labours(count: usize) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let category = store.create_category("Plumbing".into(), None).await.unwrap();
        let (_, client) = store
            .create_client_account(new_user("9000000000", UserRole::Client), "Asha".into(), None)
            .await
            .unwrap();

        let mut labours = Vec::new();
        for i in 0..count {
            let (_, labour) = store
                .create_labour_account(
                    new_user(&format!("98000000{:02}", i), UserRole::Labour),
                    NewLabour {
                        name: format!("Worker {}", i),
                        category_ids: vec![category.id],
                        hourly_rate: 150.0,
                        city: City::Hubli,
                    },
                )
                .await
                .unwrap();
            labours.push(labour);
        }

        let job = store
            .create_job(NewJob {
                client_id: client.id,
                category_id: category.id,
                title: "Fix the sink".into(),
                description: "Kitchen sink leaks under the basin".into(),
                city: City::Hubli,
                hourly_rate: 150,
                estimated_hours: 2.0,
            })
            .await
            .unwrap();

        Fixture { store, job, labours }
    }

    #[tokio::test]
    async fn duplicate_contact_is_a_unique_violation() {
        let store = MemoryStore::new();
        store.save_user(new_user("9123456789", UserRole::Client)).await.unwrap();
        let err = store
            .save_user(new_user("9123456789", UserRole::Labour))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation(USER_PHONE_UNIQUE));
    }

    #[tokio::test]
    async fn category_names_are_case_insensitive() {
        let store = MemoryStore::new();
        store.create_category("Painting".into(), None).await.unwrap();
        let err = store.create_category("PAINTING".into(), None).await.unwrap_err();
        assert!(err.is_unique_violation(CATEGORY_NAME_UNIQUE));
        assert!(store.find_category_by_name("painting").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_application_from_same_labour_is_rejected() {
        let fx = open_job_with_labours(1).await;
        let labour = &fx.labours[0];
        fx.store
            .create_application(fx.job.id, labour.id, None)
            .await
            .unwrap()
            .unwrap();
        let err = fx
            .store
            .create_application(fx.job.id, labour.id, Some("again".into()))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation(APPLICATION_UNIQUE));
    }

    #[tokio::test]
    async fn racing_accepts_admit_exactly_one_winner() {
        let fx = open_job_with_labours(8).await;
        let mut app_ids = Vec::new();
        for labour in &fx.labours {
            let app = fx
                .store
                .create_application(fx.job.id, labour.id, None)
                .await
                .unwrap()
                .unwrap();
            app_ids.push(app.id);
        }

        let handles: Vec<_> = app_ids
            .iter()
            .map(|id| {
                let store = fx.store.clone();
                let id = *id;
                tokio::spawn(async move { store.accept_application(id, Utc::now()).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let job = fx.store.get_job(fx.job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::InProgress);

        let page = fx
            .store
            .list_job_applications(fx.job.id, None, PageRequest::new(None, Some(50)))
            .await
            .unwrap();
        let accepted: Vec<_> = page
            .items
            .iter()
            .filter(|a| a.application.status == ApplicationStatus::Accepted)
            .collect();
        assert_eq!(accepted.len(), 1);
        assert_eq!(Some(accepted[0].application.labour_id), job.labour_id);
        assert!(page
            .items
            .iter()
            .filter(|a| a.application.status != ApplicationStatus::Accepted)
            .all(|a| a.application.status == ApplicationStatus::Rejected
                && a.application.responded_at.is_some()));
    }

    #[tokio::test]
    async fn applications_close_once_job_leaves_open() {
        let fx = open_job_with_labours(2).await;
        let app = fx
            .store
            .create_application(fx.job.id, fx.labours[0].id, None)
            .await
            .unwrap()
            .unwrap();
        fx.store.accept_application(app.id, Utc::now()).await.unwrap().unwrap();
        let late = fx
            .store
            .create_application(fx.job.id, fx.labours[1].id, None)
            .await
            .unwrap();
        assert!(late.is_none());
    }

    #[tokio::test]
    async fn cancel_rejects_pending_applications() {
        let fx = open_job_with_labours(2).await;
        for labour in &fx.labours {
            fx.store
                .create_application(fx.job.id, labour.id, None)
                .await
                .unwrap();
        }
        let job = fx.store.cancel_job(fx.job.id, Utc::now()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.cancelled_at.is_some());

        let page = fx
            .store
            .list_job_applications(fx.job.id, Some(ApplicationStatus::Pending), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(fx.store.cancel_job(fx.job.id, Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_ratings_fold_once() {
        let fx = open_job_with_labours(1).await;
        let labour = &fx.labours[0];
        let app = fx
            .store
            .create_application(fx.job.id, labour.id, None)
            .await
            .unwrap()
            .unwrap();
        fx.store.accept_application(app.id, Utc::now()).await.unwrap().unwrap();
        fx.store
            .transition_job(fx.job.id, JobStatus::InProgress, JobStatus::AwaitingCompletion, Utc::now())
            .await
            .unwrap()
            .unwrap();
        fx.store
            .transition_job(fx.job.id, JobStatus::AwaitingCompletion, JobStatus::Completed, Utc::now())
            .await
            .unwrap()
            .unwrap();

        let handles: Vec<_> = [5, 1]
            .into_iter()
            .map(|value| {
                let store = fx.store.clone();
                let rating = NewRating {
                    job_id: fx.job.id,
                    client_id: fx.job.client_id,
                    labour_id: labour.id,
                    rating: value,
                    comment: None,
                };
                tokio::spawn(async move { store.rate_job(rating, Utc::now()).await })
            })
            .collect();

        let mut stored = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(Some(_)) => stored += 1,
                Err(err) if err.is_unique_violation(RATING_JOB_UNIQUE) => duplicates += 1,
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert_eq!((stored, duplicates), (1, 1));

        let labour = fx.store.get_labour(labour.id).await.unwrap().unwrap();
        assert_eq!(labour.rating_count, 1);
        assert_eq!(labour.average_rating, labour.total_rating as f64);
    }

    #[tokio::test]
    async fn otp_is_single_use_and_replaced() {
        let store = MemoryStore::new();
        let expires = Utc::now() + Duration::minutes(10);
        store.replace_otp("9876543210", "1111", expires).await.unwrap();
        store.replace_otp("9876543210", "2222", expires).await.unwrap();

        assert!(!store.consume_otp("9876543210", "1111", Utc::now()).await.unwrap());
        assert!(store.consume_otp("9876543210", "2222", Utc::now()).await.unwrap());
        assert!(!store.consume_otp("9876543210", "2222", Utc::now()).await.unwrap());
        assert_eq!(store.purge_expired_otps(Utc::now()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn expired_otp_is_not_redeemable() {
        let store = MemoryStore::new();
        let past = Utc::now() - Duration::minutes(1);
        store.replace_otp("9876543210", "1234", past).await.unwrap();
        assert!(!store.consume_otp("9876543210", "1234", Utc::now()).await.unwrap());
    }
}
