use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::labourmodel::City;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    InProgress,
    AwaitingCompletion,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn to_str(&self) -> &str {
        match self {
            JobStatus::Open => "open",
            JobStatus::InProgress => "in_progress",
            JobStatus::AwaitingCompletion => "awaiting_completion",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// The only edges of the lifecycle graph. Everything else, including self-loops, is refused.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Open, JobStatus::InProgress)
                | (JobStatus::Open, JobStatus::Cancelled)
                | (JobStatus::InProgress, JobStatus::AwaitingCompletion)
                | (JobStatus::AwaitingCompletion, JobStatus::Completed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub client_id: Uuid,
    pub labour_id: Option<Uuid>,
    pub category_id: Uuid,
    pub title: String,
    pub description: String,
    pub city: City,
    /// Snapshot taken at creation; never recomputed.
    pub hourly_rate: i32,
    pub estimated_hours: f64,
    pub status: JobStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub work_completed_at: Option<DateTime<Utc>>,
    pub payment_received_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Applies a forward transition and stamps the matching timestamp.
    /// Returns false without touching the job when the edge does not exist.
    pub fn advance(&mut self, next: JobStatus, at: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        match next {
            JobStatus::InProgress => self.accepted_at = Some(at),
            JobStatus::AwaitingCompletion => self.work_completed_at = Some(at),
            JobStatus::Completed => {
                self.payment_received_at = Some(at);
                self.completed_at = Some(at);
            }
            JobStatus::Cancelled => self.cancelled_at = Some(at),
            JobStatus::Open => {}
        }
        self.status = next;
        self.updated_at = at;
        true
    }

    pub fn settlement_amount(&self) -> f64 {
        f64::from(self.hourly_rate) * self.estimated_hours
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub client_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: String,
    pub city: City,
    pub hourly_rate: i32,
    pub estimated_hours: f64,
}

impl NewJob {
    pub fn into_job(self, id: Uuid, now: DateTime<Utc>) -> Job {
        Job {
            id,
            client_id: self.client_id,
            labour_id: None,
            category_id: self.category_id,
            title: self.title,
            description: self.description,
            city: self.city,
            hourly_rate: self.hourly_rate,
            estimated_hours: self.estimated_hours,
            status: JobStatus::Open,
            accepted_at: None,
            work_completed_at: None,
            payment_received_at: None,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub id: Uuid,
    pub job_id: Uuid,
    pub labour_id: Uuid,
    pub status: ApplicationStatus,
    pub message: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobApplication {
    /// Answers a pending application. Already-answered applications are left alone.
    pub fn respond(&mut self, status: ApplicationStatus, at: DateTime<Utc>) -> bool {
        if self.status != ApplicationStatus::Pending || status == ApplicationStatus::Pending {
            return false;
        }
        self.status = status;
        self.responded_at = Some(at);
        self.updated_at = at;
        true
    }
}

/// Job joined with the names callers display next to it.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobWithClient {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub job: Job,
    pub category_name: String,
    pub client_name: String,
    pub client_company: Option<String>,
    pub labour_name: Option<String>,
}

/// Application joined with the bidding worker and the worker's contact number.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationWithLabourAndUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub application: JobApplication,
    pub labour_name: String,
    pub labour_hourly_rate: f64,
    pub labour_city: City,
    pub labour_average_rating: f64,
    pub labour_rating_count: i64,
    pub labour_phone: Option<String>,
}

/// Application joined with the job it bids on, for a worker's own listing.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationWithJob {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub application: JobApplication,
    pub job_title: String,
    pub job_status: JobStatus,
    pub job_city: City,
    pub job_hourly_rate: i32,
    pub category_name: String,
    pub client_name: String,
    pub client_company: Option<String>,
}

/// Outcome of the atomic accept: the winner, the job it now owns, and the siblings it displaced.
#[derive(Debug, Clone)]
pub struct AcceptedApplication {
    pub application: JobApplication,
    pub job: Job,
    pub rejected_application_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub client_id: Option<Uuid>,
    pub labour_id: Option<Uuid>,
    pub status: Option<JobStatus>,
    pub exclude_status: Option<JobStatus>,
    pub category_ids: Option<Vec<Uuid>>,
    pub city: Option<City>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobStatus; 5] = [
        JobStatus::Open,
        JobStatus::InProgress,
        JobStatus::AwaitingCompletion,
        JobStatus::Completed,
        JobStatus::Cancelled,
    ];

    fn open_job() -> Job {
        NewJob {
            client_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            title: "Fix sink".into(),
            description: "Kitchen sink leaks under the basin".into(),
            city: City::Dharwad,
            hourly_rate: 175,
            estimated_hours: 2.0,
        }
        .into_job(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn lifecycle_has_exactly_four_edges() {
        let edges: Vec<_> = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();
        assert_eq!(
            edges,
            vec![
                (JobStatus::Open, JobStatus::InProgress),
                (JobStatus::Open, JobStatus::Cancelled),
                (JobStatus::InProgress, JobStatus::AwaitingCompletion),
                (JobStatus::AwaitingCompletion, JobStatus::Completed),
            ]
        );
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for to in ALL {
            assert!(!JobStatus::Completed.can_transition_to(to));
            assert!(!JobStatus::Cancelled.can_transition_to(to));
        }
    }

    #[test]
    fn advance_stamps_timestamps_and_refuses_skips() {
        let mut job = open_job();
        let t = Utc::now();

        assert!(!job.advance(JobStatus::AwaitingCompletion, t));
        assert_eq!(job.status, JobStatus::Open);

        assert!(job.advance(JobStatus::InProgress, t));
        assert_eq!(job.accepted_at, Some(t));
        assert!(job.advance(JobStatus::AwaitingCompletion, t));
        assert_eq!(job.work_completed_at, Some(t));
        assert!(job.advance(JobStatus::Completed, t));
        assert_eq!(job.payment_received_at, Some(t));
        assert_eq!(job.completed_at, Some(t));

        assert!(!job.advance(JobStatus::Open, t));
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn application_answers_once() {
        let now = Utc::now();
        let mut app = JobApplication {
            id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            labour_id: Uuid::new_v4(),
            status: ApplicationStatus::Pending,
            message: None,
            responded_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(app.respond(ApplicationStatus::Accepted, now));
        assert!(!app.respond(ApplicationStatus::Rejected, now));
        assert_eq!(app.status, ApplicationStatus::Accepted);
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_value(JobStatus::AwaitingCompletion).unwrap(),
            "awaiting_completion"
        );
        assert_eq!(open_job().settlement_amount(), 350.0);
    }
}
