use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{
        jobmodel::{AcceptedApplication, ApplicationStatus, Job, JobApplication, JobStatus},
        labourmodel::{City, Labour},
        ratingmodel::Rating,
    },
    utils::pagination::PageRequest,
};

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobDto {
    #[validate(length(min = 5, max = 100, message = "Title must be 5-100 characters"))]
    pub title: String,

    #[validate(length(min = 20, max = 1000, message = "Description must be 20-1000 characters"))]
    pub description: String,

    pub category: Uuid,

    pub city: City,

    #[validate(range(min = 1.0, max = 100.0, message = "Estimated hours must be 1-100"))]
    pub estimated_hours: f64,
}

#[derive(Validate, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyJobDto {
    #[validate(length(max = 500, message = "Message must be max 500 characters"))]
    pub message: Option<String>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct RateJobDto {
    #[validate(range(min = 1, max = 5, message = "Rating must be 1-5"))]
    pub rating: i16,

    #[validate(length(max = 500, message = "Comment must be max 500 characters"))]
    pub comment: Option<String>,
}

#[derive(Validate, Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobListQueryDto {
    pub status: Option<JobStatus>,

    #[validate(range(min = 1, message = "Page must be positive integer"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 50, message = "Limit must be 1-50"))]
    pub limit: Option<u32>,
}

impl JobListQueryDto {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Validate, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationListQueryDto {
    pub status: Option<ApplicationStatus>,

    #[validate(range(min = 1, message = "Page must be positive integer"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 50, message = "Limit must be 1-50"))]
    pub limit: Option<u32>,
}

impl ApplicationListQueryDto {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedApplicationDto {
    pub application: JobApplication,
    pub job: Job,
    pub rejected_application_ids: Vec<Uuid>,
}

impl From<AcceptedApplication> for AcceptedApplicationDto {
    fn from(accepted: AcceptedApplication) -> Self {
        AcceptedApplicationDto {
            application: accepted.application,
            job: accepted.job,
            rejected_application_ids: accepted.rejected_application_ids,
        }
    }
}

/// Worker aggregate after a rating has been folded in.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LabourRatingSummaryDto {
    pub id: Uuid,
    pub name: String,
    pub average_rating: f64,
    pub rating_count: i64,
}

impl From<&Labour> for LabourRatingSummaryDto {
    fn from(labour: &Labour) -> Self {
        LabourRatingSummaryDto {
            id: labour.id,
            name: labour.name.clone(),
            average_rating: labour.average_rating,
            rating_count: labour.rating_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedJobDto {
    pub job: Job,
    pub rating: Rating,
    pub labour: LabourRatingSummaryDto,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_rules() {
        let dto = CreateJobDto {
            title: "Fix".into(),
            description: "too short".into(),
            category: Uuid::new_v4(),
            city: City::Dharwad,
            estimated_hours: 0.5,
        };
        let errors = dto.validate().unwrap_err();
        let fields = errors.field_errors();
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn rating_bounds() {
        let ok = RateJobDto { rating: 5, comment: None };
        assert!(ok.validate().is_ok());
        let low = RateJobDto { rating: 0, comment: None };
        assert!(low.validate().is_err());
        let long = RateJobDto {
            rating: 3,
            comment: Some("x".repeat(501)),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn list_query_caps_limit() {
        let query = JobListQueryDto {
            limit: Some(51),
            ..Default::default()
        };
        assert!(query.validate().is_err());
        let query: JobListQueryDto = serde_json::from_str(r#"{"status":"in_progress"}"#).unwrap();
        assert_eq!(query.status, Some(JobStatus::InProgress));
        assert_eq!(query.page_request(), PageRequest::new(None, None));
    }
}
