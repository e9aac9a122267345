use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ratingmodel::RunningAverage;

pub const MIN_HOURLY_RATE: f64 = 50.0;
pub const MAX_HOURLY_RATE: f64 = 2000.0;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "city")]
pub enum City {
    Hubli,
    Dharwad,
}

impl City {
    pub fn to_str(&self) -> &str {
        match self {
            City::Hubli => "Hubli",
            City::Dharwad => "Dharwad",
        }
    }
}

impl FromStr for City {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Hubli" => Ok(City::Hubli),
            "Dharwad" => Ok(City::Dharwad),
            other => Err(format!("City must be Hubli or Dharwad, got {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "approval_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Worker profile, owned 1:1 by a `User` with the labour role.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Labour {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category_ids: Vec<Uuid>,
    pub hourly_rate: f64,
    pub city: City,
    pub approval_status: ApprovalStatus,
    pub is_approved: bool,
    pub total_rating: i64,
    pub rating_count: i64,
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Labour {
    pub fn serves(&self, category_id: Uuid, city: City) -> bool {
        self.city == city && self.category_ids.contains(&category_id)
    }

    pub fn rating_aggregate(&self) -> RunningAverage {
        RunningAverage {
            total: self.total_rating,
            count: self.rating_count,
        }
    }

    /// Folds one more rating into the stored aggregate without looking at history.
    pub fn apply_rating(&mut self, rating: i16, now: DateTime<Utc>) {
        let next = self.rating_aggregate().fold(rating);
        self.total_rating = next.total;
        self.rating_count = next.count;
        self.average_rating = next.average();
        self.updated_at = now;
    }

    /// Moves the profile out of `pending`. Returns false (and changes nothing) once decided.
    pub fn decide(&mut self, decision: ApprovalStatus, now: DateTime<Utc>) -> bool {
        if self.approval_status != ApprovalStatus::Pending || decision == ApprovalStatus::Pending {
            return false;
        }
        self.approval_status = decision;
        self.is_approved = decision == ApprovalStatus::Approved;
        self.updated_at = now;
        true
    }
}

#[derive(Debug, Clone)]
pub struct NewLabour {
    pub name: String,
    pub category_ids: Vec<Uuid>,
    pub hourly_rate: f64,
    pub city: City,
}

impl NewLabour {
    pub fn into_labour(self, id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Labour {
        Labour {
            id,
            user_id,
            name: self.name,
            category_ids: self.category_ids,
            hourly_rate: self.hourly_rate,
            city: self.city,
            approval_status: ApprovalStatus::Pending,
            is_approved: false,
            total_rating: 0,
            rating_count: 0,
            average_rating: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Labour joined with its owning user's phone and the names of its categories.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LabourWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub labour: Labour,
    pub phone: Option<String>,
    pub category_names: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LabourFilter {
    pub category_id: Option<Uuid>,
    pub city: Option<City>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labour() -> Labour {
        NewLabour {
            name: "Ravi".into(),
            category_ids: vec![Uuid::new_v4()],
            hourly_rate: 150.0,
            city: City::Hubli,
        }
        .into_labour(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn new_labour_starts_pending_and_unrated() {
        let l = labour();
        assert_eq!(l.approval_status, ApprovalStatus::Pending);
        assert!(!l.is_approved);
        assert_eq!(l.rating_count, 0);
        assert_eq!(l.average_rating, 0.0);
    }

    #[test]
    fn approval_decision_is_one_shot() {
        let mut l = labour();
        assert!(l.decide(ApprovalStatus::Approved, Utc::now()));
        assert!(l.is_approved);

        assert!(!l.decide(ApprovalStatus::Rejected, Utc::now()));
        assert_eq!(l.approval_status, ApprovalStatus::Approved);
        assert!(l.is_approved);
    }

    #[test]
    fn deciding_pending_is_not_a_decision() {
        let mut l = labour();
        assert!(!l.decide(ApprovalStatus::Pending, Utc::now()));
        assert!(l.decide(ApprovalStatus::Rejected, Utc::now()));
        assert!(!l.is_approved);
    }

    #[test]
    fn serves_matches_category_and_city() {
        let l = labour();
        let cat = l.category_ids[0];
        assert!(l.serves(cat, City::Hubli));
        assert!(!l.serves(cat, City::Dharwad));
        assert!(!l.serves(Uuid::new_v4(), City::Hubli));
    }
}
