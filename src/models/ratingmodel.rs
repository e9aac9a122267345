use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A client's review of one completed job. At most one per job, never edited.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: Uuid,
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub labour_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRating {
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub labour_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
}

impl NewRating {
    pub fn into_rating(self, id: Uuid, now: DateTime<Utc>) -> Rating {
        Rating {
            id,
            job_id: self.job_id,
            client_id: self.client_id,
            labour_id: self.labour_id,
            rating: self.rating,
            comment: self.comment,
            created_at: now,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RatingWithNames {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub rating: Rating,
    pub client_name: String,
    pub labour_name: String,
    pub job_title: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RecentComment {
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub client_name: String,
}

/// Histogram of rating values for one worker.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingDistribution {
    #[serde(rename = "1")]
    pub one: i64,
    #[serde(rename = "2")]
    pub two: i64,
    #[serde(rename = "3")]
    pub three: i64,
    #[serde(rename = "4")]
    pub four: i64,
    #[serde(rename = "5")]
    pub five: i64,
}

impl RatingDistribution {
    pub fn record(&mut self, rating: i16, count: i64) {
        match rating {
            1 => self.one += count,
            2 => self.two += count,
            3 => self.three += count,
            4 => self.four += count,
            5 => self.five += count,
            _ => {}
        }
    }

    pub fn total(&self) -> i64 {
        self.one + self.two + self.three + self.four + self.five
    }
}

/// Running (sum, count) pair behind a worker's average rating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningAverage {
    pub total: i64,
    pub count: i64,
}

impl RunningAverage {
    pub fn fold(self, rating: i16) -> Self {
        RunningAverage {
            total: self.total + i64::from(rating),
            count: self.count + 1,
        }
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total as f64 / self.count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_average_is_zero() {
        assert_eq!(RunningAverage::default().average(), 0.0);
    }

    #[test]
    fn fold_matches_documented_example() {
        let agg = [5, 4, 3]
            .into_iter()
            .fold(RunningAverage::default(), RunningAverage::fold);
        assert_eq!(agg.total, 12);
        assert_eq!(agg.count, 3);
        assert_eq!(agg.average(), 4.0);
    }

    #[test]
    fn fold_is_order_independent() {
        let orders: [[i16; 3]; 6] = [
            [5, 4, 3],
            [5, 3, 4],
            [4, 5, 3],
            [4, 3, 5],
            [3, 5, 4],
            [3, 4, 5],
        ];
        let expected = RunningAverage { total: 12, count: 3 };
        for order in orders {
            let agg = order
                .into_iter()
                .fold(RunningAverage::default(), RunningAverage::fold);
            assert_eq!(agg, expected, "order {:?}", order);
        }
    }

    #[test]
    fn average_stays_within_bounds() {
        let mut agg = RunningAverage::default();
        for r in [1, 5, 5, 1, 2, 3, 4, 5] {
            agg = agg.fold(r);
            let avg = agg.average();
            assert!((0.0..=5.0).contains(&avg));
            assert_eq!(avg, agg.total as f64 / agg.count as f64);
        }
    }

    #[test]
    fn distribution_ignores_out_of_range_values() {
        let mut d = RatingDistribution::default();
        d.record(5, 2);
        d.record(1, 1);
        d.record(9, 4);
        assert_eq!(d.five, 2);
        assert_eq!(d.one, 1);
        assert_eq!(d.total(), 3);
        let json = serde_json::to_value(d).unwrap();
        assert_eq!(json["5"], 2);
    }
}
