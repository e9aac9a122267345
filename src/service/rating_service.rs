use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::MarketStore,
    dtos::{jobdtos::LabourRatingSummaryDto, ratingdtos::RatingStatsDto},
    models::ratingmodel::RatingWithNames,
    service::error::ServiceError,
    utils::pagination::{Page, PageRequest},
};

/// Read side of the rating aggregator.
#[derive(Debug, Clone)]
pub struct RatingService {
    db_client: Arc<dyn MarketStore>,
}

impl RatingService {
    pub fn new(db_client: Arc<dyn MarketStore>) -> Self {
        Self { db_client }
    }

    pub async fn labour_ratings(
        &self,
        labour_id: Uuid,
        page: PageRequest,
    ) -> Result<(LabourRatingSummaryDto, Page<RatingWithNames>), ServiceError> {
        let labour = self
            .db_client
            .get_labour(labour_id)
            .await?
            .ok_or(ServiceError::LabourNotFound(labour_id))?;
        let ratings = self.db_client.list_labour_ratings(labour.id, page).await?;
        Ok((LabourRatingSummaryDto::from(&labour), ratings))
    }

    /// Average and count come from the stored aggregate; the histogram from the rows.
    pub async fn labour_stats(&self, labour_id: Uuid) -> Result<RatingStatsDto, ServiceError> {
        let labour = self
            .db_client
            .get_labour(labour_id)
            .await?
            .ok_or(ServiceError::LabourNotFound(labour_id))?;
        let distribution = self.db_client.rating_distribution(labour.id).await?;

        Ok(RatingStatsDto {
            average_rating: labour.rating_aggregate().average(),
            total_ratings: labour.rating_count,
            distribution,
        })
    }

    pub async fn rating_for_job(&self, job_id: Uuid) -> Result<RatingWithNames, ServiceError> {
        self.db_client
            .get_rating_by_job(job_id)
            .await?
            .ok_or(ServiceError::RatingNotFound(job_id))
    }

    pub async fn client_ratings(
        &self,
        client_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<RatingWithNames>, ServiceError> {
        let client = self
            .db_client
            .get_client(client_id)
            .await?
            .ok_or(ServiceError::ClientNotFound(client_id))?;
        Ok(self.db_client.list_client_ratings(client.id, page).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{memory::MemoryStore, LabourExt},
        dtos::jobdtos::RateJobDto,
        error::ErrorKind,
        models::jobmodel::JobStatus,
        test_support::{app_state, job_at},
    };

    #[tokio::test]
    async fn rated_job_shows_up_everywhere() {
        let store = Arc::new(MemoryStore::new());
        let state = app_state(store.clone());
        let fixture = job_at(&state, &store, JobStatus::Completed).await;

        state
            .job_service
            .rate_job(
                &fixture.client,
                fixture.job.id,
                RateJobDto {
                    rating: 4,
                    comment: Some("Good work".into()),
                },
            )
            .await
            .unwrap();

        let ratings = &state.rating_service;
        let page = PageRequest::new(None, None);

        let (summary, listed) = ratings.labour_ratings(fixture.labour.id, page).await.unwrap();
        assert_eq!(summary.rating_count, 1);
        assert_eq!(summary.average_rating, 4.0);
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0].job_title, "Fix kitchen sink");

        let stats = ratings.labour_stats(fixture.labour.id).await.unwrap();
        assert_eq!(stats.total_ratings, 1);
        assert_eq!(stats.distribution.four, 1);
        assert_eq!(stats.distribution.total(), 1);

        let by_job = ratings.rating_for_job(fixture.job.id).await.unwrap();
        assert_eq!(by_job.rating.rating, 4);

        let client = store
            .get_client_by_user(fixture.client.id)
            .await
            .unwrap()
            .unwrap();
        let authored = ratings.client_ratings(client.id, page).await.unwrap();
        assert_eq!(authored.total, 1);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let service = RatingService::new(Arc::new(MemoryStore::new()));

        let err = service.rating_for_job(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = service.labour_stats(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = service
            .client_ratings(Uuid::new_v4(), PageRequest::new(None, None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
