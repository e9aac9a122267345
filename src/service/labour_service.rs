use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use uuid::Uuid;

use crate::{
    db::MarketStore,
    dtos::labourdtos::{display_labour, LabourCardDto, LabourProfileDto},
    models::labourmodel::{ApprovalStatus, Labour, LabourFilter, LabourWithUser},
    service::error::ServiceError,
    utils::pagination::{Page, PageRequest},
};

const CARD_COMMENTS: i64 = 3;
const PROFILE_RATINGS: u32 = 10;

/// Labour directory and the admin approval gate.
#[derive(Debug, Clone)]
pub struct LabourService {
    db_client: Arc<dyn MarketStore>,
}

impl LabourService {
    pub fn new(db_client: Arc<dyn MarketStore>) -> Self {
        Self { db_client }
    }

    pub async fn list_labour(
        &self,
        filter: LabourFilter,
        page: PageRequest,
    ) -> Result<Page<LabourCardDto>, ServiceError> {
        let labours = self.db_client.list_approved_labour(&filter, page).await?;

        let comments = join_all(
            labours
                .items
                .iter()
                .map(|l| self.db_client.recent_comments(l.labour.id, CARD_COMMENTS)),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

        let Page {
            items,
            total,
            request,
        } = labours;
        let cards = items
            .into_iter()
            .zip(comments)
            .map(|(labour, recent_ratings)| LabourCardDto {
                labour: display_labour(labour),
                recent_ratings,
            })
            .collect();

        Ok(Page::new(cards, total, request))
    }

    pub async fn get_profile(&self, labour_id: Uuid) -> Result<LabourProfileDto, ServiceError> {
        let labour = self
            .db_client
            .get_labour_with_user(labour_id)
            .await?
            .ok_or(ServiceError::LabourNotFound(labour_id))?;

        let recent = self
            .db_client
            .list_labour_ratings(labour_id, PageRequest::new(Some(1), Some(PROFILE_RATINGS)))
            .await?;

        Ok(LabourProfileDto {
            labour: display_labour(labour),
            recent_ratings: recent.items,
        })
    }

    pub async fn list_pending(&self) -> Result<Vec<LabourWithUser>, ServiceError> {
        Ok(self
            .db_client
            .list_pending_labour()
            .await?
            .into_iter()
            .map(display_labour)
            .collect())
    }

    /// One-shot: a decided profile can never be decided again.
    pub async fn decide_approval(
        &self,
        labour_id: Uuid,
        is_approved: bool,
    ) -> Result<Labour, ServiceError> {
        let labour = self
            .db_client
            .get_labour(labour_id)
            .await?
            .ok_or(ServiceError::LabourNotFound(labour_id))?;

        if labour.approval_status != ApprovalStatus::Pending {
            return Err(ServiceError::LabourAlreadyProcessed(
                labour.id,
                labour.approval_status,
            ));
        }

        let decision = if is_approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };

        match self
            .db_client
            .decide_labour_approval(labour.id, decision, Utc::now())
            .await?
        {
            Some(decided) => {
                tracing::info!("Labour {} {}", decided.id, decided.approval_status);
                Ok(decided)
            }
            None => {
                let current = self
                    .db_client
                    .get_labour(labour_id)
                    .await?
                    .map(|l| l.approval_status)
                    .unwrap_or(decision);
                Err(ServiceError::LabourAlreadyProcessed(labour_id, current))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{memory::MemoryStore, LabourExt},
        error::ErrorKind,
        models::labourmodel::City,
        test_support::{seed_category, seed_labour},
    };

    #[tokio::test]
    async fn approval_is_one_shot() {
        let store = Arc::new(MemoryStore::new());
        let service = LabourService::new(store.clone());
        let category = seed_category(&store, "Carpentry").await;
        let (_, labour) =
            seed_labour(&store, "9100000001", category.id, City::Dharwad, 250.0, false).await;

        assert_eq!(service.list_pending().await.unwrap().len(), 1);

        let approved = service.decide_approval(labour.id, true).await.unwrap();
        assert_eq!(approved.approval_status, ApprovalStatus::Approved);
        assert!(approved.is_approved);
        assert!(service.list_pending().await.unwrap().is_empty());

        let err = service.decide_approval(labour.id, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        let unchanged = store.get_labour(labour.id).await.unwrap().unwrap();
        assert_eq!(unchanged.approval_status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn rejection_keeps_labour_out_of_listings() {
        let store = Arc::new(MemoryStore::new());
        let service = LabourService::new(store.clone());
        let category = seed_category(&store, "Carpentry").await;
        let (_, rejected) =
            seed_labour(&store, "9100000001", category.id, City::Hubli, 250.0, false).await;
        seed_labour(&store, "9100000002", category.id, City::Hubli, 300.0, true).await;

        let decided = service.decide_approval(rejected.id, false).await.unwrap();
        assert_eq!(decided.approval_status, ApprovalStatus::Rejected);
        assert!(!decided.is_approved);

        let listed = service
            .list_labour(LabourFilter::default(), PageRequest::new(None, None))
            .await
            .unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0].labour.phone.as_deref(), Some("+919100000002"));
    }

    #[tokio::test]
    async fn unknown_labour_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let service = LabourService::new(store);

        let err = service.decide_approval(Uuid::new_v4(), true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = service.get_profile(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
