use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::{DbError, MarketStore, CATEGORY_NAME_UNIQUE},
    dtos::categorydtos::{CreateCategoryDto, UpdateCategoryDto},
    models::categorymodel::{Category, CategoryUpdate},
    service::error::ServiceError,
};

#[derive(Debug, Clone)]
pub struct CategoryService {
    db_client: Arc<dyn MarketStore>,
}

impl CategoryService {
    pub fn new(db_client: Arc<dyn MarketStore>) -> Self {
        Self { db_client }
    }

    fn duplicate(name: &str, err: DbError) -> ServiceError {
        if err.is_unique_violation(CATEGORY_NAME_UNIQUE) {
            ServiceError::DuplicateCategory(name.to_string())
        } else {
            err.into()
        }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        Ok(self.db_client.list_active_categories().await?)
    }

    pub async fn create_category(&self, body: CreateCategoryDto) -> Result<Category, ServiceError> {
        let name = body.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::Validation("Category name is required".to_string()));
        }

        if self.db_client.find_category_by_name(&name).await?.is_some() {
            return Err(ServiceError::DuplicateCategory(name));
        }

        let description = body
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let category = self
            .db_client
            .create_category(name.clone(), description)
            .await
            .map_err(|e| Self::duplicate(&name, e))?;

        tracing::info!("Category '{}' created ({})", category.name, category.id);
        Ok(category)
    }

    pub async fn update_category(
        &self,
        category_id: Uuid,
        body: UpdateCategoryDto,
    ) -> Result<Category, ServiceError> {
        let update = CategoryUpdate::from(body);
        let name = update.name.clone().unwrap_or_default();

        self.db_client
            .update_category(category_id, update, Utc::now())
            .await
            .map_err(|e| Self::duplicate(&name, e))?
            .ok_or(ServiceError::CategoryNotFound(category_id))
    }

    /// Soft delete: existing jobs and profiles keep their reference.
    pub async fn deactivate_category(&self, category_id: Uuid) -> Result<Category, ServiceError> {
        let category = self
            .db_client
            .update_category(
                category_id,
                CategoryUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await?
            .ok_or(ServiceError::CategoryNotFound(category_id))?;

        tracing::info!("Category '{}' deactivated", category.name);
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::memory::MemoryStore, error::ErrorKind};

    fn create(name: &str) -> CreateCategoryDto {
        CreateCategoryDto {
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn names_are_unique_ignoring_case() {
        let service = CategoryService::new(Arc::new(MemoryStore::new()));
        service.create_category(create("Electrical")).await.unwrap();

        let err = service.create_category(create("  electrical ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateCategory(_)));
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[tokio::test]
    async fn rename_rechecks_uniqueness() {
        let service = CategoryService::new(Arc::new(MemoryStore::new()));
        service.create_category(create("Masonry")).await.unwrap();
        let painting = service.create_category(create("Painting")).await.unwrap();

        let err = service
            .update_category(
                painting.id,
                UpdateCategoryDto {
                    name: Some("MASONRY".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        let renamed = service
            .update_category(
                painting.id,
                UpdateCategoryDto {
                    name: Some("Wall Painting".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Wall Painting");
    }

    #[tokio::test]
    async fn deactivated_categories_leave_the_listing() {
        let service = CategoryService::new(Arc::new(MemoryStore::new()));
        let welding = service.create_category(create("Welding")).await.unwrap();
        service.create_category(create("Carpentry")).await.unwrap();

        let deactivated = service.deactivate_category(welding.id).await.unwrap();
        assert!(!deactivated.is_active);

        let names: Vec<String> = service
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Carpentry".to_string()]);

        let err = service.deactivate_category(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
