use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::categorymodel::CategoryUpdate;

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryDto {
    #[validate(length(min = 1, max = 50, message = "Category name must be 1-50 characters"))]
    pub name: String,

    #[validate(length(max = 200, message = "Description must be max 200 characters"))]
    pub description: Option<String>,
}

#[derive(Validate, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryDto {
    #[validate(length(min = 1, max = 50, message = "Category name must be 1-50 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 200, message = "Description must be max 200 characters"))]
    pub description: Option<String>,

    pub is_active: Option<bool>,
}

impl From<UpdateCategoryDto> for CategoryUpdate {
    fn from(dto: UpdateCategoryDto) -> Self {
        CategoryUpdate {
            name: dto.name.map(|n| n.trim().to_string()),
            description: dto.description,
            is_active: dto.is_active,
        }
    }
}
