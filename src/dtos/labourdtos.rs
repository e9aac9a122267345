use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{
        labourmodel::{City, LabourWithUser},
        ratingmodel::{RatingWithNames, RecentComment},
    },
    utils::{pagination::PageRequest, phone::format_phone_display},
};

#[derive(Validate, Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabourListQueryDto {
    pub category: Option<Uuid>,
    pub city: Option<City>,

    #[validate(range(min = 1, message = "Page must be positive integer"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 50, message = "Limit must be 1-50"))]
    pub limit: Option<u32>,
}

impl LabourListQueryDto {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecisionDto {
    pub is_approved: bool,
}

/// Listing entry: public profile plus the newest commented ratings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LabourCardDto {
    #[serde(flatten)]
    pub labour: LabourWithUser,
    pub recent_ratings: Vec<RecentComment>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LabourProfileDto {
    #[serde(flatten)]
    pub labour: LabourWithUser,
    pub recent_ratings: Vec<RatingWithNames>,
}

/// Phone numbers leave the API in `+91` display form.
pub fn display_labour(mut labour: LabourWithUser) -> LabourWithUser {
    labour.phone = labour.phone.as_deref().map(format_phone_display);
    labour
}
