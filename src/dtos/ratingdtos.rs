use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    dtos::{jobdtos::LabourRatingSummaryDto, PaginatedResponse},
    models::ratingmodel::{RatingDistribution, RatingWithNames},
    utils::pagination::PageRequest,
};

#[derive(Validate, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingListQueryDto {
    #[validate(range(min = 1, message = "Page must be positive integer"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 50, message = "Limit must be 1-50"))]
    pub limit: Option<u32>,
}

impl RatingListQueryDto {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabourRatingsDto {
    pub labour: LabourRatingSummaryDto,
    pub ratings: PaginatedResponse<RatingWithNames>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingStatsDto {
    pub average_rating: f64,
    pub total_ratings: i64,
    pub distribution: RatingDistribution,
}
