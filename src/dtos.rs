use serde::{Deserialize, Serialize};

use crate::utils::pagination::Page;

pub mod categorydtos;
pub mod jobdtos;
pub mod labourdtos;
pub mod paymentdtos;
pub mod ratingdtos;
pub mod userdtos;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub status: String,
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> From<Page<T>> for PaginatedResponse<T> {
    fn from(page: Page<T>) -> Self {
        let total_pages = page.total_pages();
        Self {
            status: "success".to_string(),
            data: page.items,
            total: page.total,
            page: page.request.page,
            limit: page.request.limit,
            total_pages,
        }
    }
}
