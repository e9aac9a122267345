use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockPaymentDto {
    pub job_id: Uuid,

    #[validate(range(min = 0.0, message = "Amount must be positive"))]
    pub amount: f64,

    #[validate(length(min = 1, max = 50, message = "Payment method must be 1-50 characters"))]
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceiptDto {
    pub transaction_id: String,
    pub job_id: Uuid,
    pub amount: f64,
    pub payment_method: String,
    pub processed_at: DateTime<Utc>,
}
