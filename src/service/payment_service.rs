use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::MarketStore,
    dtos::paymentdtos::{MockPaymentDto, PaymentReceiptDto},
    models::jobmodel::JobStatus,
    service::error::ServiceError,
};

const AMOUNT_TOLERANCE: f64 = 0.01;

/// Simulated settlement: validates the amount against the job snapshot and
/// records the event. It never moves the job; the assigned labour confirms
/// payment through the lifecycle.
#[derive(Debug, Clone)]
pub struct PaymentService {
    db_client: Arc<dyn MarketStore>,
}

impl PaymentService {
    pub fn new(db_client: Arc<dyn MarketStore>) -> Self {
        Self { db_client }
    }

    pub async fn mock_pay(
        &self,
        payer_id: Uuid,
        body: MockPaymentDto,
    ) -> Result<PaymentReceiptDto, ServiceError> {
        let job = self
            .db_client
            .get_job(body.job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(body.job_id))?;

        if job.status != JobStatus::AwaitingCompletion {
            return Err(ServiceError::InvalidJobStatus {
                job_id: job.id,
                expected: JobStatus::AwaitingCompletion,
                actual: job.status,
            });
        }

        let expected = job.settlement_amount();
        if (body.amount - expected).abs() > AMOUNT_TOLERANCE {
            return Err(ServiceError::AmountMismatch {
                expected,
                received: body.amount,
            });
        }

        let receipt = PaymentReceiptDto {
            transaction_id: format!("MOCK_{}", Uuid::new_v4().simple()),
            job_id: job.id,
            amount: expected,
            payment_method: body.payment_method.unwrap_or_else(|| "mock".to_string()),
            processed_at: Utc::now(),
        };

        tracing::info!(
            "💰 Settlement recorded: {} paid ₹{:.2} for job {} via {} ({})",
            payer_id,
            receipt.amount,
            job.id,
            receipt.payment_method,
            receipt.transaction_id
        );

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{memory::MemoryStore, JobExt},
        error::ErrorKind,
        test_support::{app_state, job_at},
    };

    fn pay(job_id: Uuid, amount: f64) -> MockPaymentDto {
        MockPaymentDto {
            job_id,
            amount,
            payment_method: Some("upi".into()),
        }
    }

    #[tokio::test]
    async fn settles_the_snapshot_amount_without_moving_the_job() {
        let store = Arc::new(MemoryStore::new());
        let state = app_state(store.clone());
        let fixture = job_at(&state, &store, JobStatus::AwaitingCompletion).await;

        let receipt = state
            .payment_service
            .mock_pay(fixture.client.id, pay(fixture.job.id, 300.0))
            .await
            .unwrap();
        assert_eq!(receipt.amount, 300.0);
        assert!(receipt.transaction_id.starts_with("MOCK_"));
        assert_eq!(receipt.payment_method, "upi");

        let job = store.get_job(fixture.job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::AwaitingCompletion);
    }

    #[tokio::test]
    async fn wrong_amount_reports_the_expected_one() {
        let store = Arc::new(MemoryStore::new());
        let state = app_state(store.clone());
        let fixture = job_at(&state, &store, JobStatus::AwaitingCompletion).await;

        let err = state
            .payment_service
            .mock_pay(fixture.client.id, pay(fixture.job.id, 250.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::AmountMismatch { expected, .. } if expected == 300.0
        ));
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn only_jobs_awaiting_completion_can_be_paid() {
        let store = Arc::new(MemoryStore::new());
        let state = app_state(store.clone());
        let fixture = job_at(&state, &store, JobStatus::InProgress).await;

        let err = state
            .payment_service
            .mock_pay(fixture.client.id, pay(fixture.job.id, 300.0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        let err = state
            .payment_service
            .mock_pay(fixture.client.id, pay(Uuid::new_v4(), 300.0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
