use crate::repo::json_file::StoreError;
use crate::service::verification_service::VerificationService;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub settled: usize,
    pub failed_checks: usize,
}

#[derive(Clone)]
pub struct PaymentReconciler {
    pub verification_service: VerificationService,
    pub interval: Duration,
}

impl PaymentReconciler {
    pub async fn run(self) {
        loop {
            tokio::time::sleep(self.interval).await;
            match self.tick().await {
                Ok(report) if report.checked > 0 => {
                    tracing::info!(
                        checked = report.checked,
                        settled = report.settled,
                        failed_checks = report.failed_checks,
                        "reconciliation sweep finished"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!("reconciliation sweep failed: {}", e),
            }
        }
    }

    pub async fn tick(&self) -> Result<SweepReport, StoreError> {
        let due = self
            .verification_service
            .tickets_repo
            .find_awaiting_verification()
            .await?;

        let mut report = SweepReport::default();
        for ticket in due {
            let Some(checkout_id) = ticket.checkout_request_id.as_deref() else {
                continue;
            };
            report.checked += 1;
            match self.verification_service.verify_once(checkout_id).await {
                Ok((_, rec)) => {
                    if !rec.tickets.is_empty() {
                        report.settled += 1;
                    }
                    tracing::debug!(ticket_id = %ticket.id, checkout_id, outcome = ?rec.outcome, "checked");
                }
                Err(e) => {
                    report.failed_checks += 1;
                    tracing::warn!(ticket_id = %ticket.id, checkout_id, "status check failed: {}", e);
                }
            }
        }
        Ok(report)
    }
}
