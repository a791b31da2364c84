use crate::domain::mpesa::QueryOutcome;
use crate::domain::ticket::Ticket;
use crate::error::AppError;
use crate::gateways::MpesaGateway;
use crate::repo::json_file::StoreError;
use crate::repo::tickets_repo::TicketsRepo;
use crate::service::retry_orchestrator::{next_poll_step, PollDirective, PollPolicy};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

const MAX_TRACKED_SESSIONS: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub outcome: QueryOutcome,
    pub tickets: Vec<Ticket>,
}

#[derive(Clone)]
pub struct VerificationService {
    pub gateway: Arc<dyn MpesaGateway>,
    pub tickets_repo: TicketsRepo,
}

impl VerificationService {
    pub async fn verify_once(&self, checkout_request_id: &str) -> Result<(Value, Reconciliation), AppError> {
        tracing::info!(checkout_id = checkout_request_id, "querying M-PESA payment status");
        let resp = self.gateway.stk_query(checkout_request_id).await?;
        let outcome = QueryOutcome::classify(&resp);
        let tickets = self.reconcile(checkout_request_id, &outcome).await?;
        Ok((resp, Reconciliation { outcome, tickets }))
    }

    pub async fn reconcile(
        &self,
        checkout_request_id: &str,
        outcome: &QueryOutcome,
    ) -> Result<Vec<Ticket>, StoreError> {
        match outcome {
            QueryOutcome::Succeeded { receipt } => {
                let receipt = receipt.as_deref().unwrap_or(checkout_request_id);
                let paid = self
                    .tickets_repo
                    .mark_paid(checkout_request_id, receipt, chrono::Utc::now())
                    .await?;
                if paid.is_empty() {
                    tracing::info!(checkout_id = checkout_request_id, "payment confirmed; no ticket left to update");
                } else {
                    tracing::info!(checkout_id = checkout_request_id, receipt, "payment verified and ticket marked PAID");
                }
                Ok(paid)
            }
            QueryOutcome::ProviderFailed { code, description } => {
                let failed = self
                    .tickets_repo
                    .mark_failed(checkout_request_id, description)
                    .await?;
                tracing::warn!(
                    checkout_id = checkout_request_id,
                    code,
                    tickets = failed.len(),
                    "provider reported payment failure: {}",
                    description
                );
                Ok(failed)
            }
            QueryOutcome::Pending => Ok(Vec::new()),
        }
    }

    pub async fn poll(
        &self,
        checkout_request_id: &str,
        policy: PollPolicy,
        mut cancel: watch::Receiver<bool>,
        progress: &watch::Sender<VerificationProgress>,
    ) -> VerificationProgress {
        let mut retries = 0;
        loop {
            if *cancel.borrow() {
                return publish(progress, VerificationProgress::Cancelled);
            }

            progress.send_replace(VerificationProgress::Checking { attempt: retries + 1 });
            let checked = match self.verify_once(checkout_request_id).await {
                Ok((_, reconciliation)) => Some(reconciliation),
                Err(e) => {
                    tracing::warn!(checkout_id = checkout_request_id, retries, "verification check failed: {}", e);
                    None
                }
            };

            if let Some(done) = checked.as_ref().and_then(terminal_progress) {
                return publish(progress, done);
            }

            let PollDirective::RetryAfter(delay) =
                next_poll_step(checked.as_ref().map(|r| &r.outcome), retries, &policy)
            else {
                tracing::warn!(
                    checkout_id = checkout_request_id,
                    retries,
                    "payment verification timed out; manual reconciliation required"
                );
                return publish(progress, VerificationProgress::TimedOut { retries });
            };

            retries += 1;
            progress.send_replace(VerificationProgress::Pending {
                retries,
                max_retries: policy.max_retries,
            });

            let cancelled = tokio::select! {
                _ = tokio::time::sleep(delay) => false,
                _ = cancel.changed() => true,
            };
            if cancelled {
                return publish(progress, VerificationProgress::Cancelled);
            }
        }
    }
}

fn terminal_progress(r: &Reconciliation) -> Option<VerificationProgress> {
    match &r.outcome {
        QueryOutcome::Succeeded { receipt } => Some(VerificationProgress::Succeeded {
            receipt: receipt.clone(),
            tickets: r.tickets.iter().map(|t| t.id).collect(),
        }),
        QueryOutcome::ProviderFailed { code, description } => Some(VerificationProgress::ProviderFailed {
            code: *code,
            description: description.clone(),
        }),
        QueryOutcome::Pending => None,
    }
}

fn publish(
    progress: &watch::Sender<VerificationProgress>,
    state: VerificationProgress,
) -> VerificationProgress {
    progress.send_replace(state.clone());
    state
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationProgress {
    Checking { attempt: u32 },
    Pending { retries: u32, max_retries: u32 },
    Succeeded { receipt: Option<String>, tickets: Vec<Uuid> },
    ProviderFailed { code: i64, description: String },
    TimedOut { retries: u32 },
    Cancelled,
}

impl VerificationProgress {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            VerificationProgress::Checking { .. } | VerificationProgress::Pending { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub checkout_request_id: String,
    pub progress: VerificationProgress,
}

struct SessionHandle {
    checkout_request_id: String,
    progress: watch::Receiver<VerificationProgress>,
    cancel: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct VerificationSessions {
    pub service: VerificationService,
    pub policy: PollPolicy,
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl VerificationSessions {
    pub fn new(service: VerificationService, policy: PollPolicy) -> Self {
        Self {
            service,
            policy,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn start(&self, checkout_request_id: String) -> Uuid {
        let session_id = Uuid::new_v4();
        let (progress_tx, progress_rx) = watch::channel(VerificationProgress::Checking { attempt: 0 });
        let (cancel_tx, cancel_rx) = watch::channel(false);

        {
            let mut sessions = self.sessions.write().await;
            if sessions.len() >= MAX_TRACKED_SESSIONS {
                sessions.retain(|_, s| !s.progress.borrow().is_terminal());
            }
            sessions.insert(
                session_id,
                SessionHandle {
                    checkout_request_id: checkout_request_id.clone(),
                    progress: progress_rx,
                    cancel: cancel_tx,
                },
            );
        }

        let service = self.service.clone();
        let policy = self.policy;
        tokio::spawn(async move {
            let outcome = service
                .poll(&checkout_request_id, policy, cancel_rx, &progress_tx)
                .await;
            tracing::info!(%session_id, checkout_id = %checkout_request_id, ?outcome, "verification session finished");
        });

        session_id
    }

    pub async fn status(&self, session_id: Uuid) -> Option<SessionStatus> {
        let sessions = self.sessions.read().await;
        sessions.get(&session_id).map(|s| SessionStatus {
            session_id,
            checkout_request_id: s.checkout_request_id.clone(),
            progress: s.progress.borrow().clone(),
        })
    }

    pub async fn cancel(&self, session_id: Uuid) -> bool {
        let sessions = self.sessions.read().await;
        match sessions.get(&session_id) {
            Some(s) => {
                s.cancel.send_replace(true);
                true
            }
            None => false,
        }
    }

    pub async fn wait(&self, session_id: Uuid) -> Option<VerificationProgress> {
        let mut rx = {
            let sessions = self.sessions.read().await;
            sessions.get(&session_id)?.progress.clone()
        };

        loop {
            let current = rx.borrow_and_update().clone();
            if current.is_terminal() {
                return Some(current);
            }
            if rx.changed().await.is_err() {
                return Some(rx.borrow().clone());
            }
        }
    }
}
