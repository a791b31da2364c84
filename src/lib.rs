pub mod config;
pub mod domain {
    pub mod lenient;
    pub mod mpesa;
    pub mod phone;
    pub mod ticket;
}
pub mod error;
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod mpesa;
        pub mod ops;
        pub mod payments;
        pub mod tickets;
        pub mod verification_sessions;
    }
    pub mod routes;
}
pub mod repo {
    pub mod catalogue_repo;
    pub mod json_file;
    pub mod tickets_repo;
}
pub mod service {
    pub mod catalogue_cache;
    pub mod payment_reconciler;
    pub mod purchase_service;
    pub mod retry_orchestrator;
    pub mod stk_service;
    pub mod verification_service;
}

use config::AppConfig;
use gateways::daraja::DarajaGateway;
use gateways::simulated::SimulatedGateway;
use gateways::MpesaGateway;
use repo::catalogue_repo::CatalogueRepo;
use repo::tickets_repo::TicketsRepo;
use service::catalogue_cache::CatalogueCache;
use service::payment_reconciler::PaymentReconciler;
use service::purchase_service::PurchaseService;
use service::retry_orchestrator::{PollPolicy, RetryPolicy};
use service::stk_service::StkService;
use service::verification_service::{VerificationService, VerificationSessions};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub purchase_service: PurchaseService,
    pub stk_service: StkService,
    pub verification_service: VerificationService,
    pub verification_sessions: VerificationSessions,
    pub payment_reconciler: PaymentReconciler,
    pub tickets_repo: TicketsRepo,
    pub catalogue_cache: CatalogueCache,
    pub simulation: bool,
}

impl AppState {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let gateway: Arc<dyn MpesaGateway> = match &cfg.credentials {
            Some(creds) => Arc::new(DarajaGateway::new(
                &cfg.mpesa_base_url,
                creds,
                &cfg.callback_url,
                cfg.gateway_timeout,
            )),
            None => Arc::new(SimulatedGateway),
        };
        Self::with_gateway(cfg, gateway)
    }

    pub fn with_gateway(cfg: &AppConfig, gateway: Arc<dyn MpesaGateway>) -> Self {
        let tickets_repo = TicketsRepo::new(cfg.tickets_file());
        let verification_service = VerificationService {
            gateway: gateway.clone(),
            tickets_repo: tickets_repo.clone(),
        };

        Self {
            purchase_service: PurchaseService {
                tickets_repo: tickets_repo.clone(),
            },
            stk_service: StkService {
                gateway: gateway.clone(),
                tickets_repo: tickets_repo.clone(),
                retry: RetryPolicy {
                    max_attempts: cfg.stk_max_attempts,
                    delay: cfg.stk_retry_delay,
                },
            },
            verification_sessions: VerificationSessions::new(
                verification_service.clone(),
                PollPolicy {
                    max_retries: cfg.verify_max_retries,
                    delay: cfg.verify_retry_delay,
                },
            ),
            payment_reconciler: PaymentReconciler {
                verification_service: verification_service.clone(),
                interval: cfg.reconcile_interval,
            },
            verification_service,
            catalogue_cache: CatalogueCache::new(
                CatalogueRepo {
                    path: cfg.payments_file.clone(),
                },
                cfg.catalogue_cache_ttl,
            ),
            simulation: gateway.is_simulated(),
            tickets_repo,
        }
    }
}
