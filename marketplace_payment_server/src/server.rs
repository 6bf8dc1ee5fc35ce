use std::sync::Arc;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use log::*;
use marketplace_payment_engine::{
    db_types::GatewayKind,
    events::{EventHandlers, EventHooks, EventProducers},
    gateway::{MockProvider, PaymentProvider, RazorpayProvider},
    PaymentFlowApi,
    PayoutApi,
    SqliteDatabase,
    WebhookApi,
};

use crate::{
    config::{GatewayConfig, ServerConfig, ServerOptions},
    errors::ServerError,
    middleware::HmacMiddlewareFactory,
    routes::{
        health,
        CreatePaymentRoute,
        GatewayWebhookRoute,
        PaymentAnalyticsRoute,
        PaymentByOrderRoute,
        PayoutByIdRoute,
        RefundPaymentRoute,
        RequestPayoutRoute,
        SellerBalanceRoute,
        SellerEarningsRoute,
        SellerPayoutsRoute,
        VerifyPaymentRoute,
    },
    workers::{start_escrow_worker, start_payout_worker},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let provider = build_provider(&config.gateway);
    let handlers = EventHandlers::new(16, logging_hooks());
    let producers = handlers.producers();
    handlers.start();
    start_escrow_worker(db.clone(), config.escrow_scan_interval);
    start_payout_worker(db.clone(), provider.clone(), producers.clone(), config.payout_process_interval);
    let srv = create_server_instance(config, db, provider, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    provider: Arc<dyn PaymentProvider>,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let payments_api = PaymentFlowApi::new(db.clone(), provider.clone(), producers.clone(), config.settlement);
        let payouts_api = PayoutApi::new(db.clone(), provider.clone(), producers.clone());
        let webhook_api = WebhookApi::new(db.clone(), provider.clone(), producers.clone(), config.settlement);
        let options = ServerOptions::from_config(&config);
        let hmac = HmacMiddlewareFactory::new(
            &config.webhook.header,
            config.webhook.secret.clone(),
            config.webhook.checks,
        );
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mps::access_log"))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(payouts_api))
            .app_data(web::Data::new(webhook_api))
            .app_data(web::Data::new(options))
            .service(health)
            .service(CreatePaymentRoute::<SqliteDatabase>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase>::new())
            .service(PaymentAnalyticsRoute::<SqliteDatabase>::new())
            .service(PaymentByOrderRoute::<SqliteDatabase>::new())
            .service(RefundPaymentRoute::<SqliteDatabase>::new())
            .service(SellerBalanceRoute::<SqliteDatabase>::new())
            .service(SellerEarningsRoute::<SqliteDatabase>::new())
            .service(SellerPayoutsRoute::<SqliteDatabase>::new())
            .service(RequestPayoutRoute::<SqliteDatabase>::new())
            .service(PayoutByIdRoute::<SqliteDatabase>::new())
            .service(web::scope("/webhook").wrap(hmac).service(GatewayWebhookRoute::<SqliteDatabase>::new()))
    })
    .bind((host.as_str(), port))?;
    info!("🚀️ Server bound to {host}:{port}");
    Ok(srv.run())
}

fn build_provider(config: &GatewayConfig) -> Arc<dyn PaymentProvider> {
    match config.kind {
        GatewayKind::Mock => {
            info!("🚀️ Using the deterministic mock payment provider");
            Arc::new(MockProvider::new(config.key_secret.clone()))
        },
        GatewayKind::Razorpay => {
            info!("🚀️ Using the Razorpay provider at {}", config.base_url);
            Arc::new(RazorpayProvider::new(
                &config.base_url,
                &config.key_id,
                config.key_secret.clone(),
                config.timeout,
            ))
        },
    }
}

/// Default hooks: settlement milestones land in the application log. Embedders with richer needs
/// (mail, dashboards) replace these.
fn logging_hooks() -> EventHooks {
    EventHooks::default()
        .on_payment_captured(|ev| async move {
            info!(
                "📣️ Payment {} captured: {} split over {} item(s)",
                ev.payment.id,
                ev.payment.amount,
                ev.splits.len()
            );
        })
        .on_payout_completed(|ev| async move {
            info!("📣️ Payout {} to seller {} completed ({})", ev.payout.payout_ref, ev.payout.seller_id, ev.payout.amount);
        })
        .on_payout_failed(|ev| async move {
            warn!("📣️ Payout {} to seller {} failed: {}", ev.payout.payout_ref, ev.payout.seller_id, ev.reason);
        })
}
