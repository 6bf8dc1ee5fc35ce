//! In-process endpoint tests against a throwaway SQLite database and the mock provider.

use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use marketplace_payment_engine::{
    events::EventProducers,
    gateway::{MockProvider, PaymentProvider},
    test_utils::random_db_path,
    SettlementConfig,
    SqliteDatabase,
    WebhookApi,
};
use mpg_common::Secret;

use crate::{
    data_objects::JsonResponse,
    helpers::calculate_hmac,
    middleware::HmacMiddlewareFactory,
    routes::{health, GatewayWebhookRoute},
};

const WEBHOOK_SECRET: &str = "whsec_test";
const SIGNATURE_HEADER: &str = "x-gateway-signature";

async fn test_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    SqliteDatabase::new_with_url(&random_db_path(), 1).await.expect("Error creating test database")
}

fn webhook_api(db: SqliteDatabase) -> WebhookApi<SqliteDatabase> {
    let provider: Arc<dyn PaymentProvider> = Arc::new(MockProvider::new(Secret::new("gw_secret".to_string())));
    WebhookApi::new(db, provider, EventProducers::default(), SettlementConfig::default())
}

macro_rules! webhook_app {
    ($db:expr, $checks:expr) => {
        test::init_service(
            App::new().app_data(web::Data::new(webhook_api($db))).service(health).service(
                web::scope("/webhook")
                    .wrap(HmacMiddlewareFactory::new(
                        SIGNATURE_HEADER,
                        Secret::new(WEBHOOK_SECRET.to_string()),
                        $checks,
                    ))
                    .service(GatewayWebhookRoute::<SqliteDatabase>::new()),
            ),
        )
        .await
    };
}

#[actix_web::test]
async fn health_endpoint_responds() {
    let app = webhook_app!(test_db().await, true);
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn webhook_without_signature_is_rejected() {
    let app = webhook_app!(test_db().await, true);
    let body = serde_json::json!({"event": "payment.captured", "payload": {}}).to_string();
    let req = test::TestRequest::post()
        .uri("/webhook/gateway")
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .to_request();
    let resp = match test::try_call_service(&app, req).await {
        Ok(resp) => resp.status(),
        Err(err) => err.error_response().status(),
    };
    assert_eq!(resp, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn webhook_with_wrong_signature_is_rejected() {
    let app = webhook_app!(test_db().await, true);
    let body = serde_json::json!({"event": "payment.captured", "payload": {}}).to_string();
    let req = test::TestRequest::post()
        .uri("/webhook/gateway")
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, calculate_hmac("wrong_secret", body.as_bytes())))
        .set_payload(body)
        .to_request();
    let resp = match test::try_call_service(&app, req).await {
        Ok(resp) => resp.status(),
        Err(err) => err.error_response().status(),
    };
    assert_eq!(resp, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn signed_unknown_event_is_acknowledged() {
    let app = webhook_app!(test_db().await, true);
    let body = serde_json::json!({"event": "settlement.weekly", "payload": {}}).to_string();
    let req = test::TestRequest::post()
        .uri("/webhook/gateway")
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, calculate_hmac(WEBHOOK_SECRET, body.as_bytes())))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let ack: JsonResponse = test::read_body_json(resp).await;
    assert!(ack.success);
}

#[actix_web::test]
async fn tampered_body_fails_the_signature_check() {
    let app = webhook_app!(test_db().await, true);
    let signed = serde_json::json!({"event": "payment.captured", "payload": {}}).to_string();
    let tampered = serde_json::json!({"event": "payout.processed", "payload": {}}).to_string();
    let req = test::TestRequest::post()
        .uri("/webhook/gateway")
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, calculate_hmac(WEBHOOK_SECRET, signed.as_bytes())))
        .set_payload(tampered)
        .to_request();
    let resp = match test::try_call_service(&app, req).await {
        Ok(resp) => resp.status(),
        Err(err) => err.error_response().status(),
    };
    assert_eq!(resp, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn disabled_checks_allow_unsigned_events() {
    let app = webhook_app!(test_db().await, false);
    let body = serde_json::json!({"event": "settlement.weekly", "payload": {}}).to_string();
    let req = test::TestRequest::post()
        .uri("/webhook/gateway")
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
