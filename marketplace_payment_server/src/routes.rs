//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers stay generic over the backend traits; actix cannot register generic handlers
//! directly, so the `route!` macro generates a small `HttpServiceFactory` per route that pins the
//! generics at registration time.

use std::str::FromStr;

use actix_web::{get, web, HttpResponse, Responder};
use chrono::{Duration, Utc};
use log::*;
use marketplace_payment_engine::{
    db_types::OrderId,
    traits::{PaymentGatewayDatabase, PayoutManagement, SellerVerification},
    GatewayEvent,
    PaymentFlowApi,
    PayoutApi,
    WebhookApi,
    WebhookError,
};
use mpg_common::Money;

use crate::{
    config::ServerOptions,
    data_objects::{
        AnalyticsQuery,
        BalanceResponse,
        CaptureResponse,
        CreatePaymentRequest,
        JsonResponse,
        PayoutRequestBody,
        RefundRequestBody,
        VerifyPaymentRequest,
    },
    errors::ServerError,
};

// Actix cannot handle generics in handlers, so the factory type is generated per route with the
// backend bounds baked in.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<B>(core::marker::PhantomData<fn() -> B>);}
        paste::paste! { impl<B> [<$name:camel Route>]<B> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> B>)
            }
        }}
        paste::paste! { impl<B> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B>
        where
            B: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------  Payments  ---------------------------------------------------

route!(create_payment => Post "/payments" impl PaymentGatewayDatabase);
pub async fn create_payment<B: PaymentGatewayDatabase>(
    body: web::Json<CreatePaymentRequest>,
    api: web::Data<PaymentFlowApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST payment for order {} ({} items)", request.order_id, request.items.len());
    let payment = api.create_payment(request.into_new_payment(options.gateway)).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(verify_payment => Post "/payments/verify" impl PaymentGatewayDatabase);
pub async fn verify_payment<B: PaymentGatewayDatabase>(
    body: web::Json<VerifyPaymentRequest>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST verify payment for gateway order {}", request.gateway_order_id);
    let outcome =
        api.verify_and_capture(&request.gateway_order_id, &request.gateway_payment_id, &request.signature).await?;
    let response = CaptureResponse {
        payment: outcome.payment,
        splits: outcome.splits,
        already_captured: outcome.already_captured,
    };
    Ok(HttpResponse::Ok().json(response))
}

route!(payment_by_order => Get "/payments/{order_id}" impl PaymentGatewayDatabase);
pub async fn payment_by_order<B: PaymentGatewayDatabase>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ GET payment for order {order_id}");
    let payment = api
        .payment_by_order_id(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No payment for order {order_id}")))?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(refund_payment => Post "/payments/{order_id}/refund" impl PaymentGatewayDatabase);
pub async fn refund_payment<B: PaymentGatewayDatabase>(
    path: web::Path<String>,
    body: web::Json<RefundRequestBody>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let request = body.into_inner();
    debug!("💻️ POST refund of {} for order {order_id}", Money::from(request.amount));
    let refund = api.initiate_refund(&order_id, Money::from(request.amount), request.reason).await?;
    Ok(HttpResponse::Ok().json(refund))
}

route!(payment_analytics => Get "/analytics/payments" impl PaymentGatewayDatabase);
pub async fn payment_analytics<B: PaymentGatewayDatabase>(
    query: web::Query<AnalyticsQuery>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query.from.unwrap_or_else(|| to - Duration::days(30));
    trace!("💻️ GET payment analytics from {from} to {to}");
    let report = api.analytics(from, to).await?;
    Ok(HttpResponse::Ok().json(report))
}

// ----------------------------------------------  Payouts  ----------------------------------------------------

route!(seller_balance => Get "/sellers/{seller_id}/balance" impl PayoutManagement, SellerVerification);
pub async fn seller_balance<B>(
    path: web::Path<String>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PayoutManagement + SellerVerification,
{
    let seller_id = path.into_inner();
    let available = api.pending_balance(&seller_id).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse { seller_id, available }))
}

route!(seller_earnings => Get "/sellers/{seller_id}/earnings" impl PayoutManagement, SellerVerification);
pub async fn seller_earnings<B>(
    path: web::Path<String>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PayoutManagement + SellerVerification,
{
    let seller_id = path.into_inner();
    let summary = api.earnings_summary(&seller_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(seller_payouts => Get "/sellers/{seller_id}/payouts" impl PayoutManagement, SellerVerification);
pub async fn seller_payouts<B>(
    path: web::Path<String>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PayoutManagement + SellerVerification,
{
    let seller_id = path.into_inner();
    let history = api.payout_history(&seller_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

route!(request_payout => Post "/sellers/{seller_id}/payouts" impl PayoutManagement, SellerVerification);
pub async fn request_payout<B>(
    path: web::Path<String>,
    body: web::Json<PayoutRequestBody>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PayoutManagement + SellerVerification,
{
    let seller_id = path.into_inner();
    let amount = Money::from(body.into_inner().amount);
    debug!("💻️ POST payout of {amount} for seller {seller_id}");
    let payout = api.request_payout(&seller_id, amount).await?;
    Ok(HttpResponse::Ok().json(payout))
}

route!(payout_by_id => Get "/payouts/{payout_id}" impl PayoutManagement, SellerVerification);
pub async fn payout_by_id<B>(
    path: web::Path<String>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PayoutManagement + SellerVerification,
{
    let raw = path.into_inner();
    let payout = match i64::from_str(&raw) {
        Ok(id) => api.payout_by_id(id).await?,
        // Anything non-numeric is treated as an internal payout reference.
        Err(_) => api.payout_by_ref(&raw).await?,
    };
    let payout = payout.ok_or_else(|| ServerError::NoRecordFound(format!("No payout {raw}")))?;
    Ok(HttpResponse::Ok().json(payout))
}

// ----------------------------------------------  Webhooks  ---------------------------------------------------

// Registered inside the HMAC-wrapped `/webhook` scope, so the path here is scope-relative.
route!(gateway_webhook => Post "/gateway" impl PaymentGatewayDatabase, PayoutManagement, SellerVerification);
pub async fn gateway_webhook<B>(
    body: web::Json<GatewayEvent>,
    api: web::Data<WebhookApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase + PayoutManagement + SellerVerification,
{
    let event = body.into_inner();
    trace!("💻️ Received gateway webhook event '{}'", event.event);
    // The HMAC middleware has already authenticated the raw body by the time we get here.
    let result = match api.process_event(event).await {
        Ok(outcome) => {
            trace!("💻️ Webhook event applied: {outcome:?}");
            JsonResponse::success("Event processed.")
        },
        // Events for records we do not know cannot be retried into existence; acknowledge them so
        // the gateway stops resending, but flag the mismatch for reconciliation.
        Err(WebhookError::UnknownPayment(id)) => {
            warn!("💻️ Webhook event references unknown gateway order {id}");
            JsonResponse::failure(format!("Unknown payment {id}"))
        },
        Err(WebhookError::UnknownPayout(reference)) => {
            warn!("💻️ Webhook event references unknown payout {reference}");
            JsonResponse::failure(format!("Unknown payout {reference}"))
        },
        Err(e @ WebhookError::MissingField(_)) => {
            warn!("💻️ Malformed webhook event: {e}");
            return Err(e.into());
        },
        Err(e) => {
            warn!("💻️ Webhook event processing failed: {e}");
            return Err(e.into());
        },
    };
    Ok(HttpResponse::Ok().json(result))
}
