//! HMAC middleware for the webhook endpoint.
//!
//! The gateway signs the raw body of every webhook call with the shared webhook secret and puts
//! the hex HMAC-SHA256 in a request header. This middleware recomputes the signature over the raw
//! bytes before any JSON parsing happens and rejects the request outright on a mismatch, so no
//! forged event ever reaches the reconciler.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorForbidden},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use mpg_common::Secret;

use crate::helpers::calculate_hmac;

pub struct HmacMiddlewareFactory {
    signature_header: String,
    secret: Secret<String>,
    // When false, signature checks are skipped and every call is allowed through.
    enabled: bool,
}

impl HmacMiddlewareFactory {
    pub fn new(signature_header: &str, secret: Secret<String>, enabled: bool) -> Self {
        HmacMiddlewareFactory { signature_header: signature_header.to_lowercase(), secret, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService {
            signature_header: self.signature_header.clone(),
            secret: self.secret.clone(),
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct HmacMiddlewareService<S> {
    signature_header: String,
    secret: Secret<String>,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.reveal().clone();
        let signature_header = self.signature_header.clone();
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature");
            if !enabled {
                trace!("🔐️ Webhook signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract webhook body: {e:?}");
                ErrorBadRequest("Failed to extract request body.")
            })?;
            let expected = calculate_hmac(&secret, body.as_ref());
            let provided = req.headers().get(&signature_header).ok_or_else(|| {
                warn!("🔐️ No webhook signature header present. Denying access.");
                ErrorForbidden("No webhook signature found.")
            })?;
            if provided == expected.as_str() {
                trace!("🔐️ Webhook signature check ✅️");
                // The body was consumed by the signature check; put it back for the handler.
                req.set_payload(bytes_to_payload(body));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid webhook signature. Denying access and dropping the event.");
                Err(ErrorForbidden("Invalid webhook signature."))
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
