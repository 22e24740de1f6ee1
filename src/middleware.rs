use std::future::{ready, Ready};
use std::rc::Rc;
use std::str;

use actix_web::body::{self, BoxBody, EitherBody, MessageBody};
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::web::BytesMut;
use actix_web::{Error, HttpMessage};
use futures::future::LocalBoxFuture;
use futures::StreamExt;
use tracing::instrument;

use crate::constants::WEBHOOK_PATH;
use crate::utils::bytes_to_payload;

/// Paths whose bodies are not logged. The webhook body must reach its handler untouched
/// and the docs serve static assets.
fn skip_body_logging(path: &str) -> bool {
    path == WEBHOOK_PATH || path.starts_with("/docs") || path.starts_with("/api-docs")
}

fn log_body(label: &'static str, bytes: &[u8]) {
    match str::from_utf8(bytes) {
        Ok(body_str) => match serde_json::from_str::<serde_json::Value>(body_str) {
            Ok(body_json) => tracing::info!(body = %body_json, "{}", label),
            Err(_) if body_str.is_empty() => {}
            Err(_) => tracing::info!("Non-JSON {}: {}", label, body_str),
        },
        Err(_) => tracing::error!("Failed to decode {} as UTF-8", label),
    }
}

// Middleware for saving the request and response into the tracing
pub struct ReadReqResMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ReadReqResMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    #[instrument(skip(self), name = "Request Response Payload", fields(path = %req.path()))]
    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let svc = Rc::clone(&self.service);
        if skip_body_logging(req.path()) {
            return Box::pin(async move {
                let res = svc.call(req).await?;
                Ok(res.map_into_left_body())
            });
        }

        Box::pin(async move {
            let mut request_body = BytesMut::new();
            let mut payload = req.take_payload();
            while let Some(chunk) = payload.next().await {
                request_body.extend_from_slice(&chunk?);
            }
            let request_body = request_body.freeze();
            log_body("HTTP Request", &request_body);
            req.set_payload(bytes_to_payload(request_body));

            let res = svc.call(req).await?;
            let (req, res) = res.into_parts();
            let (res, body) = res.into_parts();
            let body_bytes = body::to_bytes(body).await.map_err(|e| {
                let e: Box<dyn std::error::Error> = e.into();
                actix_web::error::ErrorInternalServerError(e.to_string())
            })?;
            log_body("HTTP Response", &body_bytes);
            let res = res.set_body(BoxBody::new(body_bytes));
            Ok(ServiceResponse::new(req, res).map_into_right_body())
        })
    }
}

pub struct SaveRequestResponse;

impl<S, B> Transform<S, ServiceRequest> for SaveRequestResponse
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ReadReqResMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ReadReqResMiddleware {
            service: Rc::new(service),
        }))
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{test as actix_test, web, App, HttpResponse};

    use super::{skip_body_logging, SaveRequestResponse};

    async fn echo(body: web::Bytes) -> HttpResponse {
        HttpResponse::Ok().body(body)
    }

    #[actix_web::test]
    async fn logged_request_body_still_reaches_the_handler() {
        let app = actix_test::init_service(
            App::new()
                .wrap(SaveRequestResponse)
                .route("/api/echo", web::post().to(echo))
                .route("/api/payment/webhook", web::post().to(echo)),
        )
        .await;

        for path in ["/api/echo", "/api/payment/webhook"] {
            let req = actix_test::TestRequest::post()
                .uri(path)
                .insert_header(("content-type", "application/json"))
                .set_payload(r#"{"amount":10000}"#)
                .to_request();
            let body = actix_test::call_and_read_body(&app, req).await;
            assert_eq!(body, web::Bytes::from_static(br#"{"amount":10000}"#));
        }
    }

    #[test]
    fn webhook_and_docs_bodies_are_not_logged() {
        assert!(skip_body_logging("/api/payment/webhook"));
        assert!(skip_body_logging("/docs/index.html"));
        assert!(skip_body_logging("/api-docs/openapi.json"));
        assert!(!skip_body_logging("/api/payment/create-intent"));
    }
}
