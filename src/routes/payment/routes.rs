use actix_web::web;

use super::handlers::{create_payment_intent, payment_intent_status, payment_webhook, refund_payment};

pub fn payment_route(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/create-intent").route(web::post().to(create_payment_intent)))
        .service(web::resource("/refund").route(web::post().to(refund_payment)))
        .service(web::resource("/webhook").route(web::post().to(payment_webhook)))
        .service(
            web::resource("/{payment_intent_id}").route(web::get().to(payment_intent_status)),
        );
}
