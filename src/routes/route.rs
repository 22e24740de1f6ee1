use crate::openapi::ApiDoc;
use crate::routes::{order_route, payment_route, util_route};
use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn main_route(cfg: &mut web::ServiceConfig) {
    let openapi = ApiDoc::openapi();
    cfg.service(web::scope("/api/payment").configure(payment_route))
        .service(web::scope("/api/orders").configure(order_route))
        .service(web::scope("/api/util").configure(util_route))
        .service(SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", openapi));
}
