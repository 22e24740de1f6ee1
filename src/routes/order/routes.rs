use actix_web::web;

use super::handlers::{
    cod_order, order_detail, order_status_email, order_status_update, user_order_list,
};

pub fn order_route(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/cod").route(web::post().to(cod_order)))
        .service(web::resource("/user/{user_id}").route(web::get().to(user_order_list)))
        .service(web::resource("/{order_id}/status").route(web::put().to(order_status_update)))
        .service(
            web::resource("/{order_id}/status-email").route(web::post().to(order_status_email)),
        )
        .service(web::resource("/{order_id}").route(web::get().to(order_detail)));
}
