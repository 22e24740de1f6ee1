use actix_web::web;
use utoipa::TupleUnit;

use super::schemas::{
    CodOrderRequest, Order, OrderDetail, OrderStatusUpdateData, OrderStatusUpdateRequest,
};
use super::utils::{
    change_order_status, fetch_order_detail, fetch_user_order_list, place_cod_order,
    resend_order_status_email,
};
use crate::email_client::GenericEmailService;
use crate::errors::GenericError;
use crate::order_store::OrderStore;
use crate::schemas::GenericResponse;

#[utoipa::path(
    post,
    path = "/api/orders/cod",
    tag = "Order",
    description = "Places a cash-on-delivery order. The order is permanent immediately with payment pending.",
    summary = "Cash On Delivery Order Request",
    request_body(content = CodOrderRequest, description = "Request Body"),
    responses(
        (status=200, description= "Order placed", body= GenericResponse<Order>),
        (status=400, description= "Invalid Request body", body= GenericResponse<TupleUnit>),
        (status=500, description= "Internal Server Error", body= GenericResponse<TupleUnit>),
    )
)]
#[tracing::instrument(name = "cod order", skip(store), fields(user_id = ?body.user_id))]
pub async fn cod_order(
    body: CodOrderRequest,
    store: web::Data<dyn OrderStore>,
) -> Result<web::Json<GenericResponse<Order>>, GenericError> {
    let order = place_cod_order(&store.into_inner(), body).await?;
    Ok(web::Json(GenericResponse::success(
        "Successfully placed order",
        Some(order),
    )))
}

#[utoipa::path(
    get,
    path = "/api/orders/{order_id}",
    tag = "Order",
    description = "Fetches a permanent order together with its payment and refund records.",
    summary = "Order Detail Request",
    params(
        ("order_id" = String, Path, description = "Order id")
    ),
    responses(
        (status=200, description= "Order detail", body= GenericResponse<OrderDetail>),
        (status=404, description= "Order not found", body= GenericResponse<TupleUnit>),
        (status=500, description= "Internal Server Error", body= GenericResponse<TupleUnit>),
    )
)]
#[tracing::instrument(name = "order detail", skip(store))]
pub async fn order_detail(
    path: web::Path<String>,
    store: web::Data<dyn OrderStore>,
) -> Result<web::Json<GenericResponse<OrderDetail>>, GenericError> {
    let order_id = path.into_inner();
    let detail = fetch_order_detail(&**store, &order_id).await?;
    Ok(web::Json(GenericResponse::success(
        "Successfully fetched order",
        Some(detail),
    )))
}

#[utoipa::path(
    get,
    path = "/api/orders/user/{user_id}",
    tag = "Order",
    description = "Lists a user's permanent orders, newest first.",
    summary = "User Order List Request",
    params(
        ("user_id" = String, Path, description = "User id")
    ),
    responses(
        (status=200, description= "Order list", body= GenericResponse<Vec<Order>>),
        (status=500, description= "Internal Server Error", body= GenericResponse<TupleUnit>),
    )
)]
#[tracing::instrument(name = "user order list", skip(store))]
pub async fn user_order_list(
    path: web::Path<String>,
    store: web::Data<dyn OrderStore>,
) -> Result<web::Json<GenericResponse<Vec<Order>>>, GenericError> {
    let user_id = path.into_inner();
    let orders = fetch_user_order_list(&**store, &user_id).await?;
    Ok(web::Json(GenericResponse::success(
        "Successfully fetched orders",
        Some(orders),
    )))
}

#[utoipa::path(
    put,
    path = "/api/orders/{order_id}/status",
    tag = "Order",
    description = "Changes the fulfilment status of an order and optionally e-mails the customer.",
    summary = "Order Status Update Request",
    params(
        ("order_id" = String, Path, description = "Order id")
    ),
    request_body(content = OrderStatusUpdateRequest, description = "Request Body"),
    responses(
        (status=200, description= "Order status updated", body= GenericResponse<OrderStatusUpdateData>),
        (status=400, description= "Invalid Request body", body= GenericResponse<TupleUnit>),
        (status=404, description= "Order not found", body= GenericResponse<TupleUnit>),
        (status=500, description= "Internal Server Error", body= GenericResponse<TupleUnit>),
    )
)]
#[tracing::instrument(name = "order status update", skip(store, email_client))]
pub async fn order_status_update(
    path: web::Path<String>,
    body: OrderStatusUpdateRequest,
    store: web::Data<dyn OrderStore>,
    email_client: web::Data<dyn GenericEmailService>,
) -> Result<web::Json<GenericResponse<OrderStatusUpdateData>>, GenericError> {
    let order_id = path.into_inner();
    let data = change_order_status(&**store, &**email_client, &order_id, body).await?;
    Ok(web::Json(GenericResponse::success(
        "Successfully updated order status",
        Some(data),
    )))
}

#[utoipa::path(
    post,
    path = "/api/orders/{order_id}/status-email",
    tag = "Order",
    description = "Sends the e-mail matching the order's current fulfilment status.",
    summary = "Order Status Email Request",
    params(
        ("order_id" = String, Path, description = "Order id")
    ),
    responses(
        (status=200, description= "Email sent", body= GenericResponse<TupleUnit>),
        (status=400, description= "Order has no customer email", body= GenericResponse<TupleUnit>),
        (status=404, description= "Order not found", body= GenericResponse<TupleUnit>),
        (status=502, description= "Email delivery failed", body= GenericResponse<TupleUnit>),
    )
)]
#[tracing::instrument(name = "order status email", skip(store, email_client))]
pub async fn order_status_email(
    path: web::Path<String>,
    store: web::Data<dyn OrderStore>,
    email_client: web::Data<dyn GenericEmailService>,
) -> Result<web::Json<GenericResponse<()>>, GenericError> {
    let order_id = path.into_inner();
    resend_order_status_email(&**store, &**email_client, &order_id).await?;
    Ok(web::Json(GenericResponse::success(
        "Successfully sent order status email",
        Some(()),
    )))
}
