pub(crate) mod errors;
pub mod handlers;
pub(crate) mod models;
mod routes;
pub mod schemas;
pub mod utils;
pub use routes::order_route;
