pub mod commands;
pub mod configuration;
pub mod constants;
pub mod database;
pub mod domain;
pub mod email_client;
pub mod errors;
pub mod middleware;
pub mod openapi;
pub mod order_store;
pub mod payment_client;
pub mod routes;
pub mod schemas;
pub mod startup;
pub mod telemetry;
pub mod utils;
