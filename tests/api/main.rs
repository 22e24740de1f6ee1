mod health_check;
mod helpers;
mod order;
mod payment;
mod refund;
mod webhook;
