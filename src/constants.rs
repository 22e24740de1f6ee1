pub const VAT_RATE: f64 = 0.05;
/// Largest pre-VAT amount in minor units a single order may carry.
pub const MAX_ORDER_AMOUNT: i64 = 99_999_999;
pub const DEFAULT_CURRENCY: &str = "aed";
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
pub const WEBHOOK_PATH: &str = "/api/payment/webhook";
pub const ORDER_ID_METADATA_KEY: &str = "orderId";
pub const USER_ID_METADATA_KEY: &str = "userId";
pub const CUSTOMER_EMAIL_METADATA_KEY: &str = "customerEmail";
pub const CUSTOMER_NAME_METADATA_KEY: &str = "customerName";
