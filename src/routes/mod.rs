pub mod order;
pub mod payment;
mod route;
pub mod util;

pub use order::order_route;
pub use payment::payment_route;
pub use route::main_route;
pub use util::util_route;
