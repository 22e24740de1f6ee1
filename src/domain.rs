mod email_object;
pub use email_object::EmailObject;
