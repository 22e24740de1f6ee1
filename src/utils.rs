use actix_web::dev::Payload;
use actix_web::error::PayloadError;
use actix_web::web::Bytes;
use futures::Stream;
use futures_util::stream;
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

/// Rebuilds a request payload from bytes that were already drained.
pub fn bytes_to_payload(body: Bytes) -> Payload {
    let single_part: Result<Bytes, PayloadError> = Ok(body);
    let in_memory_stream = stream::once(std::future::ready(single_part));
    let pinned_stream: Pin<Box<dyn Stream<Item = Result<Bytes, PayloadError>>>> =
        Box::pin(in_memory_stream);
    pinned_stream.into()
}

/// Flattens free-form JSON metadata into the string map the payment processor accepts.
pub fn stringify_metadata(metadata: &HashMap<String, Value>) -> HashMap<String, String> {
    metadata
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.to_owned(),
                other => other.to_string(),
            };
            (key.to_owned(), value)
        })
        .collect()
}

/// Formats a minor-unit amount as `AED 105.00`.
pub fn format_minor_amount(amount: i64, currency: &str) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let amount = amount.abs();
    format!(
        "{} {}{}.{:02}",
        currency.to_uppercase(),
        sign,
        amount / 100,
        amount % 100
    )
}
