//! Normalization of booking-listing responses before they are cached.
//!
//! Listings come either as a bare JSON array of bookings or as a paginated
//! object with a `results` array. Every booking gets a `services` array and
//! every service a numeric `id`/`quantity`, a `name` and a `price`. A
//! missing `total_amount` is rebuilt from the line items.
use serde_json::{Map, Value};
use sworker_cache::HttpResponse;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum BookingError {
    #[error("Booking listing is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unexpected booking listing shape: {0}")]
    Shape(&'static str),
}

const DEFAULT_SERVICE_NAME: &str = "Service";
const DEFAULT_PRICE: &str = "0.00";

/// True when `url` points at the booking-listing endpoint.
pub fn is_booking_listing(url: &Url, listing_path: &str) -> bool {
    !listing_path.is_empty() && url.path().contains(listing_path)
}

/// Normalize a listing in place. Returns the number of bookings seen.
pub fn normalize_listing(listing: &mut Value) -> Result<usize, BookingError> {
    let bookings = match listing {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get_mut("results") {
            Some(Value::Array(items)) => items,
            _ => return Err(BookingError::Shape("object without a results array")),
        },
        _ => return Err(BookingError::Shape("expected an array or an object")),
    };

    for booking in bookings.iter_mut() {
        if let Value::Object(booking) = booking {
            normalize_booking(booking);
        }
    }
    Ok(bookings.len())
}

/// Validated clone of a listing response. Status and headers are kept,
/// the body is replaced by the normalized JSON.
pub fn validate_response(response: &HttpResponse) -> Result<HttpResponse, BookingError> {
    let mut listing: Value = response.body_json()?;
    normalize_listing(&mut listing)?;

    let mut validated = response.clone();
    validated.body = serde_json::to_vec(&listing)?.into();
    validated.headers.remove("content-length");
    Ok(validated)
}

fn normalize_booking(booking: &mut Map<String, Value>) {
    if !matches!(booking.get("services"), Some(Value::Array(_))) {
        booking.insert("services".to_string(), Value::Array(Vec::new()));
    }

    let mut total = 0.0;
    if let Some(Value::Array(services)) = booking.get_mut("services") {
        for (idx, service) in services.iter_mut().enumerate() {
            if !service.is_object() {
                *service = Value::Object(Map::new());
            }
            if let Value::Object(service) = service {
                total += normalize_service(idx, service);
            }
        }
    }

    if booking.get("total_amount").is_none_or(Value::is_null) {
        let rounded = (total * 100.0).round() / 100.0;
        booking.insert(
            "total_amount".to_string(),
            Value::String(format!("{rounded:.2}")),
        );
    }
}

/// Fill defaults on one service and return its line amount.
fn normalize_service(idx: usize, service: &mut Map<String, Value>) -> f64 {
    let id = service
        .get("id")
        .and_then(as_integer)
        .unwrap_or(idx as u64 + 1);
    service.insert("id".to_string(), Value::from(id));

    let quantity = service
        .get("quantity")
        .and_then(as_integer)
        .unwrap_or(1)
        .max(1);
    service.insert("quantity".to_string(), Value::from(quantity));

    let has_name = service
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| !name.trim().is_empty());
    if !has_name {
        service.insert(
            "name".to_string(),
            Value::String(DEFAULT_SERVICE_NAME.to_string()),
        );
    }

    let has_price = match service.get("price") {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    };
    if !has_price {
        service.insert("price".to_string(), Value::String(DEFAULT_PRICE.to_string()));
    }
    let price = match service.get("price") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .unwrap_or(0.0);

    price * quantity as f64
}

fn as_integer(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}
