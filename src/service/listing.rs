//! Listing service
//!
//! Validates seller-submitted listing payloads against a declarative field
//! table and persists them.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::data::{Database, Listing, ListingDetails, ViewingSlot};
use crate::error::{AppError, FieldError, Result};
use crate::metrics::LISTINGS_CREATED_TOTAL;

/// Kind of value a payload field must hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text; numbers and booleans are accepted and kept as text
    Text,
    /// Any finite number, or a string that parses as one
    Number,
    /// Non-negative whole number
    Count,
    /// Array of viewing slots
    Schedule,
}

/// One entry of a payload schema
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
    }
}

/// Listing payload schema
pub const LISTING_FIELDS: &[FieldSpec] = &[
    required("propertyType", FieldKind::Text),
    required("neighborhood", FieldKind::Text),
    required("municipality", FieldKind::Text),
    required("department", FieldKind::Text),
    required("propertyAddress", FieldKind::Text),
    required("longitude", FieldKind::Number),
    required("latitude", FieldKind::Number),
    required("propertySize", FieldKind::Text),
    required("propertyBedrooms", FieldKind::Text),
    required("propertyBathrooms", FieldKind::Text),
    required("propertyFloors", FieldKind::Text),
    required("propertyParking", FieldKind::Count),
    required("propertyFurnished", FieldKind::Text),
    required("propertyDescription", FieldKind::Text),
    required("propertyPrice", FieldKind::Text),
    optional("availability", FieldKind::Text),
    optional("scheduleViewing", FieldKind::Schedule),
];

/// Viewing slot schema (all text, all required)
pub const VIEWING_SLOT_FIELDS: &[&str] = &[
    "day",
    "startHour",
    "startMinute",
    "finishHour",
    "finishMinute",
];

/// A field value after coercion
#[derive(Debug, Clone, PartialEq)]
enum Coerced {
    Text(String),
    Number(f64),
    Count(i64),
    Schedule(Vec<ViewingSlot>),
}

/// Collects coerced values and errors while walking the schema
#[derive(Default)]
struct Checked {
    values: Map<String, Value>,
    slots: Vec<ViewingSlot>,
    errors: Vec<FieldError>,
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn coerce_count(value: &Value) -> Option<i64> {
    let number = coerce_number(value)?;
    (number >= 0.0 && number.fract() == 0.0 && number <= i64::MAX as f64).then_some(number as i64)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn check_schedule(field: &str, value: &Value, errors: &mut Vec<FieldError>) -> Vec<ViewingSlot> {
    let Value::Array(entries) = value else {
        errors.push(FieldError::new(field, "must be an array"));
        return Vec::new();
    };

    let mut slots = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let Value::Object(object) = entry else {
            errors.push(FieldError::new(
                format!("{field}[{index}]"),
                "must be an object",
            ));
            continue;
        };

        let mut parts = Vec::with_capacity(VIEWING_SLOT_FIELDS.len());
        for name in VIEWING_SLOT_FIELDS {
            let path = format!("{field}[{index}].{name}");
            match object.get(*name) {
                None => errors.push(FieldError::new(path, "is required")),
                Some(value) if is_blank(value) => {
                    errors.push(FieldError::new(path, "is required"))
                }
                Some(value) => match coerce_text(value) {
                    Some(text) => parts.push(text),
                    None => errors.push(FieldError::new(path, "must be a string")),
                },
            }
        }

        if let Ok([day, start_hour, start_minute, finish_hour, finish_minute]) =
            <[String; 5]>::try_from(parts)
        {
            slots.push(ViewingSlot {
                day,
                start_hour,
                start_minute,
                finish_hour,
                finish_minute,
            });
        }
    }
    slots
}

fn coerce(spec: &FieldSpec, value: &Value, checked: &mut Checked) -> Option<Coerced> {
    match spec.kind {
        FieldKind::Text => match coerce_text(value) {
            Some(text) => Some(Coerced::Text(text)),
            None => {
                checked
                    .errors
                    .push(FieldError::new(spec.name, "must be a string"));
                None
            }
        },
        FieldKind::Number => match coerce_number(value) {
            Some(number) => Some(Coerced::Number(number)),
            None => {
                checked
                    .errors
                    .push(FieldError::new(spec.name, "must be a number"));
                None
            }
        },
        FieldKind::Count => match coerce_count(value) {
            Some(count) => Some(Coerced::Count(count)),
            None => {
                checked.errors.push(FieldError::new(
                    spec.name,
                    "must be a non-negative whole number",
                ));
                None
            }
        },
        FieldKind::Schedule => Some(Coerced::Schedule(check_schedule(
            spec.name,
            value,
            &mut checked.errors,
        ))),
    }
}

fn check_range(
    values: &Map<String, Value>,
    field: &'static str,
    limit: f64,
    errors: &mut Vec<FieldError>,
) {
    if let Some(value) = values.get(field).and_then(Value::as_f64) {
        if !(-limit..=limit).contains(&value) {
            errors.push(FieldError::new(
                field,
                format!("must be between -{limit} and {limit}"),
            ));
        }
    }
}

/// Validate a raw listing payload
///
/// Every violation is reported, not just the first. Fields outside the
/// schema (`seller`, `status`, ids, timestamps) are ignored.
pub fn validate_listing(payload: &Value) -> Result<ListingDetails> {
    let Value::Object(object) = payload else {
        return Err(AppError::Validation(vec![FieldError::new(
            "body",
            "must be a JSON object",
        )]));
    };

    let mut checked = Checked::default();
    for spec in LISTING_FIELDS {
        let value = object.get(spec.name).filter(|value| !is_blank(value));
        let Some(value) = value else {
            if spec.required {
                checked
                    .errors
                    .push(FieldError::new(spec.name, "is required"));
            }
            continue;
        };

        match coerce(spec, value, &mut checked) {
            Some(Coerced::Text(text)) => {
                checked.values.insert(spec.name.into(), Value::String(text));
            }
            Some(Coerced::Number(number)) => {
                checked.values.insert(spec.name.into(), number.into());
            }
            Some(Coerced::Count(count)) => {
                checked.values.insert(spec.name.into(), count.into());
            }
            Some(Coerced::Schedule(slots)) => checked.slots = slots,
            None => {}
        }
    }

    check_range(&checked.values, "latitude", 90.0, &mut checked.errors);
    check_range(&checked.values, "longitude", 180.0, &mut checked.errors);

    if !checked.errors.is_empty() {
        return Err(AppError::Validation(checked.errors));
    }

    let mut details: ListingDetails = serde_json::from_value(Value::Object(checked.values))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("validated listing did not map: {e}")))?;
    details.schedule_viewing = checked.slots;
    Ok(details)
}

/// Listing service
pub struct ListingService {
    db: Arc<Database>,
}

impl ListingService {
    /// Create new listing service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a listing owned by `seller_id`
    ///
    /// # Returns
    /// Created listing, status `pending`
    ///
    /// # Errors
    /// - `Validation` when the payload breaks the schema
    /// - `Unauthorized` when the seller no longer exists
    ///
    /// Identical payloads create distinct listings.
    pub async fn create(&self, seller_id: &str, payload: &Value) -> Result<Listing> {
        let details = validate_listing(payload)?;

        if self.db.get_user(seller_id).await?.is_none() {
            tracing::warn!(%seller_id, "Listing submitted for a user that no longer exists");
            return Err(AppError::Unauthorized);
        }

        let listing = Listing::new(details, seller_id);
        self.db.insert_listing(&listing).await?;
        LISTINGS_CREATED_TOTAL.inc();

        tracing::info!(listing_id = %listing.id, %seller_id, "Listing created");
        Ok(listing)
    }

    /// All listings, for review
    pub async fn list_all(&self) -> Result<Vec<Listing>> {
        self.db.list_listings().await
    }
}
