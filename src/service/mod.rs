//! Service layer
//!
//! Contains business logic separated from HTTP handlers.

mod listing;

pub use listing::{FieldKind, FieldSpec, LISTING_FIELDS, ListingService, validate_listing};
