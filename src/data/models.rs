//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.
//! JSON field names follow the camelCase shape the web client expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// User
// =============================================================================

/// A person who signed in through the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Stable subject id assigned by the identity provider
    pub google_id: String,
    pub name: String,
    pub email: String,
    pub profile_picture: Option<String>,
    /// Free-form role string; see [`Role`]
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role.as_str()
    }
}

/// Roles understood by the access gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// Identity asserted by the external provider after its own handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub picture: Option<String>,
}

// =============================================================================
// Listing
// =============================================================================

/// Review state of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ListingStatus {
    Unapproved,
    Approved,
    #[default]
    Pending,
}

/// One slot in a listing's viewing schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewingSlot {
    pub day: String,
    pub start_hour: String,
    pub start_minute: String,
    pub finish_hour: String,
    pub finish_minute: String,
}

/// Property attributes supplied by the seller
///
/// Sizes, room counts and price stay free text as the client sends them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetails {
    pub property_type: String,
    pub neighborhood: String,
    pub municipality: String,
    pub department: String,
    pub property_address: String,
    pub longitude: f64,
    pub latitude: f64,
    pub property_size: String,
    pub property_bedrooms: String,
    pub property_bathrooms: String,
    pub property_floors: String,
    pub property_parking: i64,
    pub property_furnished: String,
    pub property_description: String,
    pub property_price: String,
    pub availability: Option<String>,
    #[serde(default)]
    pub schedule_viewing: Vec<ViewingSlot>,
}

/// A property listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    #[serde(flatten)]
    pub details: ListingDetails,
    /// User id of the seller
    pub seller: Option<String>,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Build a new pending listing owned by `seller`
    pub fn new(details: ListingDetails, seller: &str) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new().0,
            details,
            seller: Some(seller.to_string()),
            status: ListingStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Flat `listings` row; viewing slots live in their own table
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ListingRow {
    pub id: String,
    pub property_type: String,
    pub neighborhood: String,
    pub municipality: String,
    pub department: String,
    pub property_address: String,
    pub longitude: f64,
    pub latitude: f64,
    pub property_size: String,
    pub property_bedrooms: String,
    pub property_bathrooms: String,
    pub property_floors: String,
    pub property_parking: i64,
    pub property_furnished: String,
    pub property_description: String,
    pub property_price: String,
    pub availability: Option<String>,
    pub seller_id: Option<String>,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ListingRow {
    pub(crate) fn into_listing(self, schedule_viewing: Vec<ViewingSlot>) -> Listing {
        Listing {
            id: self.id,
            details: ListingDetails {
                property_type: self.property_type,
                neighborhood: self.neighborhood,
                municipality: self.municipality,
                department: self.department,
                property_address: self.property_address,
                longitude: self.longitude,
                latitude: self.latitude,
                property_size: self.property_size,
                property_bedrooms: self.property_bedrooms,
                property_bathrooms: self.property_bathrooms,
                property_floors: self.property_floors,
                property_parking: self.property_parking,
                property_furnished: self.property_furnished,
                property_description: self.property_description,
                property_price: self.property_price,
                availability: self.availability,
                schedule_viewing,
            },
            seller: self.seller_id,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ViewingRow {
    pub listing_id: String,
    pub day: String,
    pub start_hour: String,
    pub start_minute: String,
    pub finish_hour: String,
    pub finish_minute: String,
}

impl From<ViewingRow> for ViewingSlot {
    fn from(row: ViewingRow) -> Self {
        Self {
            day: row.day,
            start_hour: row.start_hour,
            start_minute: row.start_minute,
            finish_hour: row.finish_hour,
            finish_minute: row.finish_minute,
        }
    }
}
