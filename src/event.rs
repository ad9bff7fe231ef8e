use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{AuthResult, StorageKey, StorageResult, StoreResult};
use crate::geocode::{GeocodeError, ResolvedLocation};
use crate::model::{FieldValue, ListingField};

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(UserId);
typed_id!(ListingId);
typed_id!(BatchId);

impl BatchId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ValueError {
    #[error("invalid coordinate: lat={0}, lng={1}")]
    InvalidCoordinate(f64, f64),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl Eq for ValueError {}

impl PartialEq for ValueError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidCoordinate(a1, b1), Self::InvalidCoordinate(a2, b2)) => {
                a1.to_bits() == a2.to_bits() && b1.to_bits() == b2.to_bits()
            }
            (Self::InvalidUrl(a), Self::InvalidUrl(b)) => a == b,
            _ => false,
        }
    }
}

// --- Coordinate: validated, NaN-safe ---

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValueError> {
        if !lat.is_finite()
            || !lng.is_finite()
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lng)
        {
            return Err(ValueError::InvalidCoordinate(lat, lng));
        }
        Ok(Self { lat, lng })
    }

    #[must_use]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    #[must_use]
    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.lat.to_bits() == other.lat.to_bits() && self.lng.to_bits() == other.lng.to_bits()
    }
}

impl Eq for Coordinate {}

// --- Validated download URL ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DownloadUrl(String);

impl DownloadUrl {
    pub fn new(s: impl Into<String>) -> Result<Self, ValueError> {
        let s = s.into();
        if !(s.starts_with("https://") || s.starts_with("http://")) {
            return Err(ValueError::InvalidUrl(s));
        }
        // Reject known dangerous schemes that could sneak past prefix check.
        if s.contains("javascript:") || s.contains("data:") {
            return Err(ValueError::InvalidUrl(s));
        }
        Ok(Self(s))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Listing kind: sale or rent ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Sale,
    #[default]
    Rent,
}

impl ListingKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Rent => "rent",
        }
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Don't hold file bytes in the core. Hold a handle the shell can resolve.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileHandle {
    pub uri: String,
    pub file_name: String,
    pub size_bytes: Option<u64>,
}

/// Current identity as reported by the session provider.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
}

/// Geocoding configuration, pushed in by the shell at startup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct GeoSettings {
    pub enabled: bool,
    pub api_key: Option<String>,
}

// --- Event enum ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Session
    SessionChanged {
        session: Option<Session>,
    },
    SignOutRequested,
    SignOutCompleted(AuthResult),

    // Configuration
    GeocodingConfigured {
        settings: GeoSettings,
    },

    // Listing form
    ListingFieldChanged {
        field: ListingField,
        value: FieldValue,
    },
    FilesSelected {
        files: Vec<FileHandle>,
    },
    SubmitListingRequested,

    // Submission pipeline
    GeocodeResolved(Result<ResolvedLocation, GeocodeError>),
    /// Shell-reported byte counters for an in-flight upload. View feedback
    /// only; settlement is carried by `UploadSettled`.
    UploadProgressed {
        batch: BatchId,
        index: usize,
        transferred_bytes: u64,
        total_bytes: u64,
    },
    UploadSettled {
        batch: BatchId,
        index: usize,
        result: StorageResult,
    },
    ListingPersisted(StoreResult),

    // Profile
    ProfileOpened,
    OwnListingsLoaded(StoreResult),
    EditDetailsToggled,
    DisplayNameEdited {
        name: String,
    },
    DisplayNameCommitted(AuthResult),
    ProfileDocUpdated(StoreResult),

    // Listing deletion
    DeleteListingRequested {
        id: ListingId,
    },
    DeleteListingConfirmed,
    DeleteListingCancelled,
    ListingDocDeleted(StoreResult),
    ImageObjectDeleted {
        key: StorageKey,
        result: StorageResult,
    },

    // UI
    ToastDismissed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_rejects_nan() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn coordinate_rejects_out_of_range() {
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, 181.0).is_err());
        assert!(Coordinate::new(-91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, -181.0).is_err());
    }

    #[test]
    fn coordinate_accepts_valid() {
        assert!(Coordinate::new(40.0, -75.0).is_ok());
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn coordinate_rejects_infinity() {
        assert!(Coordinate::new(f64::INFINITY, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn download_url_rejects_javascript() {
        assert!(DownloadUrl::new("javascript:alert(1)").is_err());
        assert!(DownloadUrl::new("https://example.com/o/images%2Fa.jpg").is_ok());
        assert!(DownloadUrl::new("ftp://files.com").is_err());
    }

    #[test]
    fn listing_kind_round_trips_through_serde() {
        let json = serde_json::to_string(&ListingKind::Sale).unwrap();
        assert_eq!(json, "\"sale\"");
        let kind: ListingKind = serde_json::from_str("\"rent\"").unwrap();
        assert_eq!(kind, ListingKind::Rent);
    }

    #[test]
    fn typed_ids_are_not_interchangeable() {
        let listing = ListingId::new("abc");
        let user = UserId::new("abc");
        // Different types; mixing them is a compile error. This test exists
        // as documentation, the compiler enforces it.
        assert_eq!(listing.as_str(), user.as_str());
    }

    #[test]
    fn batch_ids_are_unique() {
        assert_ne!(BatchId::generate(), BatchId::generate());
    }

    #[test]
    fn event_size_is_reasonable() {
        let size = std::mem::size_of::<Event>();
        assert!(
            size <= 160,
            "Event enum is {} bytes, box more variants",
            size
        );
    }
}
