use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::event::{
    Coordinate, DownloadUrl, FileHandle, GeoSettings, ListingId, ListingKind, Session, UserId,
};
use crate::geocode::ResolvedLocation;
use crate::upload::UploadBatch;
use crate::{MAX_ADDRESS_CHARS, MAX_NAME_CHARS, MAX_PRICE, MAX_ROOMS, MIN_ROOMS, TOAST_DURATION_MS};

/// Tri-state for the Yes/No button groups. A group the user never touched
/// stays `Unset`; mapping to a plain bool happens at the validation
/// boundary, not in the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    Yes,
    No,
    #[default]
    Unset,
}

impl Toggle {
    #[must_use]
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::Yes => Some(true),
            Self::No => Some(false),
            Self::Unset => None,
        }
    }

    #[must_use]
    pub const fn is_yes(self) -> bool {
        matches!(self, Self::Yes)
    }
}

// --- Draft fields and their value table ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingField {
    Kind,
    Name,
    Bedrooms,
    Bathrooms,
    Parking,
    Furnished,
    Offer,
    Address,
    RegularPrice,
    DiscountedPrice,
    Latitude,
    Longitude,
}

impl ListingField {
    /// Static field-type table: what value shape each field accepts and the
    /// hard caps enforced on entry. Submit-time validation re-checks full
    /// ranges; this table keeps a draft from ever holding nonsense.
    #[must_use]
    pub const fn kind(self) -> FieldKind {
        match self {
            Self::Kind => FieldKind::Kind,
            Self::Name => FieldKind::Text {
                max_chars: MAX_NAME_CHARS,
            },
            Self::Bedrooms | Self::Bathrooms => FieldKind::Count {
                min: MIN_ROOMS,
                max: MAX_ROOMS,
            },
            Self::Parking | Self::Furnished | Self::Offer => FieldKind::Toggle,
            Self::Address => FieldKind::Text {
                max_chars: MAX_ADDRESS_CHARS,
            },
            Self::RegularPrice | Self::DiscountedPrice => FieldKind::Price { max: MAX_PRICE },
            Self::Latitude | Self::Longitude => FieldKind::Coord,
        }
    }
}

impl fmt::Display for ListingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Kind => "kind",
            Self::Name => "name",
            Self::Bedrooms => "bedrooms",
            Self::Bathrooms => "bathrooms",
            Self::Parking => "parking",
            Self::Furnished => "furnished",
            Self::Offer => "offer",
            Self::Address => "address",
            Self::RegularPrice => "regular price",
            Self::DiscountedPrice => "discounted price",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Kind,
    Text { max_chars: usize },
    Count { min: u32, max: u32 },
    Toggle,
    Price { max: u64 },
    Coord,
}

/// A value arriving from the form. Typed, so "true" the string can never be
/// confused with true the boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Kind(ListingKind),
    Text(String),
    Count(u32),
    Toggle(Toggle),
    Price(u64),
    Coord(f64),
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum DraftError {
    #[error("{field} does not accept this value type")]
    TypeMismatch { field: ListingField },
    #[error("{field} is out of range")]
    OutOfRange { field: ListingField },
    #[error("{field} exceeds {max_chars} characters")]
    TooLong {
        field: ListingField,
        max_chars: usize,
    },
}

/// The in-progress listing. Owned by the submission flow and mutated only
/// through [`ListingDraft::apply`], checked against the field table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingDraft {
    pub kind: ListingKind,
    pub name: String,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub parking: Toggle,
    pub furnished: Toggle,
    pub offer: Toggle,
    pub address: String,
    pub regular_price: u64,
    pub discounted_price: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub selected_files: Vec<FileHandle>,
}

impl Default for ListingDraft {
    fn default() -> Self {
        Self {
            kind: ListingKind::Rent,
            name: String::new(),
            bedrooms: 1,
            bathrooms: 1,
            parking: Toggle::Unset,
            furnished: Toggle::Unset,
            offer: Toggle::Unset,
            address: String::new(),
            regular_price: 0,
            discounted_price: 0,
            latitude: 0.0,
            longitude: 0.0,
            selected_files: Vec::new(),
        }
    }
}

impl ListingDraft {
    pub fn apply(&mut self, field: ListingField, value: FieldValue) -> Result<(), DraftError> {
        match (field.kind(), value) {
            (FieldKind::Kind, FieldValue::Kind(kind)) => self.kind = kind,
            (FieldKind::Toggle, FieldValue::Toggle(t)) => self.set_toggle(field, t),
            (FieldKind::Text { max_chars }, FieldValue::Text(s)) => {
                if s.chars().count() > max_chars {
                    return Err(DraftError::TooLong { field, max_chars });
                }
                self.set_text(field, s);
            }
            (FieldKind::Count { min, max }, FieldValue::Count(n)) => {
                if !(min..=max).contains(&n) {
                    return Err(DraftError::OutOfRange { field });
                }
                self.set_count(field, n);
            }
            (FieldKind::Price { max }, FieldValue::Price(p)) => {
                if p > max {
                    return Err(DraftError::OutOfRange { field });
                }
                self.set_price(field, p);
            }
            (FieldKind::Coord, FieldValue::Coord(c)) => {
                if !c.is_finite() {
                    return Err(DraftError::OutOfRange { field });
                }
                self.set_coord(field, c);
            }
            _ => return Err(DraftError::TypeMismatch { field }),
        }
        Ok(())
    }

    fn set_text(&mut self, field: ListingField, s: String) {
        match field {
            ListingField::Name => self.name = s,
            ListingField::Address => self.address = s,
            _ => {}
        }
    }

    fn set_count(&mut self, field: ListingField, n: u32) {
        match field {
            ListingField::Bedrooms => self.bedrooms = n,
            ListingField::Bathrooms => self.bathrooms = n,
            _ => {}
        }
    }

    fn set_toggle(&mut self, field: ListingField, t: Toggle) {
        match field {
            ListingField::Parking => self.parking = t,
            ListingField::Furnished => self.furnished = t,
            ListingField::Offer => self.offer = t,
            _ => {}
        }
    }

    fn set_price(&mut self, field: ListingField, p: u64) {
        match field {
            ListingField::RegularPrice => self.regular_price = p,
            ListingField::DiscountedPrice => self.discounted_price = p,
            _ => {}
        }
    }

    fn set_coord(&mut self, field: ListingField, c: f64) {
        match field {
            ListingField::Latitude => self.latitude = c,
            ListingField::Longitude => self.longitude = c,
            _ => {}
        }
    }
}

// --- Persisted document ---

/// The durable listing document. Field names match the backend schema the
/// mobile and web clients already read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(rename = "type")]
    pub kind: ListingKind,
    pub name: String,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub parking: bool,
    pub furnished: bool,
    pub offer: bool,
    #[serde(rename = "regularPrice")]
    pub regular_price: u64,
    #[serde(
        rename = "discountedPrice",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub discounted_price: Option<u64>,
    #[serde(rename = "imageUrls")]
    pub image_urls: Vec<DownloadUrl>,
    pub geolocation: Coordinate,
    pub location: String,
    #[serde(rename = "userRef")]
    pub owner: UserId,
    /// Stamped by the document store on insert; present when read back.
    #[serde(rename = "timestamp", default, skip_serializing_if = "Option::is_none")]
    pub created_at_ms: Option<u64>,
}

impl ListingRecord {
    /// Assemble the document written on successful submission. The draft's
    /// address text and file handles stay behind; the discounted price is
    /// dropped entirely when there is no offer.
    #[must_use]
    pub fn assemble(
        draft: &ListingDraft,
        location: &ResolvedLocation,
        image_urls: Vec<DownloadUrl>,
        owner: UserId,
    ) -> Self {
        let offer = draft.offer.is_yes();
        Self {
            kind: draft.kind,
            name: draft.name.clone(),
            bedrooms: draft.bedrooms,
            bathrooms: draft.bathrooms,
            parking: draft.parking.as_bool().unwrap_or(false),
            furnished: draft.furnished.as_bool().unwrap_or(false),
            offer,
            regular_price: draft.regular_price,
            discounted_price: offer.then_some(draft.discounted_price),
            image_urls,
            geolocation: location.coordinate,
            location: location.address.clone(),
            owner,
            created_at_ms: None,
        }
    }
}

/// A listing as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedListing {
    pub id: ListingId,
    pub record: ListingRecord,
}

// --- Submission flow state ---

/// Inputs captured when a submission starts, carried through the phases so
/// later edits to the form cannot bleed into an in-flight run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionJob {
    pub draft: ListingDraft,
    pub owner: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum SubmissionPhase {
    #[default]
    Idle,
    GeoResolving {
        job: SubmissionJob,
    },
    Uploading {
        job: SubmissionJob,
        location: ResolvedLocation,
        batch: UploadBatch,
    },
    Persisting {
        kind: ListingKind,
    },
}

impl SubmissionPhase {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

// --- Profile ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProfileDraft {
    pub display_name: String,
}

/// A delete waiting on the user's confirmation. Image URLs are captured up
/// front so cleanup still works after the document row disappears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDelete {
    pub id: ListingId,
    pub image_urls: Vec<DownloadUrl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProfileState {
    pub draft: ProfileDraft,
    pub editing: bool,
    pub loading: bool,
    pub listings: Vec<OwnedListing>,
    pub listings_loaded: bool,
    pub pending_delete: Option<PendingDelete>,
}

// --- Toasts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Success,
            duration_ms: TOAST_DURATION_MS,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Error,
            duration_ms: TOAST_DURATION_MS,
        }
    }
}

// --- Model ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Model {
    pub session: Option<Session>,
    pub geo_settings: GeoSettings,
    pub draft: ListingDraft,
    pub submission: SubmissionPhase,
    pub profile: ProfileState,
    pub toasts: VecDeque<ToastMessage>,
}
