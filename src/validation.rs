//! Submit-time draft validation.
//!
//! The form already constrains most fields on entry; everything is checked
//! again here so a caller that never went through the form cannot slip an
//! out-of-bounds draft past the controller.

use thiserror::Error;

use crate::event::Coordinate;
use crate::model::ListingDraft;
use crate::{
    MAX_LISTING_IMAGES, MAX_NAME_CHARS, MAX_PRICE, MAX_ROOMS, MIN_NAME_CHARS, MIN_PRICE, MIN_ROOMS,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("Discounted price needs to be less than regular price")]
    PriceInvalid,

    #[error("Max {MAX_LISTING_IMAGES} images")]
    TooManyImages { count: usize },

    #[error("Name must be between {MIN_NAME_CHARS} and {MAX_NAME_CHARS} characters")]
    NameLength { chars: usize },

    #[error("Bedrooms must be between {MIN_ROOMS} and {MAX_ROOMS}")]
    BedroomsOutOfRange { count: u32 },

    #[error("Bathrooms must be between {MIN_ROOMS} and {MAX_ROOMS}")]
    BathroomsOutOfRange { count: u32 },

    #[error("Price must be between {MIN_PRICE} and {MAX_PRICE}")]
    PriceOutOfRange { price: u64 },

    #[error("Discounted price must be between {MIN_PRICE} and {MAX_PRICE}")]
    DiscountOutOfRange { price: u64 },

    #[error("Please enter valid coordinates")]
    CoordinateInvalid,
}

/// Check a draft immediately before submission. Returns the first failure
/// in the order the submit flow reports them: the offer price rule, then
/// image cardinality, then the re-enforced form bounds.
pub fn validate(draft: &ListingDraft, geocoding_enabled: bool) -> Result<(), ValidationFailure> {
    if draft.offer.is_yes() && draft.discounted_price >= draft.regular_price {
        return Err(ValidationFailure::PriceInvalid);
    }

    let count = draft.selected_files.len();
    if count > MAX_LISTING_IMAGES {
        return Err(ValidationFailure::TooManyImages { count });
    }

    let chars = draft.name.chars().count();
    if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&chars) {
        return Err(ValidationFailure::NameLength { chars });
    }

    if !(MIN_ROOMS..=MAX_ROOMS).contains(&draft.bedrooms) {
        return Err(ValidationFailure::BedroomsOutOfRange {
            count: draft.bedrooms,
        });
    }
    if !(MIN_ROOMS..=MAX_ROOMS).contains(&draft.bathrooms) {
        return Err(ValidationFailure::BathroomsOutOfRange {
            count: draft.bathrooms,
        });
    }

    if !(MIN_PRICE..=MAX_PRICE).contains(&draft.regular_price) {
        return Err(ValidationFailure::PriceOutOfRange {
            price: draft.regular_price,
        });
    }
    if draft.offer.is_yes() && !(MIN_PRICE..=MAX_PRICE).contains(&draft.discounted_price) {
        return Err(ValidationFailure::DiscountOutOfRange {
            price: draft.discounted_price,
        });
    }

    if !geocoding_enabled && Coordinate::new(draft.latitude, draft.longitude).is_err() {
        return Err(ValidationFailure::CoordinateInvalid);
    }

    Ok(())
}
