// lib.rs - listing app core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod event;
pub mod geocode;
pub mod model;
pub mod upload;
pub mod validation;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use event::Event;
pub use model::Model;

pub const MAX_LISTING_IMAGES: usize = 6;
pub const MIN_NAME_CHARS: usize = 10;
pub const MAX_NAME_CHARS: usize = 32;
pub const MAX_ADDRESS_CHARS: usize = 1024;
pub const MIN_ROOMS: u32 = 1;
pub const MAX_ROOMS: u32 = 50;
pub const MIN_PRICE: u64 = 50;
pub const MAX_PRICE: u64 = 750_000_000;
pub const TOAST_DURATION_MS: u64 = 4_000;

/// Everything this app surfaces to the user as a failure toast. None of
/// these are fatal: each one aborts its workflow step and hands control
/// back to an interactive, re-submittable state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Failure {
    #[error(transparent)]
    Validation(#[from] validation::ValidationFailure),

    #[error("Please enter a correct address")]
    AddressUnresolvable,

    #[error("Images not uploaded")]
    UploadFailed,

    #[error("Could not save listing")]
    PersistFailed,

    #[error("Could not delete listing")]
    ListingDeleteFailed,

    #[error("Could not update profile details")]
    ProfileUpdateFailed,

    /// Non-fatal: reported per image, never blocks the enclosing delete.
    #[error("Failed to delete images")]
    ImageDeleteFailed,
}

impl Failure {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        use validation::ValidationFailure;
        match self {
            Self::Validation(ValidationFailure::PriceInvalid) => "PRICE_INVALID",
            Self::Validation(ValidationFailure::TooManyImages { .. }) => "TOO_MANY_IMAGES",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::AddressUnresolvable => "ADDRESS_UNRESOLVABLE",
            Self::UploadFailed => "UPLOAD_FAILED",
            Self::PersistFailed => "PERSIST_FAILED",
            Self::ListingDeleteFailed => "LISTING_DELETE_FAILED",
            Self::ProfileUpdateFailed => "PROFILE_UPDATE_FAILED",
            Self::ImageDeleteFailed => "IMAGE_DELETE_FAILED",
        }
    }

    #[must_use]
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

pub mod app {
    use tracing::{debug, warn};

    use crate::capabilities::{
        AuthOutput, AuthResult, Capabilities, Collection, Route, StorageKey, StorageOutput,
        StorageResult, StoreOutput, StoreResult,
    };
    use crate::event::{BatchId, DownloadUrl, Event, ListingId, Session};
    use crate::geocode::{self, GeocodeError, ResolvedLocation};
    use crate::model::{
        FieldValue, ListingDraft, ListingField, ListingRecord, Model, OwnedListing, PendingDelete,
        ProfileState, SubmissionJob, SubmissionPhase, ToastMessage,
    };
    use crate::upload::{BatchOutcome, UploadBatch};
    use crate::validation::{self, ValidationFailure};
    use crate::{Failure, ViewModel};

    /// Query shape for "my listings": equality on the owner ref, newest
    /// first on the server-stamped timestamp.
    const OWNER_FIELD: &str = "userRef";
    const CREATED_AT_FIELD: &str = "timestamp";

    /// Second toast shown with `UploadFailed`; the storage backend caps
    /// individual objects at 2 MB.
    const UPLOAD_SIZE_HINT: &str = "Make sure each image is less than 2 MB";

    #[derive(Default)]
    pub struct App;

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            match event {
                Event::SessionChanged { session } => {
                    Self::on_session_changed(session, model, caps);
                }
                Event::SignOutRequested => caps.auth.sign_out(Event::SignOutCompleted),
                Event::SignOutCompleted(result) => {
                    Self::on_sign_out_completed(&result, model, caps);
                }
                Event::GeocodingConfigured { settings } => model.geo_settings = settings,

                Event::ListingFieldChanged { field, value } => {
                    Self::on_field_changed(field, value, model);
                }
                Event::FilesSelected { files } => model.draft.selected_files = files,
                Event::SubmitListingRequested => Self::on_submit(model, caps),
                Event::GeocodeResolved(result) => {
                    Self::on_geocode_resolved(result, model, caps);
                }
                Event::UploadProgressed {
                    batch,
                    index,
                    transferred_bytes,
                    total_bytes,
                } => {
                    if let SubmissionPhase::Uploading { batch: active, .. } =
                        &mut model.submission
                    {
                        if active.id() == &batch {
                            active.record_progress(index, transferred_bytes, total_bytes);
                        }
                    }
                }
                Event::UploadSettled {
                    batch,
                    index,
                    result,
                } => Self::on_upload_settled(&batch, index, result, model, caps),
                Event::ListingPersisted(result) => {
                    Self::on_listing_persisted(result, model, caps);
                }

                Event::ProfileOpened => Self::on_profile_opened(model, caps),
                Event::OwnListingsLoaded(result) => Self::on_own_listings_loaded(result, model),
                Event::EditDetailsToggled => Self::on_edit_details_toggled(model, caps),
                Event::DisplayNameEdited { name } => model.profile.draft.display_name = name,
                Event::DisplayNameCommitted(result) => {
                    Self::on_display_name_committed(&result, model, caps);
                }
                Event::ProfileDocUpdated(result) => Self::on_profile_doc_updated(&result, model),

                Event::DeleteListingRequested { id } => Self::on_delete_requested(id, model),
                Event::DeleteListingConfirmed => Self::on_delete_confirmed(model, caps),
                Event::DeleteListingCancelled => model.profile.pending_delete = None,
                Event::ListingDocDeleted(result) => {
                    Self::on_listing_doc_deleted(&result, model, caps);
                }
                Event::ImageObjectDeleted { key, result } => {
                    Self::on_image_object_deleted(&key, &result, model);
                }

                Event::ToastDismissed => {
                    model.toasts.pop_front();
                }
            }

            caps.render.render();
        }

        fn view(&self, model: &Model) -> ViewModel {
            ViewModel::project(model)
        }
    }

    impl App {
        fn on_session_changed(
            session: Option<Session>,
            model: &mut Model,
            caps: &Capabilities,
        ) {
            match session {
                Some(session) => {
                    debug!(user = %session.user_id, "session established");
                    model.profile.draft.display_name = session.display_name.clone();
                    model.session = Some(session);
                }
                None => {
                    debug!("session lost, redirecting to sign-in");
                    model.session = None;
                    model.profile = ProfileState::default();
                    model.submission = SubmissionPhase::Idle;
                    caps.nav.navigate(&Route::SignIn);
                }
            }
        }

        fn on_sign_out_completed(result: &AuthResult, model: &mut Model, caps: &Capabilities) {
            match result {
                Ok(AuthOutput::SignedOut) => {
                    model.session = None;
                    model.profile = ProfileState::default();
                    model.submission = SubmissionPhase::Idle;
                    model.draft = ListingDraft::default();
                    caps.nav.navigate(&Route::Home);
                }
                Ok(other) => warn!(?other, "unexpected auth output for sign-out"),
                Err(e) => warn!(%e, "sign-out failed"),
            }
        }

        fn on_field_changed(field: ListingField, value: FieldValue, model: &mut Model) {
            if let Err(e) = model.draft.apply(field, value) {
                // The form can't produce these; a misbehaving shell can.
                warn!(%e, "rejected draft change");
            }
        }

        /// Submission entry point: validate, then geocode or bypass, then
        /// upload, then persist. Any failure drops back to `Idle` with a
        /// toast; nothing is retried.
        fn on_submit(model: &mut Model, caps: &Capabilities) {
            if !model.submission.is_idle() {
                debug!("submit ignored, a submission is already in flight");
                return;
            }
            let Some(session) = &model.session else {
                warn!("submit without a session");
                return;
            };

            if let Err(failure) = validation::validate(&model.draft, model.geo_settings.enabled) {
                Self::fail_submission(model, &Failure::Validation(failure));
                return;
            }

            let job = SubmissionJob {
                draft: model.draft.clone(),
                owner: session.user_id.clone(),
            };

            if model.geo_settings.enabled {
                let Some(api_key) = model.geo_settings.api_key.clone() else {
                    warn!("geocoding enabled without an api key");
                    Self::fail_submission(model, &Failure::AddressUnresolvable);
                    return;
                };
                match geocode::request_url(&job.draft.address, &api_key) {
                    Ok(url) => {
                        caps.http
                            .get(url.as_str())
                            .expect_json::<geocode::GeocodeResponse>()
                            .send(|result| Event::GeocodeResolved(geocode::distill(result)));
                        model.submission = SubmissionPhase::GeoResolving { job };
                    }
                    Err(e) => {
                        warn!(%e, "could not build geocoding request");
                        Self::fail_submission(model, &Failure::AddressUnresolvable);
                    }
                }
            } else {
                match ResolvedLocation::manual(
                    job.draft.latitude,
                    job.draft.longitude,
                    job.draft.address.clone(),
                ) {
                    Ok(location) => Self::begin_uploads(job, location, model, caps),
                    Err(_) => Self::fail_submission(
                        model,
                        &Failure::Validation(ValidationFailure::CoordinateInvalid),
                    ),
                }
            }
        }

        fn on_geocode_resolved(
            result: Result<ResolvedLocation, GeocodeError>,
            model: &mut Model,
            caps: &Capabilities,
        ) {
            match std::mem::take(&mut model.submission) {
                SubmissionPhase::GeoResolving { job } => match result {
                    Ok(location) => Self::begin_uploads(job, location, model, caps),
                    Err(e) => {
                        warn!(%e, "geocoding failed");
                        Self::fail_submission(model, &Failure::AddressUnresolvable);
                    }
                },
                other => {
                    model.submission = other;
                    debug!("stale geocode result ignored");
                }
            }
        }

        /// Fire every upload at once; the batch joins them as their
        /// settlements come back.
        fn begin_uploads(
            job: SubmissionJob,
            location: ResolvedLocation,
            model: &mut Model,
            caps: &Capabilities,
        ) {
            if job.draft.selected_files.is_empty() {
                Self::persist(job, &location, vec![], model, caps);
                return;
            }

            let batch = match UploadBatch::plan(&job.owner, &job.draft.selected_files) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(%e, "could not derive storage keys");
                    Self::fail_submission(model, &Failure::UploadFailed);
                    return;
                }
            };

            for (index, slot) in batch.slots().iter().enumerate() {
                let batch_id = batch.id().clone();
                caps.storage
                    .upload(slot.key.clone(), slot.file.clone(), move |result| {
                        Event::UploadSettled {
                            batch: batch_id.clone(),
                            index,
                            result,
                        }
                    });
            }

            model.submission = SubmissionPhase::Uploading {
                job,
                location,
                batch,
            };
        }

        fn on_upload_settled(
            batch_id: &BatchId,
            index: usize,
            result: StorageResult,
            model: &mut Model,
            caps: &Capabilities,
        ) {
            match std::mem::take(&mut model.submission) {
                SubmissionPhase::Uploading {
                    job,
                    location,
                    mut batch,
                } if batch.id() == batch_id => match result {
                    Ok(StorageOutput::Uploaded { url }) => {
                        batch.settle(index, Ok(url));
                        match batch.outcome() {
                            BatchOutcome::Complete(urls) => {
                                Self::persist(job, &location, urls, model, caps);
                            }
                            BatchOutcome::Pending => {
                                model.submission = SubmissionPhase::Uploading {
                                    job,
                                    location,
                                    batch,
                                };
                            }
                            BatchOutcome::Failed => {
                                Self::fail_submission(model, &Failure::UploadFailed);
                            }
                        }
                    }
                    Ok(other) => {
                        warn!(?other, "unexpected storage output for an upload");
                        Self::fail_submission(model, &Failure::UploadFailed);
                    }
                    // First failure sinks the whole batch; siblings keep
                    // running in the shell but their settlements land on an
                    // abandoned batch id and are dropped here.
                    Err(e) => {
                        warn!(%e, index, "image upload failed");
                        Self::fail_submission(model, &Failure::UploadFailed);
                    }
                },
                other => {
                    model.submission = other;
                    debug!("stale upload settlement ignored");
                }
            }
        }

        fn persist(
            job: SubmissionJob,
            location: &ResolvedLocation,
            image_urls: Vec<DownloadUrl>,
            model: &mut Model,
            caps: &Capabilities,
        ) {
            let record = ListingRecord::assemble(&job.draft, location, image_urls, job.owner);
            let document = match serde_json::to_vec(&record) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(%e, "could not encode listing document");
                    Self::fail_submission(model, &Failure::PersistFailed);
                    return;
                }
            };
            caps.store
                .insert(Collection::Listings, document, Event::ListingPersisted);
            model.submission = SubmissionPhase::Persisting { kind: record.kind };
        }

        fn on_listing_persisted(result: StoreResult, model: &mut Model, caps: &Capabilities) {
            match std::mem::take(&mut model.submission) {
                SubmissionPhase::Persisting { kind } => match result {
                    Ok(StoreOutput::Inserted { id }) => {
                        debug!(%id, "listing saved");
                        model.draft = ListingDraft::default();
                        model.toasts.push_back(ToastMessage::success("Listing saved"));
                        caps.nav.navigate(&Route::ListingDetail {
                            kind,
                            id: ListingId::new(id),
                        });
                    }
                    Ok(other) => {
                        warn!(?other, "unexpected store output for an insert");
                        Self::fail_submission(model, &Failure::PersistFailed);
                    }
                    Err(e) => {
                        warn!(%e, "listing write failed");
                        Self::fail_submission(model, &Failure::PersistFailed);
                    }
                },
                other => {
                    model.submission = other;
                    debug!("stale persist result ignored");
                }
            }
        }

        fn on_profile_opened(model: &mut Model, caps: &Capabilities) {
            let Some(session) = &model.session else {
                warn!("profile opened without a session");
                return;
            };
            model.profile.loading = true;
            caps.store.query(
                Collection::Listings,
                OWNER_FIELD,
                session.user_id.as_str(),
                CREATED_AT_FIELD,
                true,
                Event::OwnListingsLoaded,
            );
        }

        fn on_own_listings_loaded(result: StoreResult, model: &mut Model) {
            model.profile.loading = false;
            match result {
                Ok(StoreOutput::Documents(docs)) => {
                    let mut listings = Vec::with_capacity(docs.len());
                    for doc in &docs {
                        match doc.decode::<ListingRecord>() {
                            Ok(record) => listings.push(OwnedListing {
                                id: ListingId::new(doc.id.clone()),
                                record,
                            }),
                            Err(e) => {
                                warn!(%e, id = %doc.id, "skipping undecodable listing document");
                            }
                        }
                    }
                    model.profile.listings = listings;
                    model.profile.listings_loaded = true;
                }
                Ok(other) => warn!(?other, "unexpected store output for a query"),
                Err(e) => warn!(%e, "could not load own listings"),
            }
        }

        /// Open or close the details edit session. Closing commits the new
        /// display name, but only if it actually changed.
        fn on_edit_details_toggled(model: &mut Model, caps: &Capabilities) {
            if model.profile.editing {
                model.profile.editing = false;
                let Some(session) = &model.session else {
                    return;
                };
                let new_name = model.profile.draft.display_name.clone();
                if new_name == session.display_name {
                    debug!("display name unchanged, skipping profile update");
                    return;
                }
                caps.auth
                    .update_display_name(new_name, Event::DisplayNameCommitted);
            } else {
                if let Some(session) = &model.session {
                    model.profile.draft.display_name = session.display_name.clone();
                }
                model.profile.editing = true;
            }
        }

        fn on_display_name_committed(
            result: &AuthResult,
            model: &mut Model,
            caps: &Capabilities,
        ) {
            match result {
                Ok(AuthOutput::DisplayNameUpdated) => {
                    let Some(session) = &model.session else {
                        return;
                    };
                    let patch =
                        serde_json::json!({ "name": model.profile.draft.display_name.clone() });
                    match serde_json::to_vec(&patch) {
                        Ok(bytes) => caps.store.update(
                            Collection::Users,
                            session.user_id.as_str().to_string(),
                            bytes,
                            Event::ProfileDocUpdated,
                        ),
                        Err(e) => {
                            warn!(%e, "could not encode profile patch");
                            Self::toast_failure(model, &Failure::ProfileUpdateFailed);
                        }
                    }
                }
                Ok(other) => {
                    warn!(?other, "unexpected auth output for a display-name update");
                    Self::toast_failure(model, &Failure::ProfileUpdateFailed);
                }
                Err(e) => {
                    warn!(%e, "display name update failed");
                    Self::toast_failure(model, &Failure::ProfileUpdateFailed);
                }
            }
        }

        fn on_profile_doc_updated(result: &StoreResult, model: &mut Model) {
            match result {
                Ok(StoreOutput::Updated) => {
                    if let Some(session) = &mut model.session {
                        session.display_name = model.profile.draft.display_name.clone();
                    }
                }
                Ok(other) => {
                    warn!(?other, "unexpected store output for a profile update");
                    Self::toast_failure(model, &Failure::ProfileUpdateFailed);
                }
                Err(e) => {
                    warn!(%e, "profile document update failed");
                    Self::toast_failure(model, &Failure::ProfileUpdateFailed);
                }
            }
        }

        fn on_delete_requested(id: ListingId, model: &mut Model) {
            let Some(listing) = model.profile.listings.iter().find(|l| l.id == id) else {
                warn!(%id, "delete requested for an unknown listing");
                return;
            };
            model.profile.pending_delete = Some(PendingDelete {
                image_urls: listing.record.image_urls.clone(),
                id,
            });
        }

        fn on_delete_confirmed(model: &mut Model, caps: &Capabilities) {
            let Some(pending) = &model.profile.pending_delete else {
                debug!("delete confirmed with nothing pending");
                return;
            };
            caps.store.delete(
                Collection::Listings,
                pending.id.as_str().to_string(),
                Event::ListingDocDeleted,
            );
        }

        fn on_listing_doc_deleted(result: &StoreResult, model: &mut Model, caps: &Capabilities) {
            let Some(pending) = model.profile.pending_delete.take() else {
                debug!("delete result with nothing pending");
                return;
            };
            match result {
                Ok(StoreOutput::Deleted) => {
                    model.profile.listings.retain(|l| l.id != pending.id);
                    model
                        .toasts
                        .push_back(ToastMessage::success("Successfully deleted listing"));
                    // Image cleanup starts only once the document is gone.
                    // Each delete stands alone: one failing never blocks the
                    // others and never undoes the document delete.
                    for url in &pending.image_urls {
                        match StorageKey::from_download_url(url.as_str()) {
                            Ok(key) => {
                                let key_for_event = key.clone();
                                caps.storage.delete(key, move |result| {
                                    Event::ImageObjectDeleted {
                                        key: key_for_event.clone(),
                                        result,
                                    }
                                });
                            }
                            Err(e) => {
                                warn!(%e, url = %url, "could not derive storage key from url");
                                Self::toast_failure(model, &Failure::ImageDeleteFailed);
                            }
                        }
                    }
                }
                Ok(other) => {
                    warn!(?other, "unexpected store output for a delete");
                    Self::toast_failure(model, &Failure::ListingDeleteFailed);
                }
                Err(e) => {
                    warn!(%e, id = %pending.id, "listing delete failed");
                    Self::toast_failure(model, &Failure::ListingDeleteFailed);
                }
            }
        }

        fn on_image_object_deleted(key: &StorageKey, result: &StorageResult, model: &mut Model) {
            match result {
                Ok(StorageOutput::Deleted) => {
                    model.toasts.push_back(ToastMessage::success("Image deleted"));
                }
                Ok(other) => {
                    warn!(?other, key = %key, "unexpected storage output for a delete");
                    Self::toast_failure(model, &Failure::ImageDeleteFailed);
                }
                Err(e) => {
                    warn!(%e, key = %key, "image delete failed");
                    Self::toast_failure(model, &Failure::ImageDeleteFailed);
                }
            }
        }

        /// Abort the in-flight submission and surface the reason.
        fn fail_submission(model: &mut Model, failure: &Failure) {
            model.submission = SubmissionPhase::Idle;
            Self::toast_failure(model, failure);
        }

        fn toast_failure(model: &mut Model, failure: &Failure) {
            warn!(code = failure.code(), "surfacing failure");
            model
                .toasts
                .push_back(ToastMessage::error(failure.user_message()));
            if matches!(failure, Failure::UploadFailed) {
                model.toasts.push_back(ToastMessage::error(UPLOAD_SIZE_HINT));
            }
        }
    }
}

use event::ListingKind;
use model::{OwnedListing, SubmissionPhase, ToastKind, ToastMessage};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadProgressView {
    pub settled: usize,
    pub total: usize,
    pub percent: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ListingItemView {
    pub id: String,
    pub name: String,
    pub kind: ListingKind,
    pub regular_price: u64,
    pub discounted_price: Option<u64>,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub cover_image_url: Option<String>,
}

impl From<&OwnedListing> for ListingItemView {
    fn from(listing: &OwnedListing) -> Self {
        Self {
            id: listing.id.as_str().to_string(),
            name: listing.record.name.clone(),
            kind: listing.record.kind,
            regular_price: listing.record.regular_price,
            discounted_price: listing.record.discounted_price,
            bedrooms: listing.record.bedrooms,
            bathrooms: listing.record.bathrooms,
            cover_image_url: listing
                .record
                .image_urls
                .first()
                .map(|u| u.as_str().to_string()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub is_authenticated: bool,
    pub display_name: String,
    pub email: String,
    pub editing_details: bool,
    pub is_loading: bool,
    pub toast: Option<ToastView>,
    pub upload: Option<UploadProgressView>,
    pub listings: Vec<ListingItemView>,
    pub confirm_delete: Option<String>,
    pub selected_image_count: usize,
}

impl ViewModel {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn project(model: &Model) -> Self {
        let upload = match &model.submission {
            SubmissionPhase::Uploading { batch, .. } => Some(UploadProgressView {
                settled: batch.settled_count(),
                total: batch.len(),
                percent: (batch.progress_fraction() * 100.0).clamp(0.0, 100.0).round() as u8,
            }),
            _ => None,
        };

        Self {
            is_authenticated: model.session.is_some(),
            display_name: model
                .session
                .as_ref()
                .map(|s| s.display_name.clone())
                .unwrap_or_default(),
            email: model
                .session
                .as_ref()
                .map(|s| s.email.clone())
                .unwrap_or_default(),
            editing_details: model.profile.editing,
            is_loading: !model.submission.is_idle() || model.profile.loading,
            toast: model.toasts.front().map(ToastView::from),
            upload,
            listings: model.profile.listings.iter().map(ListingItemView::from).collect(),
            confirm_delete: model
                .profile
                .pending_delete
                .as_ref()
                .map(|p| p.id.as_str().to_string()),
            selected_image_count: model.draft.selected_files.len(),
        }
    }
}
