use crux_core::testing::{AppTester, Update};

use openhouse_core::capabilities::{
    AuthOperation, AuthOutput, AuthError, Collection, Document, StorageError, StorageOperation,
    StorageOutput, StoreError, StoreOperation, StoreOutput,
};
use openhouse_core::event::{Event, ListingId, Session, UserId};
use openhouse_core::model::Model;
use openhouse_core::{App, Effect};

fn session() -> Session {
    Session {
        user_id: UserId::new("uid42"),
        display_name: "Sam Seller".to_string(),
        email: "sam@example.com".to_string(),
    }
}

fn listing_doc(id: &str, name: &str, image_urls: &[&str]) -> Document {
    let urls: Vec<&str> = image_urls.to_vec();
    let data = serde_json::json!({
        "type": "rent",
        "name": name,
        "bedrooms": 2,
        "bathrooms": 1,
        "parking": false,
        "furnished": false,
        "offer": false,
        "regularPrice": 1500,
        "imageUrls": urls,
        "geolocation": { "lat": 40.0, "lng": -75.0 },
        "location": "12 Rose St",
        "userRef": "uid42",
        "timestamp": 1_700_000_000_000_u64,
    });
    Document {
        id: id.to_string(),
        data: serde_json::to_vec(&data).unwrap(),
    }
}

fn feed_events(
    app: &AppTester<App, Effect>,
    update: Update<Effect, Event>,
    model: &mut Model,
) -> Vec<Effect> {
    let mut effects = Vec::new();
    for event in update.events {
        let next = app.update(event, model);
        effects.extend(next.effects);
    }
    effects
}

fn view(model: &Model) -> openhouse_core::ViewModel {
    use crux_core::App as _;
    App::default().view(model)
}

/// Sign in and load the profile's listings from the store.
fn open_profile(
    app: &AppTester<App, Effect>,
    model: &mut Model,
    docs: Vec<Document>,
) {
    app.update(
        Event::SessionChanged {
            session: Some(session()),
        },
        model,
    );
    let update = app.update(Event::ProfileOpened, model);
    let mut effects = update.effects;
    let request = effects
        .iter_mut()
        .find_map(|e| match e {
            Effect::Store(request) => Some(request),
            _ => None,
        })
        .expect("a listings query");

    let StoreOperation::Query {
        collection,
        filter_field,
        equals,
        order_field,
        descending,
    } = request.operation.clone()
    else {
        panic!("expected a query operation");
    };
    assert_eq!(collection, Collection::Listings);
    assert_eq!(filter_field, "userRef");
    assert_eq!(equals, "uid42");
    assert_eq!(order_field, "timestamp");
    assert!(descending, "newest first");

    let resolved = app
        .resolve(request, Ok(StoreOutput::Documents(docs)))
        .expect("resolve query");
    feed_events(app, resolved, model);
}

#[test]
fn own_listings_load_in_store_order() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    open_profile(
        &app,
        &mut model,
        vec![
            listing_doc("l2", "Sunny Family House", &[]),
            listing_doc("l1", "Cozy Loft Downtown", &[]),
        ],
    );

    assert!(model.profile.listings_loaded);
    let view = view(&model);
    assert!(!view.is_loading);
    assert_eq!(view.listings.len(), 2);
    assert_eq!(view.listings[0].id, "l2");
    assert_eq!(view.listings[1].name, "Cozy Loft Downtown");
}

#[test]
fn unchanged_display_name_commits_nothing() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    open_profile(&app, &mut model, vec![]);

    app.update(Event::EditDetailsToggled, &mut model);
    assert!(view(&model).editing_details);
    app.update(
        Event::DisplayNameEdited {
            name: "Sam Seller".to_string(),
        },
        &mut model,
    );
    let update = app.update(Event::EditDetailsToggled, &mut model);

    assert!(!view(&model).editing_details);
    assert!(
        !update
            .effects
            .iter()
            .any(|e| matches!(e, Effect::Auth(_) | Effect::Store(_))),
        "an unchanged name performs no backend write"
    );
}

#[test]
fn changed_display_name_updates_identity_then_user_document() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    open_profile(&app, &mut model, vec![]);

    app.update(Event::EditDetailsToggled, &mut model);
    app.update(
        Event::DisplayNameEdited {
            name: "Sam the Seller".to_string(),
        },
        &mut model,
    );
    let update = app.update(Event::EditDetailsToggled, &mut model);

    let mut effects = update.effects;
    let auth_request = effects
        .iter_mut()
        .find_map(|e| match e {
            Effect::Auth(request) => Some(request),
            _ => None,
        })
        .expect("a display-name update");
    assert_eq!(
        auth_request.operation,
        AuthOperation::UpdateDisplayName {
            name: "Sam the Seller".to_string()
        }
    );

    let resolved = app
        .resolve(auth_request, Ok(AuthOutput::DisplayNameUpdated))
        .expect("resolve auth update");
    let mut after = feed_events(&app, resolved, &mut model);

    let store_request = after
        .iter_mut()
        .find_map(|e| match e {
            Effect::Store(request) => Some(request),
            _ => None,
        })
        .expect("a users-document update");
    let StoreOperation::Update {
        collection,
        id,
        patch,
    } = store_request.operation.clone()
    else {
        panic!("expected an update operation");
    };
    assert_eq!(collection, Collection::Users);
    assert_eq!(id, "uid42");
    let patch: serde_json::Value = serde_json::from_slice(&patch).unwrap();
    assert_eq!(patch["name"], "Sam the Seller");

    let resolved = app
        .resolve(store_request, Ok(StoreOutput::Updated))
        .expect("resolve user update");
    feed_events(&app, resolved, &mut model);

    assert_eq!(
        model.session.as_ref().unwrap().display_name,
        "Sam the Seller"
    );
    assert!(model.toasts.is_empty(), "a silent success, as before");
}

#[test]
fn failed_display_name_update_surfaces_one_toast() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    open_profile(&app, &mut model, vec![]);

    app.update(Event::EditDetailsToggled, &mut model);
    app.update(
        Event::DisplayNameEdited {
            name: "Sam the Seller".to_string(),
        },
        &mut model,
    );
    let update = app.update(Event::EditDetailsToggled, &mut model);

    let mut effects = update.effects;
    let auth_request = effects
        .iter_mut()
        .find_map(|e| match e {
            Effect::Auth(request) => Some(request),
            _ => None,
        })
        .expect("a display-name update");
    let resolved = app
        .resolve(
            auth_request,
            Err(AuthError::Backend {
                message: "boom".to_string(),
            }),
        )
        .expect("resolve auth update");
    let after = feed_events(&app, resolved, &mut model);

    assert!(
        !after.iter().any(|e| matches!(e, Effect::Store(_))),
        "the users document is not touched after an identity failure"
    );
    assert_eq!(
        view(&model).toast.unwrap().message,
        "Could not update profile details"
    );
    assert_eq!(
        model.session.as_ref().unwrap().display_name,
        "Sam Seller",
        "the committed name stays unchanged"
    );
}

#[test]
fn confirmed_delete_removes_the_document_then_each_image_independently() {
    let url_a = "https://firebasestorage.googleapis.com/v0/b/app.appspot.com/o/images%2Fuid42-a.jpg-111?alt=media&token=t1";
    let url_b = "https://firebasestorage.googleapis.com/v0/b/app.appspot.com/o/images%2Fuid42-b.jpg-222?alt=media&token=t2";

    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    open_profile(
        &app,
        &mut model,
        vec![listing_doc("l1", "Cozy Loft Downtown", &[url_a, url_b])],
    );

    app.update(
        Event::DeleteListingRequested {
            id: ListingId::new("l1"),
        },
        &mut model,
    );
    assert_eq!(view(&model).confirm_delete.as_deref(), Some("l1"));

    let update = app.update(Event::DeleteListingConfirmed, &mut model);
    let mut effects = update.effects;
    let delete_request = effects
        .iter_mut()
        .find_map(|e| match e {
            Effect::Store(request) => Some(request),
            _ => None,
        })
        .expect("a document delete");
    let StoreOperation::Delete { collection, id } = delete_request.operation.clone() else {
        panic!("expected a delete operation");
    };
    assert_eq!(collection, Collection::Listings);
    assert_eq!(id, "l1");

    let resolved = app
        .resolve(delete_request, Ok(StoreOutput::Deleted))
        .expect("resolve document delete");
    let mut after = feed_events(&app, resolved, &mut model);

    assert!(view(&model).listings.is_empty());
    assert_eq!(model.toasts.len(), 1);
    assert_eq!(model.toasts[0].message, "Successfully deleted listing");

    // One storage delete per image, each standing alone.
    let mut image_deletes: Vec<_> = after
        .iter_mut()
        .filter_map(|e| match e {
            Effect::Storage(request) => Some(request),
            _ => None,
        })
        .collect();
    assert_eq!(image_deletes.len(), 2);
    let keys: Vec<String> = image_deletes
        .iter()
        .map(|r| {
            let StorageOperation::Delete { key } = &r.operation else {
                panic!("expected a storage delete");
            };
            key.as_str().to_string()
        })
        .collect();
    assert_eq!(
        keys,
        vec![
            "images/uid42-a.jpg-111".to_string(),
            "images/uid42-b.jpg-222".to_string(),
        ]
    );

    // urlA deletes fine, urlB fails; the failure is reported and ignored.
    let resolved = app
        .resolve(&mut *image_deletes[0], Ok(StorageOutput::Deleted))
        .expect("resolve image delete");
    feed_events(&app, resolved, &mut model);
    let resolved = app
        .resolve(
            &mut *image_deletes[1],
            Err(StorageError::Backend {
                message: "object missing".to_string(),
            }),
        )
        .expect("resolve image delete");
    feed_events(&app, resolved, &mut model);

    let messages: Vec<&str> = model.toasts.iter().map(|t| t.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Successfully deleted listing",
            "Image deleted",
            "Failed to delete images",
        ]
    );
    assert!(
        view(&model).listings.is_empty(),
        "the image failure never resurrects the document"
    );
}

#[test]
fn cancelled_delete_touches_neither_document_nor_images() {
    let url_a = "https://firebasestorage.googleapis.com/v0/b/app.appspot.com/o/images%2Fuid42-a.jpg-111?alt=media";

    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    open_profile(
        &app,
        &mut model,
        vec![listing_doc("l1", "Cozy Loft Downtown", &[url_a])],
    );

    app.update(
        Event::DeleteListingRequested {
            id: ListingId::new("l1"),
        },
        &mut model,
    );
    let update = app.update(Event::DeleteListingCancelled, &mut model);
    assert!(
        !update
            .effects
            .iter()
            .any(|e| matches!(e, Effect::Store(_) | Effect::Storage(_))),
        "declining the confirmation must delete nothing, images included"
    );
    assert_eq!(view(&model).confirm_delete, None);
    assert_eq!(view(&model).listings.len(), 1);

    // A stray confirm after cancelling is a no-op too.
    let update = app.update(Event::DeleteListingConfirmed, &mut model);
    assert!(
        !update
            .effects
            .iter()
            .any(|e| matches!(e, Effect::Store(_) | Effect::Storage(_)))
    );
}

#[test]
fn failed_document_delete_skips_image_cleanup() {
    let url_a = "https://firebasestorage.googleapis.com/v0/b/app.appspot.com/o/images%2Fuid42-a.jpg-111?alt=media";

    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    open_profile(
        &app,
        &mut model,
        vec![listing_doc("l1", "Cozy Loft Downtown", &[url_a])],
    );

    app.update(
        Event::DeleteListingRequested {
            id: ListingId::new("l1"),
        },
        &mut model,
    );
    let update = app.update(Event::DeleteListingConfirmed, &mut model);
    let mut effects = update.effects;
    let delete_request = effects
        .iter_mut()
        .find_map(|e| match e {
            Effect::Store(request) => Some(request),
            _ => None,
        })
        .expect("a document delete");

    let resolved = app
        .resolve(
            delete_request,
            Err(StoreError::Unavailable {
                message: "offline".to_string(),
            }),
        )
        .expect("resolve document delete");
    let after = feed_events(&app, resolved, &mut model);

    assert!(
        !after.iter().any(|e| matches!(e, Effect::Storage(_))),
        "images survive a failed document delete"
    );
    assert_eq!(view(&model).listings.len(), 1, "the listing stays");
    assert_eq!(
        view(&model).toast.unwrap().message,
        "Could not delete listing"
    );
}

#[test]
fn sign_out_clears_the_session_and_navigates_home() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    open_profile(&app, &mut model, vec![]);

    let update = app.update(Event::SignOutRequested, &mut model);
    let mut effects = update.effects;
    let auth_request = effects
        .iter_mut()
        .find_map(|e| match e {
            Effect::Auth(request) => Some(request),
            _ => None,
        })
        .expect("a sign-out request");
    assert_eq!(auth_request.operation, AuthOperation::SignOut);

    let resolved = app
        .resolve(auth_request, Ok(AuthOutput::SignedOut))
        .expect("resolve sign-out");
    let after = feed_events(&app, resolved, &mut model);

    assert!(model.session.is_none());
    let nav_paths: Vec<String> = after
        .iter()
        .filter_map(|e| match e {
            Effect::Nav(request) => Some(request.operation.path.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(nav_paths, vec!["/".to_string()]);
}

#[test]
fn losing_the_session_redirects_to_sign_in() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    open_profile(&app, &mut model, vec![]);

    let update = app.update(Event::SessionChanged { session: None }, &mut model);
    let nav_paths: Vec<String> = update
        .effects
        .iter()
        .filter_map(|e| match e {
            Effect::Nav(request) => Some(request.operation.path.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(nav_paths, vec!["/sign-in".to_string()]);
    assert!(model.profile.listings.is_empty());
}
