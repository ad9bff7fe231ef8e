mod auth;
mod nav;
mod store;
mod storage;

pub use self::auth::{Auth, AuthError, AuthOperation, AuthOutput, AuthResult};
pub use self::nav::{NavOperation, Navigator, Route};
pub use self::storage::{
    ObjectStorage, StorageError, StorageKey, StorageOperation, StorageOutput, StorageResult,
    MAX_KEY_LENGTH, STORAGE_IMAGE_PREFIX,
};
pub use self::store::{
    Collection, DocStore, Document, StoreError, StoreOperation, StoreOutput, StoreResult,
    MAX_DOCUMENT_SIZE,
};

// Render comes straight from Crux; it already does everything we need to
// trigger view updates. Http is only used for the geocoding service.
pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::app::App;
use crate::event::Event;

pub type AppHttp = Http<Event>;
pub type AppRender = Render<Event>;
pub type AppAuth = Auth<Event>;
pub type AppStore = DocStore<Event>;
pub type AppStorage = ObjectStorage<Event>;
pub type AppNavigator = Navigator<Event>;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: Http<Event>,
    pub auth: Auth<Event>,
    pub store: DocStore<Event>,
    pub storage: ObjectStorage<Event>,
    pub nav: Navigator<Event>,
}
