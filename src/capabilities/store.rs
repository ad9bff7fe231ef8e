use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

pub const MAX_DOCUMENT_SIZE: usize = 1024 * 1024;

/// The two collections this app writes to. Typed so a misspelled collection
/// path is a compile error, not a runtime surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Listings,
    Users,
}

impl Collection {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Listings => "listings",
            Self::Users => "users",
        }
    }
}

/// A document as returned by a query: generated id plus the raw JSON bytes.
/// Decoding happens in the core so the shell stays a dumb pipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Vec<u8>,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_slice(&self.data).map_err(|e| StoreError::Serialization {
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreOperation {
    /// Insert with a generated id. The store stamps the document's
    /// `timestamp` field server-side.
    Insert {
        collection: Collection,
        document: Vec<u8>,
    },
    Update {
        collection: Collection,
        id: String,
        patch: Vec<u8>,
    },
    Query {
        collection: Collection,
        filter_field: String,
        equals: String,
        order_field: String,
        descending: bool,
    },
    Delete {
        collection: Collection,
        id: String,
    },
}

impl Operation for StoreOperation {
    type Output = StoreResult;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreOutput {
    Inserted { id: String },
    Updated,
    Documents(Vec<Document>),
    Deleted,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error("document exceeds {max} bytes")]
    DocumentTooLarge { max: usize },

    #[error("serialization failed: {message}")]
    Serialization { message: String },

    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    #[error("store error: {message}")]
    Backend { message: String },
}

pub type StoreResult = Result<StoreOutput, StoreError>;

#[derive(Clone)]
pub struct DocStore<E> {
    context: CapabilityContext<StoreOperation, E>,
}

impl<Ev> Capability<Ev> for DocStore<Ev> {
    type Operation = StoreOperation;
    type MappedSelf<MappedEv> = DocStore<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        DocStore::new(self.context.map_event(f))
    }
}

impl<E> DocStore<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<StoreOperation, E>) -> Self {
        Self { context }
    }

    pub fn insert<F>(&self, collection: Collection, document: Vec<u8>, make_event: F)
    where
        F: Fn(StoreResult) -> E + Send + Sync + 'static,
    {
        self.request(StoreOperation::Insert { collection, document }, make_event);
    }

    pub fn update<F>(&self, collection: Collection, id: String, patch: Vec<u8>, make_event: F)
    where
        F: Fn(StoreResult) -> E + Send + Sync + 'static,
    {
        self.request(StoreOperation::Update { collection, id, patch }, make_event);
    }

    /// Equality filter plus ordering, the only query shape this app needs.
    pub fn query<F>(
        &self,
        collection: Collection,
        filter_field: impl Into<String>,
        equals: impl Into<String>,
        order_field: impl Into<String>,
        descending: bool,
        make_event: F,
    ) where
        F: Fn(StoreResult) -> E + Send + Sync + 'static,
    {
        self.request(
            StoreOperation::Query {
                collection,
                filter_field: filter_field.into(),
                equals: equals.into(),
                order_field: order_field.into(),
                descending,
            },
            make_event,
        );
    }

    pub fn delete<F>(&self, collection: Collection, id: String, make_event: F)
    where
        F: Fn(StoreResult) -> E + Send + Sync + 'static,
    {
        self.request(StoreOperation::Delete { collection, id }, make_event);
    }

    fn request<F>(&self, operation: StoreOperation, make_event: F)
    where
        F: Fn(StoreResult) -> E + Send + Sync + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context.request_from_shell(operation).await;
            context.update_app(make_event(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_paths() {
        assert_eq!(Collection::Listings.path(), "listings");
        assert_eq!(Collection::Users.path(), "users");
    }

    #[test]
    fn document_decodes_json() {
        #[derive(Deserialize)]
        struct Name {
            name: String,
        }
        let doc = Document {
            id: "d1".into(),
            data: br#"{"name":"Cozy Loft Downtown"}"#.to_vec(),
        };
        let decoded: Name = doc.decode().unwrap();
        assert_eq!(decoded.name, "Cozy Loft Downtown");
    }

    #[test]
    fn document_decode_reports_malformed_json() {
        let doc = Document {
            id: "d1".into(),
            data: b"not json".to_vec(),
        };
        let err = doc.decode::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }
}
