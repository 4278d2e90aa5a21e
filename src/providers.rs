pub mod document_store;
pub mod identity_provider;

pub use document_store::{
    Direction, Document, DocumentStore, FieldFilter, MemoryDocumentStore, OrderBy, StoreError,
    WriteValue,
};
pub use identity_provider::{
    AuthListener, AuthSubscription, IdentityProvider, ListenerRegistry, MemoryIdentityProvider,
    ProviderError,
};
